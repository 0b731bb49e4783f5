// ============================================================
// Layer 4 - NPZ Example Loader
// ============================================================
// Reads preprocessed SQuAD examples from a numpy .npz archive
// holding five aligned arrays:
//
//   question       (N, Q)  token ids, right-padded
//   context        (N, C)  token ids, right-padded
//   answer         (N, C)  0/1 per context token
//   question_lens  (N,)    true question lengths
//   context_lens   (N,)    true context lengths
//
// numpy stores each array as "<name>.npy" inside the zip; both
// "<name>.npy" and the bare name are accepted. Integer arrays
// may be int64 or int32.
//
// Reference: ndarray-npy crate documentation

use std::{fs::File, path::PathBuf};

use ndarray::{Array1, Array2, Dimension, Ix1, Ix2};
use ndarray_npy::{NpzReader, ReadableElement};

use crate::domain::{errors::QaError, example::SquadExample, traits::ExampleSource};

/// Loads every example of one .npz file.
/// Implements the ExampleSource trait from Layer 3.
pub struct NpzExampleSource {
    path: PathBuf,
}

impl NpzExampleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }
}

impl ExampleSource for NpzExampleSource {
    fn load_all(&self) -> Result<Vec<SquadExample>, QaError> {
        let file = File::open(&self.path)
            .map_err(|e| QaError::data_load(self.origin(), e.to_string()))?;
        let mut npz = NpzReader::new(file)
            .map_err(|e| QaError::data_load(self.origin(), e.to_string()))?;

        let questions     = read_ids::<Ix2>(&mut npz, "question", &self.origin())?;
        let contexts      = read_ids::<Ix2>(&mut npz, "context", &self.origin())?;
        let answers       = read_ids::<Ix2>(&mut npz, "answer", &self.origin())?;
        let question_lens = read_ids::<Ix1>(&mut npz, "question_lens", &self.origin())?;
        let context_lens  = read_ids::<Ix1>(&mut npz, "context_lens", &self.origin())?;

        let examples = assemble(&questions, &contexts, &answers, &question_lens, &context_lens)
            .map_err(|reason| QaError::data_load(self.origin(), reason))?;

        tracing::info!("Loaded {} examples from '{}'", examples.len(), self.path.display());
        Ok(examples)
    }

    fn describe(&self) -> String {
        format!("npz archive '{}'", self.path.display())
    }
}

/// Read an integer array as i64 whatever its stored width.
fn read_ids<D: Dimension>(
    npz:    &mut NpzReader<File>,
    name:   &str,
    origin: &str,
) -> Result<ndarray::Array<i64, D>, QaError> {
    let with_suffix = format!("{name}.npy");
    for entry in [with_suffix.as_str(), name] {
        if let Ok(array) = read_as::<i64, D>(npz, entry) {
            return Ok(array);
        }
        if let Ok(array) = read_as::<i32, D>(npz, entry) {
            return Ok(array.mapv(i64::from));
        }
    }
    Err(QaError::data_load(
        origin,
        format!("missing array '{name}' (or it is not a {}-d int32/int64 array)", D::NDIM.unwrap_or(0)),
    ))
}

fn read_as<T, D>(npz: &mut NpzReader<File>, name: &str) -> Result<ndarray::Array<T, D>, ()>
where
    T: ReadableElement,
    D: Dimension,
{
    npz.by_name::<ndarray::OwnedRepr<T>, D>(name).map_err(|_| ())
}

/// Zip the five arrays into validated examples.
fn assemble(
    questions:     &Array2<i64>,
    contexts:      &Array2<i64>,
    answers:       &Array2<i64>,
    question_lens: &Array1<i64>,
    context_lens:  &Array1<i64>,
) -> Result<Vec<SquadExample>, String> {
    let n = questions.nrows();
    for (name, rows) in [
        ("context", contexts.nrows()),
        ("answer", answers.nrows()),
        ("question_lens", question_lens.len()),
        ("context_lens", context_lens.len()),
    ] {
        if rows != n {
            return Err(format!("array '{name}' has {rows} rows, 'question' has {n}"));
        }
    }

    (0..n)
        .map(|i| {
            let example = SquadExample::new(
                to_ids(questions.row(i).iter(), "question", i)?,
                to_ids(contexts.row(i).iter(), "context", i)?,
                to_ids(answers.row(i).iter(), "answer", i)?,
                to_len(question_lens[i], "question_lens", i)?,
                to_len(context_lens[i], "context_lens", i)?,
            );
            example.map_err(|e| format!("example {i}: {e}"))
        })
        .collect()
}

fn to_ids<'a>(values: impl Iterator<Item = &'a i64>, name: &str, row: usize) -> Result<Vec<u32>, String> {
    values
        .map(|&v| u32::try_from(v).map_err(|_| format!("'{name}' row {row} holds invalid id {v}")))
        .collect()
}

fn to_len(value: i64, name: &str, row: usize) -> Result<usize, String> {
    usize::try_from(value).map_err(|_| format!("'{name}' row {row} holds negative length {value}"))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::NpzWriter;
    use std::path::Path;

    fn write_archive(path: &Path, answer: Array2<i64>, context_lens: Array1<i32>) {
        let mut npz = NpzWriter::new(File::create(path).unwrap());
        npz.add_array("question.npy", &array![[4i64, 5, 0], [6, 7, 8]]).unwrap();
        npz.add_array("context.npy", &array![[1i64, 2, 3, 0], [9, 10, 11, 12]]).unwrap();
        npz.add_array("answer.npy", &answer).unwrap();
        npz.add_array("question_lens.npy", &array![2i64, 3]).unwrap();
        npz.add_array("context_lens.npy", &context_lens).unwrap();
        npz.finish().unwrap();
    }

    #[test]
    fn test_loads_mixed_width_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.npz");
        write_archive(&path, array![[0, 1, 1, 0], [0, 0, 0, 1]], array![3i32, 4]);

        let examples = NpzExampleSource::new(&path).load_all().unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].question(), &[4, 5, 0]);
        assert_eq!(examples[0].question_len(), 2);
        assert_eq!(examples[0].context_len(), 3);
        assert_eq!(examples[1].answer(), &[0, 0, 0, 1]);
        assert_eq!(examples[1].context(), &[9, 10, 11, 12]);
    }

    #[test]
    fn test_bad_label_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.npz");
        write_archive(&path, array![[0, 2, 1, 0], [0, 0, 0, 1]], array![3i32, 4]);

        let err = NpzExampleSource::new(&path).load_all().unwrap_err();
        assert!(matches!(err, QaError::DataLoad { .. }));
        assert!(err.to_string().contains("example 0"));
    }

    #[test]
    fn test_length_beyond_row_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.npz");
        write_archive(&path, array![[0, 1, 1, 0], [0, 0, 0, 1]], array![3i32, 9]);
        assert!(NpzExampleSource::new(&path).load_all().is_err());
    }

    #[test]
    fn test_missing_array_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.npz");
        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("question.npy", &array![[1i64]]).unwrap();
        npz.finish().unwrap();

        let err = NpzExampleSource::new(&path).load_all().unwrap_err();
        assert!(err.to_string().contains("'context'"));
    }

    #[test]
    fn test_missing_file_is_a_data_load_error() {
        let source = NpzExampleSource::new("/no/such/train.npz");
        assert!(matches!(source.load_all(), Err(QaError::DataLoad { .. })));
        assert!(source.describe().contains("train.npz"));
    }
}
