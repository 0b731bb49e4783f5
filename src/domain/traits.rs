// ============================================================
// Layer 3 - Core Traits
// ============================================================
// Seams the application layer programs against.
//
// Implementations:
//   - NpzExampleSource -> reads the five aligned SQuAD arrays
//                         from a numpy .npz archive

use crate::domain::{errors::QaError, example::SquadExample};

// ─── ExampleSource ───────────────────────────────────────────────────────────
/// Anything that can produce a list of validated SQuAD examples.
pub trait ExampleSource {
    /// Load every example this source holds, in stored order.
    fn load_all(&self) -> Result<Vec<SquadExample>, QaError>;

    /// Human readable origin, used in log lines.
    fn describe(&self) -> String;
}
