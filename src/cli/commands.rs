// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `evaluate`, and
// all their configurable flags.
//
// Choice-like flags (cell type, optimizer, variant, sharing)
// stay strings here; the application layer parses them so a
// bad value surfaces as a configuration error.

use clap::{ArgAction, Args, Subcommand};

use crate::application::train_use_case::TrainConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the recurrent QA model on preprocessed SQuAD arrays
    Train(TrainArgs),

    /// Report the loss of the latest checkpoint on an .npz archive
    Evaluate(EvaluateArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Path to a .npy file holding the GloVe vectors
    #[arg(long, default_value = "data/squad/glove.squad.100d.npy")]
    pub embed_path: String,

    /// Path to training data as an .npz file
    #[arg(long, default_value = "data/squad/train.npz")]
    pub train_path: String,

    /// Path to validation data as an .npz file.
    /// Without it, --val-fraction of the training data is held out
    #[arg(long)]
    pub val_path: Option<String>,

    /// Directory to save model checkpoints after each epoch
    #[arg(long, default_value = "save")]
    pub save_dir: String,

    /// Size of hidden states for the encoders
    #[arg(long, default_value_t = 200)]
    pub hidden_size: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Must match the width of the embedding matrix
    #[arg(long, default_value_t = 100)]
    pub embed_dim: usize,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Number of stacked recurrent layers per encoder
    #[arg(long, default_value_t = 2)]
    pub layers: usize,

    /// Recurrent cell: lstm or gru
    #[arg(long, default_value = "lstm")]
    pub cell_type: String,

    #[arg(long, default_value_t = 0.01)]
    pub lr: f64,

    /// Optimizer: adam or sgd
    #[arg(long, default_value = "adam")]
    pub optim: String,

    /// If > 0, only train on the first N training examples
    #[arg(long, default_value_t = 0)]
    pub subset: usize,

    /// Model variant: bilstm or baseline
    #[arg(long, default_value = "bilstm")]
    pub variant: String,

    /// Average the loss over real passage tokens only
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub mask_padding: bool,

    /// Encoder layers: independent or shared
    #[arg(long, default_value = "independent")]
    pub layer_sharing: String,

    /// Add a 2 -> 2 linear projection after the classifier
    #[arg(long)]
    pub project_logits: bool,

    /// Fraction of training data held out when --val-path is absent
    #[arg(long, default_value_t = 0.1)]
    pub val_fraction: f64,

    /// Seeds parameter init, the held-out split and batch order
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Continue from the latest checkpoint in --save-dir
    #[arg(long)]
    pub resume: bool,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            embed_path:     a.embed_path,
            train_path:     a.train_path,
            val_path:       a.val_path,
            save_dir:       a.save_dir,
            hidden_size:    a.hidden_size,
            batch_size:     a.batch_size,
            embed_dim:      a.embed_dim,
            epochs:         a.epochs,
            layers:         a.layers,
            cell_type:      a.cell_type,
            lr:             a.lr,
            optim:          a.optim,
            subset:         a.subset,
            variant:        a.variant,
            mask_padding:   a.mask_padding,
            layer_sharing:  a.layer_sharing,
            project_logits: a.project_logits,
            val_fraction:   a.val_fraction,
            seed:           a.seed,
            resume:         a.resume,
        }
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// .npz archive to score
    #[arg(long, default_value = "data/squad/val.npz")]
    pub data_path: String,

    /// Directory a training run saved into
    #[arg(long, default_value = "save")]
    pub save_dir: String,

    /// Override the embedding path recorded at training time
    #[arg(long)]
    pub embed_path: Option<String>,

    /// Override the batch size recorded at training time
    #[arg(long)]
    pub batch_size: Option<usize>,
}
