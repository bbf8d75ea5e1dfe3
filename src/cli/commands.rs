// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `run` and `predict`, and all
// their flags. Every flag has a default, so a bare
// `digit-cnn run` reproduces the reference experiment.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::config::{DatasetChoice, InferenceConfig, RunConfig, TrainConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train on MNIST, evaluate, write charts and save the model
    Run(RunArgs),

    /// Classify image files with a saved model
    Predict(PredictArgs),
}

/// Where the external inference images are and how to score them.
#[derive(Args, Debug, Clone)]
pub struct ImageArgs {
    /// Directory holding 0.<ext>, 1.<ext>, ...
    #[arg(long = "images", default_value = "images")]
    pub images_dir: String,

    /// How many numbered files to read
    #[arg(long, default_value_t = 10)]
    pub count: usize,

    #[arg(long, default_value = "jpg")]
    pub extension: String,

    /// JSON object mapping file names to expected digits
    #[arg(long)]
    pub labels: Option<String>,

    /// Treat "<i>.<ext>" as showing digit i % 10 when no --labels is given
    #[arg(long)]
    pub labels_from_names: bool,
}

impl From<ImageArgs> for InferenceConfig {
    fn from(a: ImageArgs) -> Self {
        InferenceConfig {
            images_dir:        a.images_dir,
            count:             a.count,
            extension:         a.extension,
            labels:            a.labels,
            labels_from_names: a.labels_from_names,
        }
    }
}

/// All arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Read the raw IDX files from this directory instead of downloading
    #[arg(long)]
    pub idx_dir: Option<String>,

    /// Use at most this many images from each split
    #[arg(long)]
    pub limit: Option<usize>,

    /// Directory for the model, charts, metrics.csv and run_config.json
    #[arg(long, default_value = "output")]
    pub output_dir: String,

    /// Model file name inside the output directory
    #[arg(long, default_value = "model")]
    pub model_name: String,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 5)]
    pub epochs: usize,

    /// Fraction of the training split held out for validation
    #[arg(long, default_value_t = 0.2)]
    pub validation_split: f64,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Seeds parameter initialisation and batch shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Shuffle before taking the validation subset (default: last 20%)
    #[arg(long)]
    pub shuffle_split: bool,

    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    /// Rows of the test prediction grid
    #[arg(long, default_value_t = 2)]
    pub grid_rows: usize,

    /// Columns of the test prediction grid
    #[arg(long, default_value_t = 5)]
    pub grid_cols: usize,

    /// Skip inference on external images
    #[arg(long)]
    pub no_inference: bool,

    #[command(flatten)]
    pub images: ImageArgs,
}

/// Convert CLI RunArgs into the application-layer RunConfig.
/// The application layer never sees clap types.
impl From<RunArgs> for RunConfig {
    fn from(a: RunArgs) -> Self {
        RunConfig {
            dataset:    a.idx_dir.map_or(DatasetChoice::Download, DatasetChoice::IdxDir),
            limit:      a.limit,
            output_dir: a.output_dir,
            model_name: a.model_name,
            train: TrainConfig {
                batch_size:       a.batch_size,
                epochs:           a.epochs,
                validation_split: a.validation_split,
                learning_rate:    a.lr,
                seed:             a.seed,
                shuffle_split:    a.shuffle_split,
                num_workers:      a.num_workers,
            },
            grid_rows:  a.grid_rows,
            grid_cols:  a.grid_cols,
            inference:  (!a.no_inference).then(|| a.images.into()),
        }
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Model file written by `run`
    #[arg(long, default_value = "output/model.mpk.gz")]
    pub model: String,

    /// Where inference.png and misclassified.png are written
    #[arg(long, default_value = "output")]
    pub output_dir: String,

    /// Columns of inference.png
    #[arg(long, default_value_t = 5)]
    pub grid_cols: usize,

    #[command(flatten)]
    pub images: ImageArgs,
}
