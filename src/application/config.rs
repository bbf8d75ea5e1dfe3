// ============================================================
// Layer 2 — Run Configuration
// ============================================================
// Every knob of a run lives in an explicitly constructed
// value that is passed down — no global state. The seed in
// particular is handed to the backend and the data loader
// here instead of being set as an ambient default.
//
// Serialisable so the exact settings of a run are written
// next to the saved model (run_config.json).

use serde::{Deserialize, Serialize};

/// Where the MNIST splits come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetChoice {
    /// burn's downloader and cache
    Download,
    /// Raw IDX files in a local directory
    IdxDir(String),
}

// ─── Training Configuration ──────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub batch_size:       usize,
    pub epochs:           usize,
    /// Fraction of the training split held out for validation
    pub validation_split: f64,
    pub learning_rate:    f64,
    pub seed:             u64,
    /// Shuffle (with `seed`) before taking the validation tail
    pub shuffle_split:    bool,
    pub num_workers:      usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size:       32,
            epochs:           5,
            validation_split: 0.2,
            learning_rate:    1e-3,
            seed:             42,
            shuffle_split:    false,
            num_workers:      1,
        }
    }
}

// ─── Run Configuration ───────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub dataset:      DatasetChoice,
    /// Keep at most this many samples per split
    pub limit:        Option<usize>,
    /// Charts, metrics.csv, model file and run_config.json go here
    pub output_dir:   String,
    /// Model file name inside output_dir (".mpk.gz" is appended)
    pub model_name:   String,
    pub train:        TrainConfig,
    /// Thumbnail grid of test predictions: rows x cols
    pub grid_rows:    usize,
    pub grid_cols:    usize,
    /// Optional external inference images
    pub inference:    Option<InferenceConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dataset:    DatasetChoice::Download,
            limit:      None,
            output_dir: "output".to_string(),
            model_name: "model".to_string(),
            train:      TrainConfig::default(),
            grid_rows:  2,
            grid_cols:  5,
            inference:  None,
        }
    }
}

// ─── Inference Configuration ─────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Directory holding 0.<ext> .. (count-1).<ext>
    pub images_dir: String,
    pub count:      usize,
    pub extension:  String,
    /// JSON file mapping file names to expected digits
    pub labels:     Option<String>,
    /// Use the file index as the expected digit when no labels file is given
    pub labels_from_names: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            images_dir:        "images".to_string(),
            count:             10,
            extension:         "jpg".to_string(),
            labels:            None,
            labels_from_names: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_run() {
        let cfg = TrainConfig::default();
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.epochs, 5);
        assert_eq!(cfg.validation_split, 0.2);
    }

    #[test]
    fn test_run_config_json_roundtrip() {
        let mut cfg = RunConfig::default();
        cfg.dataset = DatasetChoice::IdxDir("data/mnist".into());
        cfg.inference = Some(InferenceConfig::default());
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let back: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
