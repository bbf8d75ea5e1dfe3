// ============================================================
// Layer 6 — Training History and Metrics Logger
// ============================================================
// Keeps the per-epoch metrics of one training run and writes
// them to a CSV file.
//
// Metrics recorded per epoch:
//   - epoch:        the epoch number (1, 2, 3, ...)
//   - loss:         mean categorical cross-entropy on the training subset
//   - accuracy:     fraction of training-subset samples classified correctly
//   - val_loss:     same on the validation subset
//   - val_accuracy: same on the validation subset
//
// The validation columns are empty when the run had no
// validation subset (validation fraction of 0).
//
// Output file: <output_dir>/metrics.csv
//
// Example CSV output:
//   epoch,loss,accuracy,val_loss,val_accuracy
//   1,0.143210,0.956400,0.061020,0.981300
//   2,0.047300,0.985100,0.049810,0.985900
//
// How to read the metrics:
//   - loss should fall every epoch
//   - val_loss rising while loss keeps falling → overfitting
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Mean cross-entropy over the training subset.
    /// Random initialisation gives ~ln(10) ≈ 2.30
    pub loss: f64,

    /// Fraction of training samples predicted correctly, [0.0, 1.0]
    pub accuracy: f64,

    /// Mean cross-entropy on the validation subset
    pub val_loss: Option<f64>,

    /// Fraction of validation samples predicted correctly
    pub val_accuracy: Option<f64>,
}

impl EpochMetrics {
    /// Returns true if this epoch improved over the previous best val_loss
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss.is_some_and(|v| v < best_val_loss)
    }
}

// ─── History ──────────────────────────────────────────────────────────────────
/// All epochs of one training run, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub epochs: Vec<EpochMetrics>,
}

impl History {
    pub fn push(&mut self, m: EpochMetrics) {
        self.epochs.push(m);
    }

    /// (epoch, training accuracy) points
    pub fn accuracy(&self) -> Vec<(usize, f64)> {
        self.epochs.iter().map(|m| (m.epoch, m.accuracy)).collect()
    }

    /// (epoch, validation accuracy) points, epochs without validation skipped
    pub fn val_accuracy(&self) -> Vec<(usize, f64)> {
        self.epochs
            .iter()
            .filter_map(|m| m.val_accuracy.map(|v| (m.epoch, v)))
            .collect()
    }

    /// (epoch, training loss) points
    pub fn loss(&self) -> Vec<(usize, f64)> {
        self.epochs.iter().map(|m| (m.epoch, m.loss)).collect()
    }

    /// (epoch, validation loss) points, epochs without validation skipped
    pub fn val_loss(&self) -> Vec<(usize, f64)> {
        self.epochs
            .iter()
            .filter_map(|m| m.val_loss.map(|v| (m.epoch, v)))
            .collect()
    }

    /// Epoch with the lowest validation loss
    pub fn best_epoch(&self) -> Option<&EpochMetrics> {
        let mut best: Option<&EpochMetrics> = None;
        for m in &self.epochs {
            let threshold = best.and_then(|b| b.val_loss).unwrap_or(f64::INFINITY);
            if m.is_improvement(threshold) {
                best = Some(m);
            }
        }
        best
    }
}

#[cfg(test)]
impl History {
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }
}

// ─── MetricsLogger ────────────────────────────────────────────────────────────
/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    /// Full path to the CSV file
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Starts a fresh CSV (header only) — one file per run.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        writeln!(f, "epoch,loss,accuracy,val_loss,val_accuracy")?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        let opt = |v: Option<f64>| v.map(|v| format!("{v:.6}")).unwrap_or_default();
        writeln!(
            f,
            "{},{:.6},{:.6},{},{}",
            m.epoch,
            m.loss,
            m.accuracy,
            opt(m.val_loss),
            opt(m.val_accuracy),
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: loss={:.4}, accuracy={:.4}",
            m.epoch,
            m.loss,
            m.accuracy,
        );

        Ok(())
    }

    /// Write a whole history, one row per epoch
    pub fn log_history(&self, history: &History) -> Result<()> {
        history.epochs.iter().try_for_each(|m| self.log(m))
    }

    /// Return the path to the metrics CSV file
    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
