// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records validation metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch:
//   - epoch:         the epoch number (0, 1, 2, ...)
//   - dev_loss:      teacher-forced loss on the dev source side
//   - metric:        tracked metric (BLEU, or retrieval loss)
//   - edit_distance: mean token edit distance (BLEU epochs only)
//   - precision:     content precision          (BLEU epochs only)
//   - recall:        content recall             (BLEU epochs only)
//
// Output file: <working_dir>/metrics.csv
//
//   epoch,dev_loss,metric,edit_distance,precision,recall
//   0,5.812400,6.001200,,,
//   1,4.930100,12.480000,7.210000,0.310000,0.280000
//
// The file is appended to, so a resumed run keeps its history.

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

pub const METRICS_HEADER: &str = "epoch,dev_loss,metric,edit_distance,precision,recall";

/// One row of validation metrics for a single epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    pub epoch:         usize,
    pub dev_loss:      f64,
    pub metric:        f64,
    pub edit_distance: Option<f64>,
    pub precision:     Option<f64>,
    pub recall:        Option<f64>,
}

impl EpochMetrics {
    /// Row for an epoch validated without decoding.
    pub fn loss_only(epoch: usize, dev_loss: f64, metric: f64) -> Self {
        Self { epoch, dev_loss, metric, edit_distance: None, precision: None, recall: None }
    }

    fn csv_row(&self) -> String {
        let opt = |v: Option<f64>| v.map(|v| format!("{v:.6}")).unwrap_or_default();
        format!(
            "{},{:.6},{:.6},{},{},{}",
            self.epoch,
            self.dev_loss,
            self.metric,
            opt(self.edit_distance),
            opt(self.precision),
            opt(self.recall),
        )
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{METRICS_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(f, "{}", m.csv_row())?;

        tracing::debug!(
            "Logged epoch {} metrics: dev_loss={:.4}, metric={:.4}",
            m.epoch,
            m.dev_loss,
            m.metric,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_appended_under_one_header() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics::loss_only(0, 2.5, 3.0)).unwrap();
        logger
            .log(&EpochMetrics {
                epoch:         1,
                dev_loss:      2.0,
                metric:        10.0,
                edit_distance: Some(4.0),
                precision:     Some(0.5),
                recall:        Some(0.25),
            })
            .unwrap();

        // reopening must not write a second header
        let logger = MetricsLogger::new(dir.path()).unwrap();
        let text   = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![
            METRICS_HEADER,
            "0,2.500000,3.000000,,,",
            "1,2.000000,10.000000,4.000000,0.500000,0.250000",
        ]);
    }
}
