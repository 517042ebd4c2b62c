// ============================================================
// Layer 6 - Metrics Logger
// ============================================================
// Appends one CSV row per epoch (supervised training) or per
// meta-iteration (MAML) so learning curves can be plotted later.
//
//   metrics.csv       epoch,train_loss,val_loss,val_perplexity
//   meta_metrics.csv  iteration,tasks,query_loss
//
// The header is written only when the file is created, so
// repeated runs append to the same log.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

/// A record that can be written as one CSV row
pub trait CsvRow {
    const HEADER: &'static str;
    fn to_csv(&self) -> String;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,

    /// Mean next-token cross-entropy over the training batches
    pub train_loss: f64,

    /// NaN when the validation split is empty
    pub val_loss: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64) -> Self {
        Self { epoch, train_loss, val_loss }
    }

    pub fn val_perplexity(&self) -> f64 {
        self.val_loss.exp()
    }
}

impl CsvRow for EpochMetrics {
    const HEADER: &'static str = "epoch,train_loss,val_loss,val_perplexity";

    fn to_csv(&self) -> String {
        format!(
            "{},{:.6},{:.6},{:.6}",
            self.epoch,
            self.train_loss,
            self.val_loss,
            self.val_perplexity()
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaMetrics {
    pub iteration:  usize,
    pub tasks:      usize,
    /// Mean query loss of the adapted copies
    pub query_loss: f64,
}

impl CsvRow for MetaMetrics {
    const HEADER: &'static str = "iteration,tasks,query_loss";

    fn to_csv(&self) -> String {
        format!("{},{},{:.6}", self.iteration, self.tasks, self.query_loss)
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    pub fn new<R: CsvRow>(dir: impl Into<PathBuf>, file_name: &str) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join(file_name);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{}", R::HEADER)?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log<R: CsvRow>(&self, row: &R) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", row.to_csv())?;
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perplexity_of_zero_loss_is_one() {
        assert_eq!(EpochMetrics::new(1, 0.0, 0.0).val_perplexity(), 1.0);
    }

    #[test]
    fn test_header_written_once_and_rows_appended() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new::<EpochMetrics>(dir.path(), "metrics.csv").unwrap();
        logger.log(&EpochMetrics::new(1, 3.0, 2.5)).unwrap();

        let again = MetricsLogger::new::<EpochMetrics>(dir.path(), "metrics.csv").unwrap();
        again.log(&EpochMetrics::new(2, 2.0, 1.5)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], EpochMetrics::HEADER);
        assert!(lines[2].starts_with("2,2.000000,1.500000,"));
    }

    #[test]
    fn test_meta_row_format() {
        let row = MetaMetrics { iteration: 4, tasks: 3, query_loss: 1.25 };
        assert_eq!(row.to_csv(), "4,3,1.250000");
    }
}
