// ============================================================
// Layer 6 — Metrics
// ============================================================
// Two pieces:
//
//   RunningStats   — accumulates per-batch losses and counts
//                    between two evaluation rounds. Losses are
//                    weighted by the number of predictions in the
//                    batch, so the reported loss is an average
//                    over elements, not over batches.
//
//   MetricsLogger  — appends one CSV row per evaluation round.
//
// Output file: <checkpoint_dir>/metrics.csv
//
// Example CSV output:
//   epoch,round,train_state_loss,train_loc_loss,train_acc,dev_state_loss,dev_loc_loss,dev_state_acc,dev_loc_acc,dev_score
//   1,1,1.204511,0.913402,0.412000,1.100232,0.880001,0.500000,0.350000,42.500000
//   ...
//
// dev_score is total accuracy x 100: (state correct + location
// correct) / (state predictions + location predictions). It is
// the number early stopping and checkpoint names use.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

/// Losses and counts from one forward pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    /// CRF negative log-likelihood (batch mean)
    pub state_loss:    f64,
    /// Location cross entropy (mean over supervised positions)
    pub loc_loss:      f64,
    pub state_correct: usize,
    pub state_pred:    usize,
    pub loc_correct:   usize,
    pub loc_pred:      usize,
}

/// Element-weighted accumulation of BatchStats.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    state_loss_sum: f64,
    loc_loss_sum:   f64,
    state_correct:  usize,
    state_pred:     usize,
    loc_correct:    usize,
    loc_pred:       usize,
}

fn ratio(num: f64, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num / den as f64 }
}

impl RunningStats {
    pub fn add(&mut self, b: &BatchStats) {
        self.state_loss_sum += b.state_loss * b.state_pred as f64;
        self.loc_loss_sum   += b.loc_loss * b.loc_pred as f64;
        self.state_correct  += b.state_correct;
        self.state_pred     += b.state_pred;
        self.loc_correct    += b.loc_correct;
        self.loc_pred       += b.loc_pred;
    }

    pub fn is_empty(&self) -> bool {
        self.state_pred == 0 && self.loc_pred == 0
    }

    pub fn state_loss(&self) -> f64 { ratio(self.state_loss_sum, self.state_pred) }

    pub fn loc_loss(&self) -> f64 { ratio(self.loc_loss_sum, self.loc_pred) }

    pub fn state_accuracy(&self) -> f64 { ratio(self.state_correct as f64, self.state_pred) }

    pub fn loc_accuracy(&self) -> f64 { ratio(self.loc_correct as f64, self.loc_pred) }

    pub fn total_accuracy(&self) -> f64 {
        ratio(
            (self.state_correct + self.loc_correct) as f64,
            self.state_pred + self.loc_pred,
        )
    }

    /// Model selection score: total accuracy in percent
    pub fn score(&self) -> f64 {
        self.total_accuracy() * 100.0
    }

    /// One-line human summary used by the training and evaluation logs
    pub fn summary(&self) -> String {
        format!(
            "state_loss={:.4} loc_loss={:.4} | total_acc={:.3}% state_acc={:.3}% loc_acc={:.3}%",
            self.state_loss(),
            self.loc_loss(),
            self.total_accuracy() * 100.0,
            self.state_accuracy() * 100.0,
            self.loc_accuracy() * 100.0,
        )
    }
}

/// One row of metrics data for a single evaluation round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRecord {
    pub epoch: usize,
    /// Evaluation round within the epoch (starts at 1)
    pub round: usize,
    pub train_state_loss: f64,
    pub train_loc_loss:   f64,
    pub train_acc:        f64,
    pub dev_state_loss:   f64,
    pub dev_loc_loss:     f64,
    pub dev_state_acc:    f64,
    pub dev_loc_acc:      f64,
    pub dev_score:        f64,
}

impl EvalRecord {
    pub fn new(epoch: usize, round: usize, train: &RunningStats, dev: &RunningStats) -> Self {
        Self {
            epoch,
            round,
            train_state_loss: train.state_loss(),
            train_loc_loss:   train.loc_loss(),
            train_acc:        train.total_accuracy(),
            dev_state_loss:   dev.state_loss(),
            dev_loc_loss:     dev.loc_loss(),
            dev_state_acc:    dev.state_accuracy(),
            dev_loc_acc:      dev.loc_accuracy(),
            dev_score:        dev.score(),
        }
    }

    /// Returns true if this round beat the previous best dev score
    pub fn is_improvement(&self, best_score: f64) -> bool {
        self.dev_score > best_score
    }
}

const CSV_HEADER: &str = "epoch,round,train_state_loss,train_loc_loss,train_acc,\
dev_state_loss,dev_loc_loss,dev_state_acc,dev_loc_acc,dev_score";

/// Appends evaluation rounds to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EvalRecord) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.round,
            m.train_state_loss,
            m.train_loc_loss,
            m.train_acc,
            m.dev_state_loss,
            m.dev_loc_loss,
            m.dev_state_acc,
            m.dev_loc_acc,
            m.dev_score,
        )?;

        tracing::debug!("Logged epoch {} round {} dev_score={:.3}", m.epoch, m.round, m.dev_score);
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

    fn batch(state_loss: f64, state: (usize, usize), loc_loss: f64, loc: (usize, usize)) -> BatchStats {
        BatchStats {
            state_loss,
            loc_loss,
            state_correct: state.0,
            state_pred:    state.1,
            loc_correct:   loc.0,
            loc_pred:      loc.1,
        }
    }

    #[test]
    fn test_losses_are_weighted_by_prediction_count() {
        let mut stats = RunningStats::default();
        stats.add(&batch(1.0, (1, 1), 2.0, (1, 1)));
        stats.add(&batch(4.0, (3, 3), 0.0, (0, 3)));
        // (1*1 + 4*3) / 4
        assert!((stats.state_loss() - 3.25).abs() < 1e-12);
        assert!((stats.loc_loss() - 0.5).abs() < 1e-12);
        // (4 + 1) / (4 + 4)
        assert!((stats.total_accuracy() - 0.625).abs() < 1e-12);
        assert!((stats.score() - 62.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_stats_report_zero() {
        let stats = RunningStats::default();
        assert!(stats.is_empty());
        assert_eq!(stats.score(), 0.0);
        assert_eq!(stats.loc_loss(), 0.0);
    }

    #[test]
    fn test_is_improvement() {
        let mut dev = RunningStats::default();
        dev.add(&batch(0.0, (1, 2), 0.0, (1, 2)));
        let m = EvalRecord::new(2, 1, &RunningStats::default(), &dev);
        // 50.0 > 40.0 → improvement
        assert!(m.is_improvement(40.0));
        // ties do not count
        assert!(!m.is_improvement(50.0));
    }

    #[test]
    fn test_logger_appends_rows_after_header() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        let stats = RunningStats::default();
        logger.log(&EvalRecord::new(1, 1, &stats, &stats)).unwrap();
        logger.log(&EvalRecord::new(1, 2, &stats, &stats)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[2].starts_with("1,2,"));
    }
}
