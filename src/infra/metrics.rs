// ============================================================
// Layer 6 — Training Summaries
// ============================================================
// One CSV row per reported step, in a file started fresh by each run:
//
//   step,loss,accuracy,learning_rate
//   50,0.693102,0.531250,0.000500
//   ...
//
// Two writers per run: summaries/train for training steps and
// summaries/dev for evaluations (learning_rate left empty).
//
// Summaries are observational only. `SummarySink` wraps both
// writers and turns any I/O failure into a single warning,
// after which that writer is switched off; training carries on.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub step:          usize,
    pub loss:          f64,
    pub accuracy:      f64,
    pub learning_rate: Option<f64>,
}

/// One CSV file of summary rows.
pub struct SummaryWriter {
    csv_path: PathBuf,
}

impl SummaryWriter {
    /// Create `dir/metrics.csv` holding only the header. Rows left by
    /// an earlier run in the same directory are discarded.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");
        let mut f = fs::File::create(&csv_path)?;
        writeln!(f, "step,loss,accuracy,learning_rate")?;
        Ok(Self { csv_path })
    }

    pub fn log(&self, row: &SummaryRow) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        let lr = row.learning_rate.map(|lr| format!("{lr:.6}")).unwrap_or_default();
        writeln!(f, "{},{:.6},{:.6},{}", row.step, row.loss, row.accuracy, lr)?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

/// Best-effort train/dev summary output.
#[derive(Default)]
pub struct SummarySink {
    train: Option<SummaryWriter>,
    dev:   Option<SummaryWriter>,
}

impl SummarySink {
    /// Open both writers; a writer that cannot be created is skipped
    /// with a warning.
    pub fn open(train_dir: &Path, dev_dir: &Path) -> Self {
        Self {
            train: open_or_warn(train_dir),
            dev:   open_or_warn(dev_dir),
        }
    }

    pub fn train(&mut self, row: SummaryRow) {
        log_or_disable(&mut self.train, &row);
    }

    pub fn dev(&mut self, row: SummaryRow) {
        log_or_disable(&mut self.dev, &row);
    }
}

fn open_or_warn(dir: &Path) -> Option<SummaryWriter> {
    match SummaryWriter::new(dir) {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!("Summaries disabled for '{}': {}", dir.display(), e);
            None
        }
    }
}

fn log_or_disable(writer: &mut Option<SummaryWriter>, row: &SummaryRow) {
    let failed = match writer.as_ref().map(|w| (w, w.log(row))) {
        Some((w, Err(e))) => {
            tracing::warn!("Summary write to '{}' failed, disabling: {}", w.csv_path().display(), e);
            true
        }
        _ => false,
    };
    if failed {
        *writer = None;
    }
}
