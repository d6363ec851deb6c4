// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Single entry point: parse flags, install the Ctrl-C handler,
// hand a TrainConfig to Layer 2, print where the run landed.
//
// Ctrl-C only raises a flag. The training loop finishes its
// current step, writes a checkpoint and returns normally.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod args;

use anyhow::{Context, Result};
use args::TrainArgs;
use clap::Parser;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::application::train_use_case::{TrainConfig, TrainUseCase};

#[derive(Parser, Debug)]
#[command(
    name = "textcnn-trainer",
    version,
    about = "Train a convolutional sentence classifier on a configured corpus."
)]
pub struct Cli {
    #[command(flatten)]
    pub train: TrainArgs,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        ctrlc::set_handler(move || {
            tracing::warn!("Interrupt received, stopping after the current step");
            flag.store(true, Ordering::SeqCst);
        })
        .context("Cannot install Ctrl-C handler")?;

        let config: TrainConfig = self.train.into();
        tracing::debug!("Parameters: {:?}", config);

        let outcome = TrainUseCase::new(config).with_shutdown(shutdown).execute()?;

        if outcome.state.interrupted {
            println!("Training interrupted at step {}.", outcome.state.step);
        } else {
            println!("Training complete after {} steps.", outcome.state.step);
        }
        if let Some(step) = outcome.state.checkpoints.last() {
            println!("Latest checkpoint: step {step}");
        }
        println!("Run directory: {}", outcome.run_dir.display());
        Ok(())
    }
}
