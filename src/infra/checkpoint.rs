// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// Owns the run directory of one (dataset, embedding) pair:
//
//   runs/<dataset>/<embedding>/
//     vocab.json                 ← frozen vocabulary
//     train_config.json          ← hyperparameters of the run
//     checkpoints/
//       model-200.mpk.gz         ← parameter snapshots (extension
//       model-400.mpk.gz           chosen by the model's recorder)
//       checkpoint.json          ← latest + retained steps
//     summaries/
//       train/metrics.csv
//       dev/metrics.csv
//
// At most `max_to_keep` snapshots are retained. Saving one more
// deletes the oldest retained snapshot first-in-first-out.
// Snapshots already present when the store opens (a rerun into
// the same run directory) are adopted in step order, so they count
// toward the limit and are evicted like any other.
//
// The directory is created and probed for writability when the
// store is opened, so an unwritable location fails at startup
// instead of after hours of training.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
};

use crate::data::vocabulary::Vocabulary;
use crate::domain::traits::Snapshot;
use crate::error::PipelineError;

const PROBE_FILE: &str = ".write_probe";

/// Contents of checkpoints/checkpoint.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointManifest {
    pub latest:   Option<String>,
    pub retained: Vec<usize>,
}

pub struct CheckpointStore {
    run_dir:        PathBuf,
    checkpoint_dir: PathBuf,
    max_to_keep:    usize,
    /// oldest first
    retained: VecDeque<usize>,
}

impl CheckpointStore {
    /// Create `<root>/<dataset>/<embedding>/checkpoints` and make sure
    /// it accepts writes.
    pub fn open(root: &Path, dataset: &str, embedding: &str, max_to_keep: usize) -> Result<Self> {
        if max_to_keep == 0 {
            return Err(PipelineError::InvalidConfig("num_checkpoints must be positive".into()).into());
        }
        let run_dir        = root.join(dataset).join(embedding);
        let checkpoint_dir = run_dir.join("checkpoints");

        let unwritable = |e: std::io::Error| PipelineError::CheckpointDirUnwritable {
            path:   checkpoint_dir.clone(),
            reason: e.to_string(),
        };
        fs::create_dir_all(&checkpoint_dir).map_err(unwritable)?;
        let probe = checkpoint_dir.join(PROBE_FILE);
        fs::write(&probe, b"ok").map_err(unwritable)?;
        fs::remove_file(&probe).map_err(unwritable)?;

        tracing::info!("Writing to {}", run_dir.display());
        let retained = existing_steps(&checkpoint_dir)?;
        let mut store = Self { run_dir, checkpoint_dir, max_to_keep, retained };
        if !store.retained.is_empty() {
            tracing::info!(
                "Found {} snapshot(s) from an earlier run: {:?}",
                store.retained.len(),
                store.retained
            );
            store.enforce_limit()?;
            store.write_manifest()?;
        }
        Ok(store)
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    #[cfg(test)]
    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    /// `summaries/<kind>` under the run directory.
    pub fn summary_dir(&self, kind: &str) -> PathBuf {
        self.run_dir.join("summaries").join(kind)
    }

    pub fn save_vocabulary(&self, vocab: &Vocabulary) -> Result<PathBuf> {
        let path = self.run_dir.join("vocab.json");
        vocab.save(&path)?;
        tracing::debug!("Saved vocabulary to '{}'", path.display());
        Ok(path)
    }

    pub fn save_config<T: Serialize>(&self, cfg: &T) -> Result<()> {
        let path = self.run_dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Persist `model` as the snapshot for `step`, then evict the oldest
    /// snapshots beyond the retention limit. Returns the snapshot stem.
    pub fn save<S: Snapshot + ?Sized>(&mut self, model: &S, step: usize) -> Result<PathBuf> {
        let stem = self.stem(step);
        model.save_snapshot(&stem)?;

        // a rewritten step becomes the newest
        self.retained.retain(|&s| s != step);
        self.retained.push_back(step);
        self.enforce_limit()?;
        self.write_manifest()?;

        Ok(stem)
    }

    /// Steps whose snapshots are still on disk, oldest first.
    pub fn retained_steps(&self) -> Vec<usize> {
        self.retained.iter().copied().collect()
    }

    pub fn latest_step(&self) -> Option<usize> {
        self.retained.back().copied()
    }

    #[cfg(test)]
    pub fn load_manifest(&self) -> Result<CheckpointManifest> {
        let path = self.checkpoint_dir.join("checkpoint.json");
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn stem(&self, step: usize) -> PathBuf {
        self.checkpoint_dir.join(format!("model-{step}"))
    }

    fn enforce_limit(&mut self) -> Result<()> {
        while self.retained.len() > self.max_to_keep {
            if let Some(oldest) = self.retained.pop_front() {
                self.evict(oldest)?;
            }
        }
        Ok(())
    }

    /// Remove every file belonging to the snapshot of `step`,
    /// whatever extension the recorder gave it.
    fn evict(&self, step: usize) -> Result<()> {
        let name   = format!("model-{step}");
        let prefix = format!("{name}.");
        for entry in fs::read_dir(&self.checkpoint_dir)? {
            let entry = entry?;
            let file  = entry.file_name();
            let file  = file.to_string_lossy();
            if file == name || file.starts_with(&prefix) {
                fs::remove_file(entry.path()).with_context(|| {
                    format!("Cannot remove old checkpoint '{}'", entry.path().display())
                })?;
            }
        }
        tracing::debug!("Evicted checkpoint for step {}", step);
        Ok(())
    }

    fn write_manifest(&self) -> Result<()> {
        let manifest = CheckpointManifest {
            latest:   self.latest_step().map(|s| format!("model-{s}")),
            retained: self.retained_steps(),
        };
        let path = self.checkpoint_dir.join("checkpoint.json");
        fs::write(&path, serde_json::to_string_pretty(&manifest)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))
    }
}

/// Steps of the `model-<step>[.<ext>]` files in `dir`, ascending.
fn existing_steps(dir: &Path) -> Result<VecDeque<usize>> {
    let mut steps = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        let name = name.to_string_lossy();
        let step = name
            .strip_prefix("model-")
            .map(|rest| rest.split_once('.').map_or(rest, |(step, _)| step))
            .and_then(|step| step.parse::<usize>().ok());
        if let Some(step) = step {
            steps.push(step);
        }
    }
    steps.sort_unstable();
    steps.dedup();
    Ok(steps.into())
}
