// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// File layout:
//   checkpoints/
//     model_epoch_1.mpk    weights after epoch / meta-iteration 1
//     model_epoch_2.mpk
//     ...
//     latest_epoch.json    number of the newest weights file
//     model_spec.json      architecture, needed to rebuild the
//                          model before weights can be loaded
//
// CompactRecorder stores weights in half precision.
// The manager is generic over the module type, so DUALM and the
// hierarchical variant go through the same code.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::CompactRecorder,
};
use std::{fs, path::PathBuf};

use crate::application::model_spec::ModelSpec;

const LATEST_FILE: &str = "latest_epoch.json";
const SPEC_FILE:   &str = "model_spec.json";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Write the weights of `model` as checkpoint `epoch` and mark it latest.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize) -> Result<()> {
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        model
            .clone()
            .save_file(path.clone(), &CompactRecorder::new())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        fs::write(self.dir.join(LATEST_FILE), serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {LATEST_FILE}"))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the newest checkpoint into a freshly initialised `model`.
    /// The architecture must match the one the weights were saved from.
    pub fn load_model<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let epoch = self.latest_epoch()?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        model
            .load_file(path.clone(), &CompactRecorder::new(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })
    }

    pub fn save_spec(&self, spec: &ModelSpec) -> Result<()> {
        let path = self.dir.join(SPEC_FILE);
        fs::write(&path, serde_json::to_string_pretty(spec)?)
            .with_context(|| format!("Cannot write model spec to '{}'", path.display()))?;
        tracing::debug!("Saved model spec to '{}'", path.display());
        Ok(())
    }

    pub fn load_spec(&self) -> Result<ModelSpec> {
        let path = self.dir.join(SPEC_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read model spec from '{}'. Make sure you have run 'train' first.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{LATEST_FILE}'. Have you run 'train' first?"))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
