// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets written:
//   1. Model weights — all learned parameters (encoder, decoder,
//      CRF potentials, location head)
//   2. best_checkpoint.json — which best checkpoint is newest
//   3. train_config.json    — architecture + embedding settings
//
// The config is needed because loading weights requires a model
// of the exact same shape. Evaluate and predict rebuild the model
// from train_config.json and then load the weights into it.
//
// File naming convention (scores use '_' for the decimal point
// since the recorder appends its own extension):
//   checkpoints/
//     best_checkpoint_41_250.mpk   ← new best dev score 41.250
//     checkpoint_39_875.mpk        ← non-best round (save mode "all")
//     best_checkpoint.json
//     train_config.json
//     metrics.csv
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::NcetModel;

const CONFIG_FILE: &str = "train_config.json";
const BEST_POINTER: &str = "best_checkpoint.json";

/// Which evaluation rounds produce a checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    /// Only rounds that improve the best dev score
    #[default]
    Best,
    /// Every round; non-best ones as checkpoint_<score>
    All,
}

#[derive(Debug, Serialize, Deserialize)]
struct BestPointer {
    name:  String,
    score: f64,
}

/// Manages saving and loading of model checkpoints.
pub struct CheckpointManager {
    dir:     PathBuf,
    mode:    SaveMode,
    /// false with --no-save-ckpt: weights are never written
    enabled: bool,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>, mode: SaveMode, enabled: bool) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir, mode, enabled })
    }

    /// Read-only manager for evaluate / predict.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), mode: SaveMode::Best, enabled: false }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save weights as best_checkpoint_<score> and point best_checkpoint.json at it.
    pub fn save_best<B: Backend>(&self, model: &NcetModel<B>, score: f64) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let name = format!("best_checkpoint_{}", score_tag(score));
        self.record(model, &name)?;

        let pointer = serde_json::to_string_pretty(&BestPointer { name: name.clone(), score })?;
        let path = self.dir.join(BEST_POINTER);
        fs::write(&path, pointer)
            .with_context(|| format!("Failed to write '{}'", path.display()))?;

        tracing::info!("Saved checkpoint '{name}'");
        Ok(())
    }

    /// Save a non-best round; only in SaveMode::All.
    pub fn save_round<B: Backend>(&self, model: &NcetModel<B>, score: f64) -> Result<()> {
        if !self.enabled || self.mode != SaveMode::All {
            return Ok(());
        }
        let name = format!("checkpoint_{}", score_tag(score));
        self.record(model, &name)?;
        tracing::info!("Saved checkpoint '{name}'");
        Ok(())
    }

    fn record<B: Backend>(&self, model: &NcetModel<B>, name: &str) -> Result<()> {
        // Path without extension — the recorder adds it
        let path = self.dir.join(name);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))
    }

    /// Load weights into `model`, from `restore` when given, otherwise
    /// from the newest best checkpoint in the directory.
    pub fn load_model<B: Backend>(
        &self,
        model:   NcetModel<B>,
        restore: Option<&Path>,
        device:  &B::Device,
    ) -> Result<NcetModel<B>> {
        let path = match restore {
            Some(path) => record_stem(path),
            None       => self.dir.join(self.best_name()?),
        };
        tracing::info!("Loading checkpoint '{}'", path.display());

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// Called before training starts so evaluate/predict can rebuild the model.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train' with this checkpoint directory.",
                    path.display()
                )
            })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }

    fn best_name(&self) -> Result<String> {
        let path = self.dir.join(BEST_POINTER);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{}'. Have you run 'train' first?", path.display()))?;
        let pointer: BestPointer = serde_json::from_str(&s)
            .with_context(|| format!("Malformed '{}'", path.display()))?;
        Ok(pointer.name)
    }
}

/// 41.25 → "41_250"
fn score_tag(score: f64) -> String {
    format!("{score:.3}").replace('.', "_")
}

/// Accept restore paths with or without the recorder's extension.
fn record_stem(path: &Path) -> PathBuf {
    let lossy = path.to_string_lossy();
    let s: &str = &lossy;
    let stem = s
        .strip_suffix(".mpk.gz")
        .or_else(|| s.strip_suffix(".mpk"))
        .unwrap_or(s);
    PathBuf::from(stem)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{host, model::NcetConfig};
    use burn::backend::NdArray;

    fn tiny() -> NcetConfig {
        NcetConfig::new(4, 4, 2)
    }

    fn checkpoint_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.contains("checkpoint_"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_score_tag_has_no_dots() {
        assert_eq!(score_tag(41.25), "41_250");
        assert_eq!(score_tag(100.0), "100_000");
    }

    #[test]
    fn test_record_stem_strips_extensions() {
        assert_eq!(record_stem(Path::new("ck/best_checkpoint_1_000.mpk")), PathBuf::from("ck/best_checkpoint_1_000"));
        assert_eq!(record_stem(Path::new("ck/a.mpk.gz")), PathBuf::from("ck/a"));
        assert_eq!(record_stem(Path::new("ck/a")), PathBuf::from("ck/a"));
    }

    #[test]
    fn test_best_round_trip_restores_weights() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let ckpt = CheckpointManager::new(dir.path(), SaveMode::Best, true).unwrap();

        let model = tiny().init::<NdArray>(&device);
        ckpt.save_best(&model, 12.5).unwrap();

        let fresh = tiny().init::<NdArray>(&device);
        let loaded = ckpt.load_model(fresh, None, &device).unwrap();

        let a = host::floats(model.crf.transitions.val()).unwrap();
        let b = host::floats(loaded.crf.transitions.val()).unwrap();
        // compact records are half precision
        assert!(a.iter().zip(&b).all(|(x, y)| (x - y).abs() < 1e-3));
    }

    #[test]
    fn test_save_mode_controls_round_checkpoints() {
        let device = Default::default();
        let model = tiny().init::<NdArray>(&device);

        let best_only = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(best_only.path(), SaveMode::Best, true).unwrap();
        ckpt.save_round(&model, 10.0).unwrap();
        assert!(checkpoint_names(best_only.path()).is_empty());

        let all = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(all.path(), SaveMode::All, true).unwrap();
        ckpt.save_round(&model, 10.0).unwrap();
        assert_eq!(checkpoint_names(all.path()).len(), 1);
        assert!(checkpoint_names(all.path())[0].starts_with("checkpoint_10_000"));
    }

    #[test]
    fn test_disabled_manager_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let model = tiny().init::<NdArray>(&Default::default());
        let ckpt = CheckpointManager::new(dir.path(), SaveMode::All, false).unwrap();
        ckpt.save_best(&model, 50.0).unwrap();
        ckpt.save_round(&model, 40.0).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_best_pointer_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let model = tiny().init::<NdArray>(&Default::default());
        let err = CheckpointManager::open(dir.path())
            .load_model(model, None, &Default::default())
            .unwrap_err();
        assert!(err.to_string().contains("best_checkpoint.json"));
    }
}
