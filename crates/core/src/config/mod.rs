use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{beatmap::ZONE_COUNT, input::KeyMap, FilletError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub audio: AudioConfig,
    pub generator: GeneratorConfig,
}

impl AppConfig {
    /// Reads a JSON config file. Missing sections fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.input.keys.validate()?;
        self.audio.validate()?;
        self.generator.validate()
    }
}

/// Key bindings for the five zones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub keys: KeyMap,
}

/// Configuration specific to audio analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// FFT frame size used by onset detection.
    pub block_size: usize,
}

impl AudioConfig {
    fn validate(&self) -> Result<()> {
        if self.block_size < 2 {
            return Err(FilletError::InvalidInput("block_size must be at least 2"));
        }
        Ok(())
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            block_size: 1024,
        }
    }
}

/// Parameters for turning audio onsets into a beatmap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub zone_count: usize,
    /// 0.0 keeps every onset, 1.0 keeps only strong hits.
    pub sensitivity: f32,
    /// Onsets closer than this to the previous kept one are dropped.
    pub min_gap_ms: f64,
}

impl GeneratorConfig {
    fn validate(&self) -> Result<()> {
        if self.zone_count == 0 || self.zone_count > ZONE_COUNT {
            return Err(FilletError::msg(format!(
                "zone_count must be within 1..={ZONE_COUNT}, got {}",
                self.zone_count
            )));
        }
        if !(0.0..=1.0).contains(&self.sensitivity) {
            return Err(FilletError::InvalidInput("sensitivity must be within 0.0..=1.0"));
        }
        if !self.min_gap_ms.is_finite() || self.min_gap_ms < 0.0 {
            return Err(FilletError::InvalidInput("min_gap_ms must be non-negative"));
        }
        Ok(())
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            zone_count: ZONE_COUNT,
            sensitivity: 0.5,
            min_gap_ms: 300.0,
        }
    }
}
