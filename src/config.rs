use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{MatrixMixer, MatrixShape, MixerError, MixerResult, Smoothing, parse_routes, routes_to_gains};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub inputs: usize,
    pub outputs: usize,
    pub sample_rate: f64,
    pub smoothing: Smoothing,
    /// Unity on the diagonal when no routes are given.
    pub identity: bool,
    /// Route notation, see [`crate::parse_routes`].
    pub routes: Option<String>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            inputs: 2,
            outputs: 2,
            sample_rate: 48000.0,
            smoothing: Smoothing::default(),
            identity: true,
            routes: None,
        }
    }
}

impl MixerConfig {
    pub fn from_toml(content: &str) -> MixerResult<Self> {
        toml::from_str(content).map_err(|e| MixerError::Config(e.to_string()))
    }

    pub fn shape(&self) -> MixerResult<MatrixShape> {
        MatrixShape::new(self.inputs, self.outputs)
    }

    pub fn initial_gains(&self) -> MixerResult<Vec<f32>> {
        let shape = self.shape()?;
        if let Some(routes) = &self.routes {
            return routes_to_gains(&parse_routes(routes, shape)?, shape);
        }
        Ok((0..shape.cells())
            .map(|index| {
                if self.identity && shape.is_diagonal(index) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect())
    }

    /// Builds a mixer whose targets hold the configured gains. Applied gains
    /// start at zero.
    pub fn build(&self) -> MixerResult<MatrixMixer> {
        let mixer = MatrixMixer::with_smoothing(self.shape()?, self.sample_rate, self.smoothing)?;
        mixer.params().set_all(&self.initial_gains()?)?;
        Ok(mixer)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs_path().map(|p| p.join("config.toml"))
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config").join("matmix"))
}

pub fn load_config_from(path: &Path) -> MixerResult<MixerConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = MixerConfig::from_toml(&content)?;
    log::info!(
        "Loaded {} ({}x{} @ {} Hz)",
        path.display(),
        config.inputs,
        config.outputs,
        config.sample_rate
    );
    Ok(config)
}

/// Reads the user config, falling back to defaults when it is missing or broken.
pub fn load_config() -> MixerConfig {
    let Some(path) = config_path() else {
        return MixerConfig::default();
    };
    if !path.exists() {
        return MixerConfig::default();
    }
    match load_config_from(&path) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Failed to load {}: {}", path.display(), e);
            MixerConfig::default()
        }
    }
}
