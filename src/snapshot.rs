use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::{GainParams, MatrixShape, MixerError, MixerResult};

/// The live target gains of a matrix, row-major.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GainSnapshot {
    pub inputs: usize,
    pub outputs: usize,
    pub gains: Vec<f32>,
}

impl GainSnapshot {
    pub fn capture(params: &GainParams) -> Self {
        let shape = params.shape();
        Self {
            inputs: shape.inputs,
            outputs: shape.outputs,
            gains: params.to_vec(),
        }
    }

    pub fn shape(&self) -> MixerResult<MatrixShape> {
        let shape = MatrixShape::new(self.inputs, self.outputs)?;
        if self.gains.len() != shape.cells() {
            return Err(MixerError::Snapshot(format!(
                "{} gains stored for a {shape} matrix",
                self.gains.len()
            )));
        }
        Ok(shape)
    }

    /// Writes the stored gains as new targets. The shapes must match.
    pub fn apply(&self, params: &GainParams) -> MixerResult<()> {
        params.shape().expect(self.shape()?)?;
        params.set_all(&self.gains)
    }

    pub fn to_ron(&self) -> MixerResult<String> {
        let config = ron::ser::PrettyConfig::new()
            .depth_limit(2)
            .indentor("  ".to_string());
        ron::ser::to_string_pretty(self, config).map_err(|e| MixerError::Snapshot(e.to_string()))
    }

    pub fn from_ron(content: &str) -> MixerResult<Self> {
        let snapshot: GainSnapshot =
            ron::from_str(content).map_err(|e| MixerError::Snapshot(e.to_string()))?;
        snapshot.shape()?;
        Ok(snapshot)
    }
}

pub fn save_snapshot(path: &Path, params: &GainParams) -> MixerResult<()> {
    let content = GainSnapshot::capture(params).to_ron()?;
    fs::write(path, content)?;
    log::info!("Saved {} gains to {}", params.shape(), path.display());
    Ok(())
}

pub fn load_snapshot(path: &Path, params: &GainParams) -> MixerResult<()> {
    let content = fs::read_to_string(path)?;
    GainSnapshot::from_ron(&content)?.apply(params)?;
    log::info!("Loaded {} gains from {}", params.shape(), path.display());
    Ok(())
}
