//! Requested routing mode.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Caller-requested mode.
///
/// `Cpu` and `Gpu` force the corresponding backend; `Adaptive` lets the
/// load-based rules decide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Force the CPU-oriented model.
    Cpu,
    /// Force the GPU-oriented model.
    Gpu,
    /// Evaluate the adaptive rules.
    #[default]
    Adaptive,
}

impl Mode {
    /// Every mode, in the order the replay harness exercises them.
    pub const ALL: [Mode; 3] = [Mode::Cpu, Mode::Gpu, Mode::Adaptive];

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            "adaptive" => Ok(Self::Adaptive),
            other => Err(format!(
                "unknown mode '{other}' (expected cpu, gpu or adaptive)"
            )),
        }
    }
}
