//! Reactor topology tag.

use crate::error::ReactorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four ideal reactor topologies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReactorKind {
    Batch,
    #[serde(rename = "Fed-batch", alias = "FedBatch")]
    FedBatch,
    #[serde(rename = "CSTR", alias = "Cstr")]
    Cstr,
    #[serde(rename = "PFR", alias = "Pfr")]
    Pfr,
}

impl ReactorKind {
    pub fn name(self) -> &'static str {
        match self {
            ReactorKind::Batch => "Batch",
            ReactorKind::FedBatch => "Fed-batch",
            ReactorKind::Cstr => "CSTR",
            ReactorKind::Pfr => "PFR",
        }
    }

    /// Whether the independent variable is volume rather than time.
    pub fn is_flow_through(self) -> bool {
        matches!(self, ReactorKind::Pfr)
    }

    /// Whether the state carries the liquid volume next to the amounts.
    pub fn tracks_volume(self) -> bool {
        matches!(self, ReactorKind::FedBatch | ReactorKind::Cstr)
    }
}

impl fmt::Display for ReactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReactorKind {
    type Err = ReactorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "batch" => Ok(ReactorKind::Batch),
            "fedbatch" => Ok(ReactorKind::FedBatch),
            "cstr" => Ok(ReactorKind::Cstr),
            "pfr" => Ok(ReactorKind::Pfr),
            _ => Err(ReactorError::config(format!(
                "unknown reactor type '{s}' (expected Batch, Fed-batch, CSTR or PFR)"
            ))),
        }
    }
}
