// ============================================================
// Layer 3 - Model Options
// ============================================================
// The closed sets of choices a training run can make.
// Each one parses from the exact string used on the command
// line and in train_config.json; anything else is a
// configuration error raised before a single tensor exists.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::errors::QaError;

/// Recurrent cell used by the question and passage encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Lstm,
    Gru,
}

impl FromStr for CellKind {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lstm" => Ok(CellKind::Lstm),
            "gru"  => Ok(CellKind::Gru),
            other  => Err(QaError::UnsupportedCellType(other.to_string())),
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellKind::Lstm => write!(f, "lstm"),
            CellKind::Gru  => write!(f, "gru"),
        }
    }
}

/// How the three recurrent stages are composed.
///
///   BiLstm   - bidirectional question and passage encoders, the
///              passage seeded per direction, 2-layer classifier
///   Baseline - unidirectional encoders, passage seeded directly by
///              the question state, 1-layer classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    BiLstm,
    Baseline,
}

impl ModelVariant {
    pub fn bidirectional(self) -> bool {
        matches!(self, ModelVariant::BiLstm)
    }

    pub fn classifier_layers(self) -> usize {
        match self {
            ModelVariant::BiLstm   => 2,
            ModelVariant::Baseline => 1,
        }
    }
}

impl FromStr for ModelVariant {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bilstm"   => Ok(ModelVariant::BiLstm),
            "baseline" => Ok(ModelVariant::Baseline),
            other      => Err(QaError::UnsupportedVariant(other.to_string())),
        }
    }
}

/// Whether the layers of a stacked cell get their own weights.
/// `Shared` reuses a single cell for every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerSharing {
    Independent,
    Shared,
}

impl FromStr for LayerSharing {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "independent" => Ok(LayerSharing::Independent),
            "shared"      => Ok(LayerSharing::Shared),
            other         => Err(QaError::UnsupportedLayerSharing(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    Sgd,
}

impl FromStr for OptimizerKind {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adam" => Ok(OptimizerKind::Adam),
            "sgd"  => Ok(OptimizerKind::Sgd),
            other  => Err(QaError::UnsupportedOptimizer(other.to_string())),
        }
    }
}
