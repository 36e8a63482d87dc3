// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! Recurrent network configuration.
//!
//! A [`RnnConfig`] is validated on construction and immutable afterwards;
//! the `with_*` setters consume the value and return a new configuration.
//! Configurations deserialize from TOML through the same validation path:
//!
//! ```toml
//! hidden_size = 16
//! num_layers = 2
//! input_size = 8
//! cell = "lstm"
//! direction = "bidirectional"
//! input_mode = "skip"
//! bias_mode = "present"
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::rnn::error::RnnError;
use crate::rnn::layout::{checked_total_size, size_overflow};
use crate::runtime::types::DataType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Unidirectional,
    Bidirectional,
}

impl Direction {
    /// Number of directions evaluated per physical layer.
    pub const fn count(self) -> usize {
        match self {
            Direction::Unidirectional => 1,
            Direction::Bidirectional => 2,
        }
    }
}

/// Recurrent cell flavour. `Relu` and `Tanh` differ only in activation.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    #[default]
    Relu,
    Tanh,
    Lstm,
    Gru,
}

impl CellType {
    pub const ALL: [CellType; 4] = [CellType::Relu, CellType::Tanh, CellType::Lstm, CellType::Gru];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Layer 0 learns an input projection.
    #[default]
    Linear,
    /// Layer 0 consumes its input directly.
    Skip,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiasMode {
    #[default]
    None,
    Present,
}

/// Where bias slots sit relative to weight slots in the flat buffer.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BiasPlacement {
    /// Every weight slot is immediately followed by its bias slot.
    #[default]
    Interleaved,
    /// All weights first, then all biases in the same order.
    Trailing,
}

/// Errors raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rnn config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Shape and mode parameters of a recurrent network.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct RnnConfig {
    hidden_size: usize,
    num_layers: usize,
    input_size: usize,
    cell: CellType,
    direction: Direction,
    input_mode: InputMode,
    bias_mode: BiasMode,
    bias_placement: BiasPlacement,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    hidden_size: usize,
    num_layers: usize,
    input_size: usize,
    #[serde(default)]
    cell: CellType,
    #[serde(default)]
    direction: Direction,
    #[serde(default)]
    input_mode: InputMode,
    #[serde(default)]
    bias_mode: BiasMode,
    #[serde(default)]
    bias_placement: BiasPlacement,
}

impl TryFrom<RawConfig> for RnnConfig {
    type Error = RnnError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let config = RnnConfig {
            hidden_size: raw.hidden_size,
            num_layers: raw.num_layers,
            input_size: raw.input_size,
            cell: raw.cell,
            direction: raw.direction,
            input_mode: raw.input_mode,
            bias_mode: raw.bias_mode,
            bias_placement: raw.bias_placement,
        };
        config.validate()?;
        Ok(config)
    }
}

impl RnnConfig {
    /// Creates a unidirectional, linear-input, bias-free configuration.
    pub fn new(
        cell: CellType,
        hidden_size: usize,
        num_layers: usize,
        input_size: usize,
    ) -> Result<Self, RnnError> {
        let config = RnnConfig {
            hidden_size,
            num_layers,
            input_size,
            cell,
            direction: Direction::default(),
            input_mode: InputMode::default(),
            bias_mode: BiasMode::default(),
            bias_placement: BiasPlacement::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_input_mode(mut self, input_mode: InputMode) -> Self {
        self.input_mode = input_mode;
        self
    }

    pub fn with_bias_mode(mut self, bias_mode: BiasMode) -> Self {
        self.bias_mode = bias_mode;
        self
    }

    pub fn with_bias_placement(mut self, bias_placement: BiasPlacement) -> Self {
        self.bias_placement = bias_placement;
        self
    }

    /// Checks the structural invariants the layout engine relies on.
    ///
    /// Beyond positive sizes, the byte size of the whole buffer must fit in
    /// `usize` for the widest element type, so later offset arithmetic never
    /// overflows.
    pub fn validate(&self) -> Result<(), RnnError> {
        let checks = [
            ("hidden_size", self.hidden_size),
            ("num_layers", self.num_layers),
            ("input_size", self.input_size),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(RnnError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        checked_total_size(self)
            .and_then(|total| total.checked_mul(DataType::WIDEST.size_in_bytes()))
            .map(|_| ())
            .ok_or_else(size_overflow)
    }

    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(src)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn num_layers(&self) -> usize {
        self.num_layers
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn cell(&self) -> CellType {
        self.cell
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    pub fn bias_mode(&self) -> BiasMode {
        self.bias_mode
    }

    pub fn bias_placement(&self) -> BiasPlacement {
        self.bias_placement
    }

    pub fn directions(&self) -> usize {
        self.direction.count()
    }

    pub fn has_bias(&self) -> bool {
        matches!(self.bias_mode, BiasMode::Present)
    }

    /// True when physical layer `layer` carries an input projection.
    pub fn has_input_projection(&self, layer: usize) -> bool {
        !(layer == 0 && matches!(self.input_mode, InputMode::Skip))
    }
}

impl fmt::Display for RnnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} hidden={} layers={} input={} {:?} {:?} bias={:?}",
            self.cell,
            self.hidden_size,
            self.num_layers,
            self.input_size,
            self.direction,
            self.input_mode,
            self.bias_mode,
        )?;
        if self.has_bias() {
            write!(f, "/{:?}", self.bias_placement)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sizes_are_rejected() {
        for (hidden, layers, input) in [(0, 1, 1), (1, 0, 1), (1, 1, 0)] {
            let err = RnnConfig::new(CellType::Lstm, hidden, layers, input).unwrap_err();
            assert!(matches!(err, RnnError::InvalidConfig(_)), "{err}");
        }
    }

    #[test]
    fn parses_toml_with_defaults() {
        let config = RnnConfig::from_toml_str(
            "hidden_size = 4\nnum_layers = 2\ninput_size = 3\ncell = \"gru\"\n",
        )
        .unwrap();
        assert_eq!(config.cell(), CellType::Gru);
        assert_eq!(config.direction(), Direction::Unidirectional);
        assert_eq!(config.input_mode(), InputMode::Linear);
        assert_eq!(config.bias_mode(), BiasMode::None);
        assert_eq!(config.bias_placement(), BiasPlacement::Interleaved);
    }

    #[test]
    fn toml_goes_through_validation() {
        let err =
            RnnConfig::from_toml_str("hidden_size = 0\nnum_layers = 2\ninput_size = 3\n")
                .unwrap_err();
        assert!(err.to_string().contains("hidden_size must be positive"), "{err}");
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        let err = RnnConfig::from_toml_str(
            "hidden_size = 4\nnum_layers = 2\ninput_size = 3\nbatch = 8\n",
        );
        assert!(err.is_err());
    }

    #[test]
    fn skip_only_removes_layer_zero_input() {
        let config = RnnConfig::new(CellType::Relu, 4, 3, 3)
            .unwrap()
            .with_input_mode(InputMode::Skip);
        assert!(!config.has_input_projection(0));
        assert!(config.has_input_projection(1));
        assert!(config.has_input_projection(2));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn toml_sizes_that_overflow_are_rejected() {
        let err = RnnConfig::from_toml_str(
            "hidden_size = 4294967296\nnum_layers = 1\ninput_size = 1\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("overflows usize"), "{err}");
    }
}
