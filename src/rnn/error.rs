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

use std::fmt;

use crate::rnn::topology::Slot;
use crate::runtime::types::RuntimeError;

/// Why a slot coordinate has no range under a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingSlot {
    /// Physical layer index is not below `num_layers`.
    LayerOutOfRange { num_layers: usize },
    /// Direction index is not below the configured direction count.
    DirectionOutOfRange { directions: usize },
    /// Gate index is not below the cell's gate-group count.
    GateOutOfRange { gate_groups: usize },
    /// Input projection of layer 0 under skip input mode.
    SkippedInput,
    /// Bias requested while the network has no biases.
    BiasDisabled,
}

impl fmt::Display for MissingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingSlot::LayerOutOfRange { num_layers } => {
                write!(f, "network has {num_layers} layer(s)")
            }
            MissingSlot::DirectionOutOfRange { directions } => {
                write!(f, "network has {directions} direction(s)")
            }
            MissingSlot::GateOutOfRange { gate_groups } => {
                write!(f, "cell has {gate_groups} gate group(s)")
            }
            MissingSlot::SkippedInput => {
                write!(f, "layer 0 has no input projection in skip mode")
            }
            MissingSlot::BiasDisabled => write!(f, "network is configured without bias"),
        }
    }
}

/// Errors produced by the parameter layout engine and its accessors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RnnError {
    /// Shape or count parameters are malformed.
    #[error("invalid rnn configuration: {0}")]
    InvalidConfig(String),
    /// The coordinate does not exist under the configuration.
    #[error("slot {slot} not found: {reason}")]
    SlotNotFound { slot: Slot, reason: MissingSlot },
    /// Packed `(pseudo_layer, layer_id)` coordinate that maps to no slot.
    #[error("packed coordinate (layer {pseudo_layer}, id {layer_id}) not found: {reason}")]
    PackedNotFound {
        pseudo_layer: usize,
        layer_id: usize,
        reason: MissingSlot,
    },
    /// Buffer is shorter than the full parameter set.
    #[error("buffer too small: {required} bytes required, {available} available")]
    BufferTooSmall { required: usize, available: usize },
    /// Write payload length disagrees with the slot length.
    #[error("size mismatch: slot holds {expected} elements, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    /// Element type width disagrees with the buffer data type.
    #[error("element width mismatch: buffer stores {expected}-byte elements, got {actual}")]
    ElementWidth { expected: usize, actual: usize },
    /// Device access failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
