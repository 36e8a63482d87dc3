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

//! Canonical slot ordering for recurrent parameter buffers.
//!
//! Slots are emitted layer by layer. Within a layer the input projection
//! precedes the hidden projection; within a projection the forward direction
//! precedes the backward one; within a direction gates ascend. For a
//! bidirectional layer this yields `Wx-fwd, Wx-bwd, Wh-fwd, Wh-bwd`.
//!
//! Layer 0 has no input projection in skip mode. Every other layer consumes
//! the previous layer's hidden output and always carries both kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rnn::catalog::{gate_group_count, MatrixKind};
use crate::rnn::config::{BiasPlacement, RnnConfig};
use crate::rnn::error::{MissingSlot, RnnError};
use crate::rnn::layout::size_overflow;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotRole {
    Weight,
    Bias,
}

/// One addressable weight matrix or bias vector in the flat buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    pub layer: usize,
    pub direction: usize,
    pub kind: MatrixKind,
    pub gate: usize,
    pub role: SlotRole,
}

impl Slot {
    pub const fn weight(layer: usize, direction: usize, kind: MatrixKind, gate: usize) -> Self {
        Slot {
            layer,
            direction,
            kind,
            gate,
            role: SlotRole::Weight,
        }
    }

    pub const fn bias(layer: usize, direction: usize, kind: MatrixKind, gate: usize) -> Self {
        Slot {
            layer,
            direction,
            kind,
            gate,
            role: SlotRole::Bias,
        }
    }

    /// The bias slot paired with this coordinate.
    pub const fn as_bias(self) -> Self {
        Slot {
            role: SlotRole::Bias,
            ..self
        }
    }

    pub const fn is_bias(&self) -> bool {
        matches!(self.role, SlotRole::Bias)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            SlotRole::Weight => "w",
            SlotRole::Bias => "b",
        };
        write!(
            f,
            "L{}.d{}.{}[{}].{}",
            self.layer, self.direction, self.kind, self.gate, role
        )
    }
}

/// Checks that `slot` exists under `config` without building a layout.
pub fn check_slot(config: &RnnConfig, slot: &Slot) -> Result<(), MissingSlot> {
    if slot.layer >= config.num_layers() {
        return Err(MissingSlot::LayerOutOfRange {
            num_layers: config.num_layers(),
        });
    }
    if slot.direction >= config.directions() {
        return Err(MissingSlot::DirectionOutOfRange {
            directions: config.directions(),
        });
    }
    let gate_groups = gate_group_count(config.cell());
    if slot.gate >= gate_groups {
        return Err(MissingSlot::GateOutOfRange { gate_groups });
    }
    if slot.kind == MatrixKind::Input && !config.has_input_projection(slot.layer) {
        return Err(MissingSlot::SkippedInput);
    }
    if slot.is_bias() && !config.has_bias() {
        return Err(MissingSlot::BiasDisabled);
    }
    Ok(())
}

/// Number of weight slots, or `None` when the count overflows.
pub(crate) fn checked_weight_slot_count(config: &RnnConfig) -> Option<usize> {
    let per_kind = config
        .directions()
        .checked_mul(gate_group_count(config.cell()))?;
    let kinds = config
        .num_layers()
        .checked_mul(2)?
        .checked_sub(usize::from(!config.has_input_projection(0)))?;
    kinds.checked_mul(per_kind)
}

/// Number of slots `ordered_slots` produces for `config`.
pub fn slot_count(config: &RnnConfig) -> Result<usize, RnnError> {
    config.validate()?;
    // Every slot holds at least one element, so a validated total bounds this.
    let weights = checked_weight_slot_count(config).ok_or_else(size_overflow)?;
    Ok(if config.has_bias() { weights * 2 } else { weights })
}

/// Enumerates every existing slot in canonical buffer order.
pub fn ordered_slots(config: &RnnConfig) -> Result<Vec<Slot>, RnnError> {
    config.validate()?;
    Ok(canonical_slots(config))
}

pub(crate) fn canonical_slots(config: &RnnConfig) -> Vec<Slot> {
    let weights = weight_slots(config);
    let slots = if !config.has_bias() {
        weights
    } else {
        match config.bias_placement() {
            BiasPlacement::Interleaved => weights
                .into_iter()
                .flat_map(|slot| [slot, slot.as_bias()])
                .collect(),
            BiasPlacement::Trailing => {
                let biases: Vec<Slot> = weights.iter().map(|slot| slot.as_bias()).collect();
                weights.into_iter().chain(biases).collect()
            }
        }
    };

    debug_assert_eq!(Ok(slots.len()), slot_count(config));
    slots
}

fn weight_slots(config: &RnnConfig) -> Vec<Slot> {
    let gates = gate_group_count(config.cell());
    let mut slots = Vec::with_capacity(checked_weight_slot_count(config).unwrap_or(0));

    for layer in 0..config.num_layers() {
        for kind in MatrixKind::ALL {
            if kind == MatrixKind::Input && !config.has_input_projection(layer) {
                continue;
            }
            for direction in 0..config.directions() {
                for gate in 0..gates {
                    slots.push(Slot::weight(layer, direction, kind, gate));
                }
            }
        }
    }

    slots
}
