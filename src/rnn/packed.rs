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

//! Packed `(pseudo_layer, layer_id)` addressing used by descriptor-style APIs.
//!
//! A pseudo layer enumerates `(layer, direction)` pairs as
//! `layer * directions + direction`. Within a pseudo layer, ids `0..G` are the
//! input projection gates and `G..2G` the hidden projection gates. At the
//! skip boundary (layer 0 in skip mode) only `0..G` exist and they address
//! the hidden projection.

use crate::rnn::catalog::{gate_group_count, MatrixKind};
use crate::rnn::config::RnnConfig;
use crate::rnn::error::{MissingSlot, RnnError};
use crate::rnn::topology::{check_slot, Slot, SlotRole};

/// Number of pseudo layers (`num_layers * directions`).
pub fn pseudo_layer_count(config: &RnnConfig) -> usize {
    config.num_layers() * config.directions()
}

/// Number of valid layer ids in `pseudo_layer`.
pub fn packed_ids_per_layer(config: &RnnConfig, pseudo_layer: usize) -> usize {
    let gates = gate_group_count(config.cell());
    let layer = pseudo_layer / config.directions();
    if config.has_input_projection(layer) {
        2 * gates
    } else {
        gates
    }
}

impl Slot {
    /// Resolves a packed coordinate to a slot that exists under `config`.
    pub fn from_packed(
        config: &RnnConfig,
        pseudo_layer: usize,
        layer_id: usize,
        role: SlotRole,
    ) -> Result<Slot, RnnError> {
        let not_found = |reason| RnnError::PackedNotFound {
            pseudo_layer,
            layer_id,
            reason,
        };

        let directions = config.directions();
        let layer = pseudo_layer / directions;
        let direction = pseudo_layer % directions;
        if layer >= config.num_layers() {
            return Err(not_found(MissingSlot::LayerOutOfRange {
                num_layers: config.num_layers(),
            }));
        }

        let gates = gate_group_count(config.cell());
        if layer_id >= packed_ids_per_layer(config, pseudo_layer) {
            return Err(not_found(MissingSlot::GateOutOfRange { gate_groups: gates }));
        }

        let kind = if config.has_input_projection(layer) && layer_id < gates {
            MatrixKind::Input
        } else {
            MatrixKind::Hidden
        };
        let slot = Slot {
            layer,
            direction,
            kind,
            gate: layer_id % gates,
            role,
        };
        check_slot(config, &slot).map_err(not_found)?;
        Ok(slot)
    }

    /// Inverse of [`Slot::from_packed`].
    pub fn to_packed(&self, config: &RnnConfig) -> Result<(usize, usize), RnnError> {
        check_slot(config, self).map_err(|reason| RnnError::SlotNotFound {
            slot: *self,
            reason,
        })?;
        let gates = gate_group_count(config.cell());
        let pseudo_layer = self.layer * config.directions() + self.direction;
        let layer_id = match self.kind {
            MatrixKind::Hidden if config.has_input_projection(self.layer) => gates + self.gate,
            _ => self.gate,
        };
        Ok((pseudo_layer, layer_id))
    }
}
