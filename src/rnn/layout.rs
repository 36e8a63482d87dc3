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

//! Offsets and sizes of every slot in a flat recurrent parameter buffer.
//!
//! All counts are in elements. Multiply by [`DataType::size_in_bytes`] for
//! byte sizes.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::OnceLock;

use serde::Serialize;
use tracing::debug;

use crate::rnn::catalog::{gate_group_count, MatrixKind};
use crate::rnn::config::RnnConfig;
use crate::rnn::error::RnnError;
use crate::rnn::topology::{canonical_slots, check_slot, checked_weight_slot_count, Slot};
use crate::runtime::types::DataType;

/// Contiguous sub-range of the parameter buffer holding one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SlotRange {
    pub offset: usize,
    pub len: usize,
    pub rows: usize,
    pub cols: usize,
}

impl SlotRange {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn as_range(&self) -> Range<usize> {
        self.offset..self.end()
    }

    pub fn size_bytes(&self, dtype: DataType) -> usize {
        self.len * dtype.size_in_bytes()
    }
}

/// `(rows, cols)` of the matrix or vector stored in `slot`.
///
/// The input projection of layer 0 reads raw features; above it, it reads
/// the previous layer's output, which is the concatenated forward and
/// backward state for bidirectional networks.
pub fn slot_shape(config: &RnnConfig, slot: &Slot) -> Result<(usize, usize), RnnError> {
    config.validate()?;
    check_slot(config, slot).map_err(|reason| RnnError::SlotNotFound {
        slot: *slot,
        reason,
    })?;
    Ok(shape(config, slot))
}

/// Shape of a slot of an already validated configuration, where no
/// dimension product overflows.
fn shape(config: &RnnConfig, slot: &Slot) -> (usize, usize) {
    let hidden = config.hidden_size();
    if slot.is_bias() {
        return (hidden, 1);
    }
    let cols = match slot.kind {
        MatrixKind::Input if slot.layer == 0 => config.input_size(),
        MatrixKind::Input => hidden * config.directions(),
        MatrixKind::Hidden => hidden,
    };
    (hidden, cols)
}

pub(crate) fn size_overflow() -> RnnError {
    RnnError::InvalidConfig("parameter buffer size overflows usize".to_string())
}

/// Element count of the whole buffer, or `None` when it does not fit in
/// `usize`. Closed form, so it runs before any slot is enumerated.
pub(crate) fn checked_total_size(config: &RnnConfig) -> Option<usize> {
    let hidden = config.hidden_size();
    let square = hidden.checked_mul(hidden)?;
    let first_input = if config.has_input_projection(0) {
        hidden.checked_mul(config.input_size())?
    } else {
        0
    };
    let upper_input = square.checked_mul(config.directions())?;
    let upper = upper_input
        .checked_add(square)?
        .checked_mul(config.num_layers().checked_sub(1)?)?;
    // Weights of one (direction, gate) pair summed over all layers.
    let per_gate = first_input.checked_add(square)?.checked_add(upper)?;
    let per_kind = config
        .directions()
        .checked_mul(gate_group_count(config.cell()))?;
    let weights = per_kind.checked_mul(per_gate)?;
    if !config.has_bias() {
        return Some(weights);
    }
    let biases = checked_weight_slot_count(config)?.checked_mul(hidden)?;
    weights.checked_add(biases)
}

/// Element count of the whole parameter buffer for `config`.
pub fn compute_total_size(config: &RnnConfig) -> Result<usize, RnnError> {
    config.validate()?;
    checked_total_size(config).ok_or_else(size_overflow)
}

/// Byte size of the parameter buffer, as reported to buffer allocators.
pub fn param_size_bytes(config: &RnnConfig, dtype: DataType) -> Result<usize, RnnError> {
    compute_total_size(config)?
        .checked_mul(dtype.size_in_bytes())
        .ok_or_else(size_overflow)
}

/// Resolves `slot` without caching. Prefer [`RnnParams::locate`] for
/// repeated lookups.
pub fn locate(config: &RnnConfig, slot: &Slot) -> Result<SlotRange, RnnError> {
    ParamLayout::build(config)?.locate(slot)
}

/// Ordered slots with their cumulative offsets.
#[derive(Clone, Debug)]
pub struct ParamLayout {
    config: RnnConfig,
    slots: Vec<Slot>,
    ranges: Vec<SlotRange>,
    index: HashMap<Slot, usize>,
    total: usize,
}

impl ParamLayout {
    pub fn build(config: &RnnConfig) -> Result<Self, RnnError> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    fn from_validated(config: &RnnConfig) -> Self {
        let slots = canonical_slots(config);

        let mut ranges = Vec::with_capacity(slots.len());
        let mut index = HashMap::with_capacity(slots.len());
        let mut offset = 0usize;
        for (position, slot) in slots.iter().enumerate() {
            // `validate` bounds the total, so neither product nor sum overflows.
            let (rows, cols) = shape(config, slot);
            let len = rows * cols;
            ranges.push(SlotRange {
                offset,
                len,
                rows,
                cols,
            });
            index.insert(*slot, position);
            offset += len;
        }

        debug!(
            config = %config,
            slots = slots.len(),
            total = offset,
            "derived rnn parameter layout"
        );

        ParamLayout {
            config: config.clone(),
            slots,
            ranges,
            index,
            total: offset,
        }
    }

    pub fn config(&self) -> &RnnConfig {
        &self.config
    }

    /// Total element count.
    pub fn total_size(&self) -> usize {
        self.total
    }

    pub fn total_bytes(&self, dtype: DataType) -> usize {
        self.total * dtype.size_in_bytes()
    }

    /// Slots in buffer order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn iter(&self) -> impl Iterator<Item = (Slot, SlotRange)> + '_ {
        self.slots.iter().copied().zip(self.ranges.iter().copied())
    }

    pub fn locate(&self, slot: &Slot) -> Result<SlotRange, RnnError> {
        check_slot(&self.config, slot).map_err(|reason| RnnError::SlotNotFound {
            slot: *slot,
            reason,
        })?;
        // Every slot accepted by `check_slot` is emitted by `canonical_slots`.
        Ok(self.ranges[self.index[slot]])
    }
}

/// A configuration together with its lazily derived layout.
///
/// The layout is computed on the first size or address query and shared by
/// every later query, including concurrent ones.
#[derive(Clone, Debug)]
pub struct RnnParams {
    config: RnnConfig,
    layout: OnceLock<ParamLayout>,
}

impl RnnParams {
    pub fn new(config: RnnConfig) -> Result<Self, RnnError> {
        config.validate()?;
        Ok(RnnParams {
            config,
            layout: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &RnnConfig {
        &self.config
    }

    pub fn layout(&self) -> &ParamLayout {
        self.layout.get_or_init(|| ParamLayout::from_validated(&self.config))
    }

    pub fn total_size(&self) -> usize {
        self.layout().total_size()
    }

    pub fn total_bytes(&self, dtype: DataType) -> usize {
        self.layout().total_bytes(dtype)
    }

    pub fn slots(&self) -> &[Slot] {
        self.layout().slots()
    }

    pub fn locate(&self, slot: &Slot) -> Result<SlotRange, RnnError> {
        self.layout().locate(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rnn::config::{BiasMode, BiasPlacement, CellType, Direction, InputMode};
    use crate::rnn::error::MissingSlot;

    fn relu_two_layers() -> RnnConfig {
        RnnConfig::new(CellType::Relu, 4, 2, 3).unwrap()
    }

    #[test]
    fn offsets_tile_the_buffer() {
        let config = RnnConfig::new(CellType::Lstm, 3, 3, 5)
            .unwrap()
            .with_direction(Direction::Bidirectional)
            .with_bias_mode(BiasMode::Present);
        let layout = ParamLayout::build(&config).unwrap();
        let mut cursor = 0;
        for (_, range) in layout.iter() {
            assert_eq!(range.offset, cursor);
            assert_eq!(range.rows * range.cols, range.len);
            cursor = range.end();
        }
        assert_eq!(cursor, layout.total_size());
        assert_eq!(compute_total_size(&config).unwrap(), layout.total_size());
    }

    #[test]
    fn layer_one_input_reads_both_directions() {
        let config = RnnConfig::new(CellType::Relu, 4, 2, 3)
            .unwrap()
            .with_direction(Direction::Bidirectional);
        let range = locate(&config, &Slot::weight(1, 1, MatrixKind::Input, 0)).unwrap();
        assert_eq!((range.rows, range.cols), (4, 8));
        let range = locate(&config, &Slot::weight(0, 1, MatrixKind::Input, 0)).unwrap();
        assert_eq!((range.rows, range.cols), (4, 3));
    }

    #[test]
    fn skip_mode_total() {
        let config = relu_two_layers().with_input_mode(InputMode::Skip);
        assert_eq!(compute_total_size(&config).unwrap(), 48);
        let range = locate(&config, &Slot::weight(0, 0, MatrixKind::Hidden, 0)).unwrap();
        assert_eq!(range.offset, 0);
    }

    #[test]
    fn bytes_scale_with_dtype() {
        let config = relu_two_layers();
        assert_eq!(param_size_bytes(&config, DataType::F32).unwrap(), 240);
        assert_eq!(param_size_bytes(&config, DataType::F16).unwrap(), 120);
    }

    #[test]
    fn cached_params_match_free_functions() {
        let config = relu_two_layers().with_bias_mode(BiasMode::Present);
        let params = RnnParams::new(config.clone()).unwrap();
        assert_eq!(params.total_size(), compute_total_size(&config).unwrap());
        for slot in params.slots() {
            assert_eq!(params.locate(slot).unwrap(), locate(&config, slot).unwrap());
        }
        let cloned = params.clone();
        assert_eq!(cloned.total_size(), params.total_size());
    }

    #[test]
    fn missing_bias_reports_reason() {
        let params = RnnParams::new(relu_two_layers()).unwrap();
        let slot = Slot::bias(0, 0, MatrixKind::Input, 0);
        assert_eq!(
            params.locate(&slot),
            Err(RnnError::SlotNotFound {
                slot,
                reason: MissingSlot::BiasDisabled,
            })
        );
    }

    #[test]
    fn closed_form_total_matches_enumeration() {
        for cell in CellType::ALL {
            for direction in [Direction::Unidirectional, Direction::Bidirectional] {
                for input_mode in [InputMode::Linear, InputMode::Skip] {
                    for bias_mode in [BiasMode::None, BiasMode::Present] {
                        let config = RnnConfig::new(cell, 3, 3, 7)
                            .unwrap()
                            .with_direction(direction)
                            .with_input_mode(input_mode)
                            .with_bias_mode(bias_mode)
                            .with_bias_placement(BiasPlacement::Trailing);
                        let layout = ParamLayout::build(&config).unwrap();
                        let summed: usize = layout.iter().map(|(_, range)| range.len).sum();
                        assert_eq!(compute_total_size(&config).unwrap(), summed, "{config}");
                    }
                }
            }
        }
    }

    #[test]
    fn slot_shape_checks_the_slot() {
        let config = relu_two_layers().with_input_mode(InputMode::Skip);
        assert_eq!(
            slot_shape(&config, &Slot::weight(1, 0, MatrixKind::Input, 0)),
            Ok((4, 4))
        );
        assert_eq!(
            slot_shape(&config, &Slot::weight(0, 0, MatrixKind::Input, 0)),
            Err(RnnError::SlotNotFound {
                slot: Slot::weight(0, 0, MatrixKind::Input, 0),
                reason: MissingSlot::SkippedInput,
            })
        );
    }

    #[test]
    fn setter_that_overflows_is_caught_by_every_entry_point() {
        // One direction fits even at f64 width; two do not.
        let narrow = RnnConfig::new(CellType::Relu, 1, 1, usize::MAX / 16).unwrap();
        assert_eq!(checked_total_size(&narrow), Some(usize::MAX / 16 + 1));

        let wide = narrow.with_direction(Direction::Bidirectional);
        assert_eq!(checked_total_size(&wide), Some(2 * (usize::MAX / 16 + 1)));
        assert_eq!(wide.validate(), Err(size_overflow()));
        assert_eq!(compute_total_size(&wide), Err(size_overflow()));
        assert_eq!(param_size_bytes(&wide, DataType::F16), Err(size_overflow()));
        assert!(ParamLayout::build(&wide).is_err());
        assert!(RnnParams::new(wide).is_err());
    }
}
