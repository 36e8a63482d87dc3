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

//! Copying single slots in and out of a caller-owned parameter buffer.
//!
//! The accessors never allocate or resize the buffer. Every check runs before
//! the first byte moves, so a failed write leaves the buffer untouched.

use std::mem::size_of;

use bytemuck::Pod;
use tracing::trace;

use crate::rnn::error::RnnError;
use crate::rnn::layout::{ParamLayout, RnnParams, SlotRange};
use crate::rnn::topology::Slot;
use crate::runtime::memory::DeviceMemory;

/// Fails unless `buffer` can hold the whole layout in elements of width
/// `size_of::<T>()`.
pub fn check_buffer<T: Pod, M: DeviceMemory + ?Sized>(
    buffer: &M,
    layout: &ParamLayout,
) -> Result<(), RnnError> {
    let width = buffer.dtype().size_in_bytes();
    if size_of::<T>() != width {
        return Err(RnnError::ElementWidth {
            expected: width,
            actual: size_of::<T>(),
        });
    }
    let required = layout.total_size() * width;
    if buffer.byte_len() < required {
        return Err(RnnError::BufferTooSmall {
            required,
            available: buffer.byte_len(),
        });
    }
    Ok(())
}

fn resolve<T: Pod, M: DeviceMemory + ?Sized>(
    buffer: &M,
    layout: &ParamLayout,
    slot: &Slot,
) -> Result<SlotRange, RnnError> {
    let range = layout.locate(slot)?;
    check_buffer::<T, M>(buffer, layout)?;
    Ok(range)
}

/// Copies the elements stored in `slot` out of `buffer`.
pub fn read_slot<T: Pod, M: DeviceMemory + ?Sized>(
    buffer: &M,
    layout: &ParamLayout,
    slot: &Slot,
) -> Result<Vec<T>, RnnError> {
    let range = resolve::<T, M>(buffer, layout, slot)?;
    let width = size_of::<T>();
    let bytes = buffer.read_bytes(range.offset * width, range.len * width)?;
    trace!(%slot, offset = range.offset, len = range.len, backend = %buffer.backend(), "read slot");
    Ok(bytemuck::pod_collect_to_vec(&bytes))
}

/// Overwrites `slot` in `buffer` with `elements`.
pub fn write_slot<T: Pod, M: DeviceMemory + ?Sized>(
    buffer: &mut M,
    layout: &ParamLayout,
    slot: &Slot,
    elements: &[T],
) -> Result<(), RnnError> {
    let range = resolve::<T, M>(buffer, layout, slot)?;
    if elements.len() != range.len {
        return Err(RnnError::SizeMismatch {
            expected: range.len,
            actual: elements.len(),
        });
    }
    buffer.write_bytes(range.offset * size_of::<T>(), bytemuck::cast_slice(elements))?;
    trace!(%slot, offset = range.offset, len = range.len, backend = %buffer.backend(), "wrote slot");
    Ok(())
}

impl RnnParams {
    pub fn read_slot<T: Pod, M: DeviceMemory + ?Sized>(
        &self,
        buffer: &M,
        slot: &Slot,
    ) -> Result<Vec<T>, RnnError> {
        read_slot(buffer, self.layout(), slot)
    }

    pub fn write_slot<T: Pod, M: DeviceMemory + ?Sized>(
        &self,
        buffer: &mut M,
        slot: &Slot,
        elements: &[T],
    ) -> Result<(), RnnError> {
        write_slot(buffer, self.layout(), slot, elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rnn::catalog::MatrixKind;
    use crate::rnn::config::{BiasMode, CellType, RnnConfig};
    use crate::runtime::memory::{allocate, HipBuffer};
    use crate::runtime::types::{BackendTarget, DataType};

    fn params() -> RnnParams {
        let config = RnnConfig::new(CellType::Gru, 2, 2, 3)
            .unwrap()
            .with_bias_mode(BiasMode::Present);
        RnnParams::new(config).unwrap()
    }

    #[test]
    fn round_trip_on_both_backends() {
        let params = params();
        let slot = Slot::weight(1, 0, MatrixKind::Input, 2);
        let values: Vec<f32> = (0..4).map(|i| i as f32 + 0.5).collect();
        for target in BackendTarget::ALL {
            let mut buf = allocate(target, DataType::F32, params.total_size()).unwrap();
            params.write_slot(&mut buf, &slot, &values).unwrap();
            let back: Vec<f32> = params.read_slot(&buf, &slot).unwrap();
            assert_eq!(back, values);
        }
    }

    #[test]
    fn short_buffer_is_rejected() {
        let params = params();
        let mut buf = HipBuffer::zeroed(DataType::F32, params.total_size() - 1).unwrap();
        let slot = Slot::bias(0, 0, MatrixKind::Hidden, 0);
        let err = params.write_slot(&mut buf, &slot, &[0f32; 2]).unwrap_err();
        assert_eq!(
            err,
            RnnError::BufferTooSmall {
                required: params.total_bytes(DataType::F32),
                available: (params.total_size() - 1) * 4,
            }
        );
    }

    #[test]
    fn size_mismatch_leaves_buffer_untouched() {
        let params = params();
        let mut buf = HipBuffer::zeroed(DataType::F32, params.total_size()).unwrap();
        let slot = Slot::weight(0, 0, MatrixKind::Hidden, 1);
        let err = params.write_slot(&mut buf, &slot, &[1f32; 3]).unwrap_err();
        assert_eq!(err, RnnError::SizeMismatch { expected: 4, actual: 3 });
        assert!(buf.read_bytes(0, buf.byte_len()).unwrap().iter().all(|b| *b == 0));
    }

    #[test]
    fn element_width_must_match_dtype() {
        let params = params();
        let buf = HipBuffer::zeroed(DataType::F16, params.total_size()).unwrap();
        let slot = Slot::weight(0, 0, MatrixKind::Hidden, 0);
        let err = params.read_slot::<f32, _>(&buf, &slot).unwrap_err();
        assert_eq!(err, RnnError::ElementWidth { expected: 2, actual: 4 });
        let halves: Vec<u16> = params.read_slot(&buf, &slot).unwrap();
        assert_eq!(halves, vec![0u16; 4]);
    }
}
