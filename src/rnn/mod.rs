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

//! Parameter and bias addressing for recurrent-network weight buffers.
//!
//! The flat buffer holding every weight matrix and bias vector of a
//! multi-layer, optionally bidirectional, optionally input-skipping network
//! is described by a [`ParamLayout`]. Building one enumerates the canonical
//! [`Slot`] order ([`topology`]), sizes each slot ([`layout`]), and assigns
//! cumulative offsets. [`access`] copies single slots in and out of a
//! caller-owned [`DeviceMemory`](crate::runtime::DeviceMemory).
//!
//! ```
//! use mind_rnn::rnn::{CellType, InputMode, RnnConfig, RnnParams};
//!
//! let config = RnnConfig::new(CellType::Relu, 4, 2, 3).unwrap();
//! assert_eq!(RnnParams::new(config.clone()).unwrap().total_size(), 60);
//!
//! let skip = config.with_input_mode(InputMode::Skip);
//! assert_eq!(RnnParams::new(skip).unwrap().total_size(), 48);
//! ```

pub mod access;
pub mod catalog;
pub mod config;
pub mod error;
pub mod layout;
pub mod packed;
pub mod topology;

pub use access::{check_buffer, read_slot, write_slot};
pub use catalog::{gate_group_count, MatrixKind};
pub use config::{
    BiasMode, BiasPlacement, CellType, ConfigError, Direction, InputMode, RnnConfig,
};
pub use error::{MissingSlot, RnnError};
pub use layout::{
    compute_total_size, locate, param_size_bytes, slot_shape, ParamLayout, RnnParams, SlotRange,
};
pub use packed::{packed_ids_per_layer, pseudo_layer_count};
pub use topology::{check_slot, ordered_slots, slot_count, Slot, SlotRole};
