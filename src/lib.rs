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

//! MIND recurrent parameter layout.
//!
//! Computes the size of the flat device buffer holding every weight matrix
//! and bias vector of a recurrent network (RNN/LSTM/GRU), and the exact
//! sub-range each matrix or vector occupies in it. Device memory handles and
//! the kernel build directory live alongside as boundary collaborators.

#[cfg(feature = "kernel-build")]
pub mod build;
pub mod rnn;
pub mod runtime;
pub mod sweep;

pub use rnn::{
    compute_total_size, locate, read_slot, write_slot, BiasMode, BiasPlacement, CellType,
    Direction, InputMode, MatrixKind, ParamLayout, RnnConfig, RnnError, RnnParams, Slot,
    SlotRange, SlotRole,
};
pub use runtime::{allocate, BackendTarget, DataType, DeviceBuffer, DeviceMemory};
