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

//! Runtime abstractions for device backends.
//!
//! The parameter layout engine never allocates device memory itself; callers
//! hand it a [`DeviceMemory`] and it reads or writes sub-ranges through it.

pub mod memory;
pub mod types;

pub use memory::{allocate, ClBuffer, DeviceBuffer, DeviceMemory, HipBuffer};
pub use types::{BackendTarget, DataType, RuntimeError};
