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

//! Shared runtime surface types for device backends.
//!
//! Both backends are emulated in host memory; the layout engine only needs
//! byte-addressable storage with a declared length and element width.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Hardware backend that owns a device allocation.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendTarget {
    /// Refcounted OpenCL-style memory objects.
    #[default]
    #[value(name = "opencl", alias = "ocl", alias = "cl")]
    OpenCl,
    /// Owned HIP-style device allocations.
    #[value(alias = "rocm")]
    Hip,
}

impl BackendTarget {
    pub const ALL: [BackendTarget; 2] = [BackendTarget::OpenCl, BackendTarget::Hip];
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendTarget::OpenCl => write!(f, "opencl"),
            BackendTarget::Hip => write!(f, "hip"),
        }
    }
}

/// Element type stored in a device buffer.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    #[value(name = "f32")]
    F32,
    #[value(name = "f16")]
    F16,
    #[value(name = "bf16")]
    BF16,
    #[value(name = "f64")]
    F64,
}

impl DataType {
    /// Widest element type; sizes that fit for it fit for every type.
    pub const WIDEST: DataType = DataType::F64;

    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::F16 | DataType::BF16 => 2,
            DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::F32 => write!(f, "f32"),
            DataType::F16 => write!(f, "f16"),
            DataType::BF16 => write!(f, "bf16"),
            DataType::F64 => write!(f, "f64"),
        }
    }
}

/// Structured runtime error for backend implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// A byte range fell outside the allocation.
    #[error("access of {len} bytes at offset {offset} exceeds {target} buffer of {byte_len} bytes")]
    OutOfBounds {
        target: BackendTarget,
        offset: usize,
        len: usize,
        byte_len: usize,
    },
    /// The requested allocation does not fit in the address space.
    #[error("{elements} {dtype} elements do not fit in a {target} allocation")]
    AllocationTooLarge {
        target: BackendTarget,
        dtype: DataType,
        elements: usize,
    },
}
