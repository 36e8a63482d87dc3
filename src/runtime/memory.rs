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

//! Device memory handles.
//!
//! Call sites work against [`DeviceMemory`]; the concrete representation is
//! chosen once through [`allocate`] and differs by backend. OpenCL memory
//! objects are refcounted, so cloning a [`ClBuffer`] aliases the same
//! storage. HIP allocations are uniquely owned.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::runtime::types::{BackendTarget, DataType, RuntimeError};

/// Byte-addressable device allocation with a declared element type.
pub trait DeviceMemory {
    /// Backend that owns the allocation.
    fn backend(&self) -> BackendTarget;

    /// Element type the caller declared for the buffer.
    fn dtype(&self) -> DataType;

    /// Allocation length in bytes.
    fn byte_len(&self) -> usize;

    /// Copies `len` bytes starting at `offset` out of the allocation.
    fn read_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>, RuntimeError>;

    /// Overwrites `bytes.len()` bytes starting at `offset`.
    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), RuntimeError>;

    /// Declared length in elements of [`DeviceMemory::dtype`].
    fn len_elements(&self) -> usize {
        self.byte_len() / self.dtype().size_in_bytes()
    }
}

fn check_range(
    target: BackendTarget,
    offset: usize,
    len: usize,
    byte_len: usize,
) -> Result<(), RuntimeError> {
    match offset.checked_add(len) {
        Some(end) if end <= byte_len => Ok(()),
        _ => Err(RuntimeError::OutOfBounds {
            target,
            offset,
            len,
            byte_len,
        }),
    }
}

/// Zero-filled storage for `elements` values of `dtype`.
///
/// Fails instead of panicking when the byte length overflows or exceeds the
/// largest allocation the platform allows.
fn zeroed_bytes(
    target: BackendTarget,
    dtype: DataType,
    elements: usize,
) -> Result<Vec<u8>, RuntimeError> {
    match elements.checked_mul(dtype.size_in_bytes()) {
        Some(len) if len <= isize::MAX as usize => Ok(vec![0u8; len]),
        _ => Err(RuntimeError::AllocationTooLarge {
            target,
            dtype,
            elements,
        }),
    }
}

/// OpenCL-style memory object. Clones share storage.
#[derive(Clone, Debug)]
pub struct ClBuffer {
    mem: Arc<RwLock<Vec<u8>>>,
    dtype: DataType,
}

impl ClBuffer {
    pub fn zeroed(dtype: DataType, elements: usize) -> Result<Self, RuntimeError> {
        let bytes = zeroed_bytes(BackendTarget::OpenCl, dtype, elements)?;
        Ok(Self {
            mem: Arc::new(RwLock::new(bytes)),
            dtype,
        })
    }

    /// Number of live handles to the same memory object.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.mem)
    }
}

impl DeviceMemory for ClBuffer {
    fn backend(&self) -> BackendTarget {
        BackendTarget::OpenCl
    }

    fn dtype(&self) -> DataType {
        self.dtype
    }

    fn byte_len(&self) -> usize {
        self.mem.read().len()
    }

    fn read_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>, RuntimeError> {
        let mem = self.mem.read();
        check_range(BackendTarget::OpenCl, offset, len, mem.len())?;
        Ok(mem[offset..offset + len].to_vec())
    }

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), RuntimeError> {
        let mut mem = self.mem.write();
        check_range(BackendTarget::OpenCl, offset, bytes.len(), mem.len())?;
        mem[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

/// HIP-style device allocation, uniquely owned.
#[derive(Debug)]
pub struct HipBuffer {
    ptr: Box<[u8]>,
    dtype: DataType,
}

impl HipBuffer {
    pub fn zeroed(dtype: DataType, elements: usize) -> Result<Self, RuntimeError> {
        let bytes = zeroed_bytes(BackendTarget::Hip, dtype, elements)?;
        Ok(Self {
            ptr: bytes.into_boxed_slice(),
            dtype,
        })
    }
}

impl DeviceMemory for HipBuffer {
    fn backend(&self) -> BackendTarget {
        BackendTarget::Hip
    }

    fn dtype(&self) -> DataType {
        self.dtype
    }

    fn byte_len(&self) -> usize {
        self.ptr.len()
    }

    fn read_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>, RuntimeError> {
        check_range(BackendTarget::Hip, offset, len, self.ptr.len())?;
        Ok(self.ptr[offset..offset + len].to_vec())
    }

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), RuntimeError> {
        check_range(BackendTarget::Hip, offset, bytes.len(), self.ptr.len())?;
        self.ptr[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

/// Backend-selected device buffer.
#[derive(Debug)]
pub enum DeviceBuffer {
    OpenCl(ClBuffer),
    Hip(HipBuffer),
}

/// Allocates a zero-filled buffer of `elements` values on `target`.
pub fn allocate(
    target: BackendTarget,
    dtype: DataType,
    elements: usize,
) -> Result<DeviceBuffer, RuntimeError> {
    Ok(match target {
        BackendTarget::OpenCl => DeviceBuffer::OpenCl(ClBuffer::zeroed(dtype, elements)?),
        BackendTarget::Hip => DeviceBuffer::Hip(HipBuffer::zeroed(dtype, elements)?),
    })
}

impl DeviceMemory for DeviceBuffer {
    fn backend(&self) -> BackendTarget {
        match self {
            DeviceBuffer::OpenCl(buf) => buf.backend(),
            DeviceBuffer::Hip(buf) => buf.backend(),
        }
    }

    fn dtype(&self) -> DataType {
        match self {
            DeviceBuffer::OpenCl(buf) => buf.dtype(),
            DeviceBuffer::Hip(buf) => buf.dtype(),
        }
    }

    fn byte_len(&self) -> usize {
        match self {
            DeviceBuffer::OpenCl(buf) => buf.byte_len(),
            DeviceBuffer::Hip(buf) => buf.byte_len(),
        }
    }

    fn read_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>, RuntimeError> {
        match self {
            DeviceBuffer::OpenCl(buf) => buf.read_bytes(offset, len),
            DeviceBuffer::Hip(buf) => buf.read_bytes(offset, len),
        }
    }

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), RuntimeError> {
        match self {
            DeviceBuffer::OpenCl(buf) => buf.write_bytes(offset, bytes),
            DeviceBuffer::Hip(buf) => buf.write_bytes(offset, bytes),
        }
    }
}
