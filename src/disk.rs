//! The simulated block device: a contiguous in-memory byte buffer standing in for a real disk.

use std::sync::Mutex;

use crate::error::Error;
use crate::error::Result;

/// A fixed-size contiguous byte store with bounded read/write.
///
/// The buffer is guarded by a single internal mutex so a [`BlockDevice`] can be shared (via
/// `&BlockDevice`) across the allocator's per-AG critical sections without `unsafe`. The mutex
/// does not provide any ordering guarantee beyond "one memcpy at a time" — the real invariant
/// that concurrent callers touch disjoint byte ranges still comes from holding the corresponding
/// AG lock, exactly as spec.md §4.1 describes.
#[derive(Default)]
pub struct BlockDevice {
    buf: Mutex<Option<Vec<u8>>>,
}

impl BlockDevice {
    /// Creates an uninitialized block device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a zero-filled buffer of exactly `size` bytes, replacing any existing buffer.
    pub fn init(&self, size: u64) {
        *self.buf.lock().unwrap() = Some(vec![0u8; size as usize]);
    }

    /// Returns the size of the device in bytes, or `0` if uninitialized.
    pub fn size(&self) -> u64 {
        self.buf.lock().unwrap().as_ref().map(|b| b.len() as u64).unwrap_or(0)
    }

    /// Releases the backing buffer.
    pub fn destroy(&self) {
        *self.buf.lock().unwrap() = None;
    }

    /// Copies `buf.len()` bytes from the device starting at `offset` into `buf`.
    pub fn read(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        let guard = self.buf.lock().unwrap();
        let data = guard.as_ref().ok_or(Error::NotInitialized)?;
        let len = out.len() as u64;
        let size = data.len() as u64;
        if offset.checked_add(len).map(|end| end > size).unwrap_or(true) {
            return Err(Error::OutOfBounds { offset, len, size });
        }
        let start = offset as usize;
        out.copy_from_slice(&data[start..start + out.len()]);
        Ok(())
    }

    /// Copies `data.len()` bytes from `data` into the device at `offset`.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut guard = self.buf.lock().unwrap();
        let buf = guard.as_mut().ok_or(Error::NotInitialized)?;
        let len = data.len() as u64;
        let size = buf.len() as u64;
        if offset.checked_add(len).map(|end| end > size).unwrap_or(true) {
            return Err(Error::OutOfBounds { offset, len, size });
        }
        let start = offset as usize;
        buf[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }
}
