//! The error type shared by every fallible core operation.

use thiserror::Error;

/// An error returned by the block device, allocator, journal, or file I/O path.
#[derive(Debug, Error)]
pub enum Error {
    /// A read or write would cross the end of the device.
    #[error("offset {offset} + len {len} is out of bounds for a device of size {size}")]
    OutOfBounds {
        /// The offset requested.
        offset: u64,
        /// The length requested.
        len: u64,
        /// The size of the device.
        size: u64,
    },

    /// The block device has not been initialized yet.
    #[error("block device is not initialized")]
    NotInitialized,

    /// An allocation group id was out of the valid `0..NUM_AGS` range.
    #[error("invalid allocation group id: {0}")]
    InvalidAg(usize),

    /// No contiguous run of free blocks large enough for the request was found.
    #[error("allocation of {count} block(s) in AG {ag_id} failed")]
    AllocFailed {
        /// The allocation group that was scanned.
        ag_id: usize,
        /// The number of blocks requested.
        count: usize,
    },

    /// An inode already holds the maximum number of extents.
    #[error("inode {0} already holds the maximum number of extents")]
    ExtentLimit(u32),

    /// The journal failed to enqueue an entry.
    #[error("failed to enqueue a journal entry")]
    AllocError,

    /// The requested inode does not exist.
    #[error("inode {0} does not exist")]
    NoSuchInode(u32),

    /// The requested name does not map to any inode.
    #[error("no file named `{0}`")]
    NoSuchName(String),
}

/// The crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
