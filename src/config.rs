//! Compile-time constants shared by every component.

/// The fixed block size in bytes.
pub const BLOCK_SIZE: u64 = 4096;

/// The number of allocation groups.
pub const NUM_AGS: usize = 10;

/// The size in bytes of a single allocation group (10 MiB).
pub const AG_SIZE: u64 = 10 * 1024 * 1024;

/// The number of entries in an AG's free-block bitmap.
pub const BITMAP_CAPACITY: usize = 2400;

/// The number of reserved slots at the start of an AG (AGF, AGI).
pub const RESERVED_SLOTS: usize = 2;

/// The maximum number of extents a single inode may hold.
pub const MAX_EXTENTS: usize = 16;

/// The maximum number of inodes the table can hold.
pub const MAX_INODES: usize = 100;

/// The maximum length, in bytes, of a file name (excluding the null terminator).
pub const MAX_NAME_LEN: usize = 63;

/// The default simulated flush latency applied by the journal worker for each entry.
pub const DEFAULT_FLUSH_DELAY_MS: u64 = 100;

/// The superblock's magic number (`"XFSB"`).
pub const SB_MAGIC: u32 = 0x5846_5342;
/// The AGF's magic number (`"XAGF"`).
pub const AGF_MAGIC: u32 = 0x5841_4746;
/// The AGI's magic number (`"XAGI"`).
pub const AGI_MAGIC: u32 = 0x5841_4749;

/// The on-disk layout version written by `format`.
pub const SB_VERSION: u32 = 5;

/// Returns the byte offset of allocation group `ag_id` from the start of the device.
pub fn ag_offset(ag_id: usize) -> u64 {
    ag_id as u64 * AG_SIZE
}
