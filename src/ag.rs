//! On-disk allocation-group headers: the AGF (free-space) and AGI (inode) records.

use crate::config::AGF_MAGIC;
use crate::config::AGI_MAGIC;
use crate::config::BITMAP_CAPACITY;
use crate::config::BLOCK_SIZE;
use crate::config::NUM_AGS;
use crate::config::RESERVED_SLOTS;
use crate::config::ag_offset;
use crate::disk::BlockDevice;
use crate::error::Result;

/// The byte size of the encoded AGF header (not counting the bitmap tail).
const AGF_HEADER_SIZE: usize = 4 + 4 + 4 + 4;
/// The byte size of the full encoded AGF record, bitmap included.
pub const AGF_ENCODED_SIZE: usize = AGF_HEADER_SIZE + BITMAP_CAPACITY;
/// The byte size of the encoded AGI record.
pub const AGI_ENCODED_SIZE: usize = 4 + 4 + 4 + 4;

/// Allocation Group Free-space header.
///
/// Holds the free-block bitmap (`0` = free, `1` = used) covering the AG's logical block slots
/// `0..BITMAP_CAPACITY`. Slots `0` and `1` are reserved for the AGF and AGI themselves and are
/// always marked used.
#[derive(Clone)]
pub struct Agf {
    /// Magic number, always [`AGF_MAGIC`].
    pub magic: u32,
    /// The AG's length in blocks.
    pub length: u32,
    /// The number of free blocks in the AG.
    pub freeblks: u32,
    /// The approximate length of the longest free run (advisory, see design notes).
    pub longest: u32,
    /// The per-slot usage bitmap.
    pub bitmap: Vec<u8>,
}

impl Agf {
    /// Builds a fresh AGF header with every slot free except the reserved ones.
    pub fn new_initialized(length: u32) -> Self {
        let mut bitmap = vec![0u8; BITMAP_CAPACITY];
        for slot in bitmap.iter_mut().take(RESERVED_SLOTS) {
            *slot = 1;
        }
        let freeblks = (BITMAP_CAPACITY - RESERVED_SLOTS) as u32;
        Self {
            magic: AGF_MAGIC,
            length,
            freeblks,
            longest: freeblks,
            bitmap,
        }
    }

    /// Serializes the AGF into its little-endian on-disk representation.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(AGF_ENCODED_SIZE);
        buf.extend_from_slice(&self.magic.to_le_bytes());
        buf.extend_from_slice(&self.length.to_le_bytes());
        buf.extend_from_slice(&self.freeblks.to_le_bytes());
        buf.extend_from_slice(&self.longest.to_le_bytes());
        buf.extend_from_slice(&self.bitmap);
        buf
    }

    /// Parses an AGF from its little-endian on-disk representation.
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            magic: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            length: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            freeblks: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            longest: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            bitmap: buf[AGF_HEADER_SIZE..AGF_HEADER_SIZE + BITMAP_CAPACITY].to_vec(),
        }
    }

    /// Reads the AGF of allocation group `ag_id` from `dev`.
    pub fn read(ag_id: usize, dev: &BlockDevice) -> Result<Self> {
        let mut buf = vec![0u8; AGF_ENCODED_SIZE];
        dev.read(ag_offset(ag_id), &mut buf)?;
        Ok(Self::decode(&buf))
    }

    /// Writes this AGF back to allocation group `ag_id` on `dev`.
    pub fn write(&self, ag_id: usize, dev: &BlockDevice) -> Result<()> {
        dev.write(ag_offset(ag_id), &self.encode())
    }

    /// Returns the number of zero (free) slots in the bitmap.
    pub fn count_free(&self) -> usize {
        self.bitmap.iter().filter(|&&b| b == 0).count()
    }
}

/// Allocation Group Inode header.
#[derive(Clone, Copy)]
pub struct Agi {
    /// Magic number, always [`AGI_MAGIC`].
    pub magic: u32,
    /// The number of inodes tracked by this AG (informational; inodes are not partitioned by AG
    /// in this core).
    pub count: u32,
    /// The root of the AG's inode B+ tree. Unused by the core.
    pub root: u32,
    /// The number of free inodes in this AG.
    pub freecount: u32,
}

impl Agi {
    /// Builds an empty AGI header.
    pub fn new_empty() -> Self {
        Self {
            magic: AGI_MAGIC,
            count: 0,
            root: 0,
            freecount: 0,
        }
    }

    /// Serializes the AGI into its little-endian on-disk representation.
    pub fn encode(&self) -> [u8; AGI_ENCODED_SIZE] {
        let mut buf = [0u8; AGI_ENCODED_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.count.to_le_bytes());
        buf[8..12].copy_from_slice(&self.root.to_le_bytes());
        buf[12..16].copy_from_slice(&self.freecount.to_le_bytes());
        buf
    }

    /// Parses an AGI from its little-endian on-disk representation.
    pub fn decode(buf: &[u8; AGI_ENCODED_SIZE]) -> Self {
        Self {
            magic: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            count: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            root: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            freecount: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
        }
    }

    /// Returns the byte offset of the AGI record for `ag_id`.
    fn offset(ag_id: usize) -> u64 {
        ag_offset(ag_id) + BLOCK_SIZE
    }

    /// Reads the AGI of allocation group `ag_id` from `dev`.
    pub fn read(ag_id: usize, dev: &BlockDevice) -> Result<Self> {
        let mut buf = [0u8; AGI_ENCODED_SIZE];
        dev.read(Self::offset(ag_id), &mut buf)?;
        Ok(Self::decode(&buf))
    }

    /// Writes this AGI back to allocation group `ag_id` on `dev`.
    pub fn write(&self, ag_id: usize, dev: &BlockDevice) -> Result<()> {
        dev.write(Self::offset(ag_id), &self.encode())
    }
}

/// Writes the superblock and every AG's AGF/AGI header pair at format time.
///
/// `AGF.length` is set to [`BITMAP_CAPACITY`] so the header written here already agrees with what
/// [`crate::alloc::Allocator::init_alloc`] reconciles `freeblks`/`longest` to; there is only one
/// AG geometry in this port (see Open Question 1 in `SPEC_FULL.md`).
pub fn write_headers(dev: &BlockDevice, total_blocks: u64) -> Result<()> {
    let sb = crate::sb::Superblock::new(total_blocks, NUM_AGS as u32, BLOCK_SIZE as u32);
    sb.write(dev)?;

    for ag_id in 0..NUM_AGS {
        let agf = Agf::new_initialized(BITMAP_CAPACITY as u32);
        agf.write(ag_id, dev)?;

        let agi = Agi::new_empty();
        agi.write(ag_id, dev)?;
    }
    Ok(())
}
