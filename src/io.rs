//! Extent-mapped file I/O: logical-to-physical block translation, barrier-before-write.

use crate::alloc::Allocator;
use crate::config::BLOCK_SIZE;
use crate::config::NUM_AGS;
use crate::config::ag_offset;
use crate::disk::BlockDevice;
use crate::error::Error;
use crate::error::Result;
use crate::inode::Extent;
use crate::inode::InodeTable;
use crate::journal::Journal;

/// Returns the byte offset on `dev` of physical slot `phys_start` within allocation group `ag_id`.
fn disk_offset(ag_id: usize, phys_start: u32) -> u64 {
    ag_offset(ag_id) + phys_start as u64 * BLOCK_SIZE
}

/// Writes `buf` to inode `inode_num` at logical byte `offset`, allocating blocks on demand.
///
/// Follows spec.md §4.6's write path: map every logical block covered by the request, allocate
/// any unmapped one via round-robin AG selection (`ag_id = block mod NUM_AGS`), commit a journal
/// barrier so the allocator's bitmap changes are durable before any data hits the simulated disk,
/// then perform the data writes and update the inode's size.
pub fn write(table: &InodeTable, allocator: &Allocator, dev: &BlockDevice, journal: &Journal, inode_num: u32, buf: &[u8], offset: u64) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }

    let first_block = offset / BLOCK_SIZE;
    let last_block = (offset + buf.len() as u64 - 1) / BLOCK_SIZE;

    table.with_mut(inode_num, |inode| {
        for block in first_block..=last_block {
            if inode.find_extent(block).is_some() {
                continue;
            }
            let ag_id = (block as usize) % NUM_AGS;
            let slot = allocator
                .alloc_blocks(ag_id, 1, dev, journal)?
                .ok_or(Error::AllocFailed { ag_id, count: 1 })?;

            let extent = Extent {
                logical_start: block,
                ag_id,
                phys_start: slot,
                block_count: 1,
            };
            if let Err(e) = inode.add_extent(extent) {
                allocator.free_blocks(ag_id, slot, 1, dev, journal)?;
                return Err(e);
            }
        }
        Ok(())
    })?;

    journal.commit_barrier()?;

    let mut written = 0usize;
    let mut cursor = offset;
    while written < buf.len() {
        let block = cursor / BLOCK_SIZE;
        let in_block_offset = cursor % BLOCK_SIZE;
        let chunk = ((BLOCK_SIZE - in_block_offset) as usize).min(buf.len() - written);

        let extent = table
            .with_mut(inode_num, |inode| Ok(*inode.find_extent(block).expect("block was mapped above")))?;
        let phys = extent.phys_start + (block - extent.logical_start) as u32;
        let addr = disk_offset(extent.ag_id, phys) + in_block_offset;

        dev.write(addr, &buf[written..written + chunk])?;

        written += chunk;
        cursor += chunk as u64;
    }

    table.with_mut(inode_num, |inode| {
        let end = offset + buf.len() as u64;
        if end > inode.size {
            inode.size = end;
        }
        Ok(())
    })?;

    Ok(written)
}

/// Reads up to `buf.len()` bytes from inode `inode_num` starting at logical byte `offset`.
///
/// Clamps the read to the inode's current size and zero-fills any logical span not covered by an
/// extent ("holes"), per spec.md §4.6's read path.
pub fn read(table: &InodeTable, dev: &BlockDevice, inode_num: u32, buf: &mut [u8], offset: u64) -> Result<usize> {
    let size = table.lookup_by_num(inode_num).ok_or(Error::NoSuchInode(inode_num))?.size;

    if offset >= size {
        return Ok(0);
    }
    let avail = (size - offset).min(buf.len() as u64) as usize;

    let mut read_so_far = 0usize;
    let mut cursor = offset;
    while read_so_far < avail {
        let block = cursor / BLOCK_SIZE;
        let in_block_offset = cursor % BLOCK_SIZE;
        let chunk = ((BLOCK_SIZE - in_block_offset) as usize).min(avail - read_so_far);

        let extent = table.lookup_by_num(inode_num).and_then(|inode| inode.find_extent(block).copied());

        match extent {
            None => {
                buf[read_so_far..read_so_far + chunk].fill(0);
            }
            Some(extent) => {
                let phys = extent.phys_start + (block - extent.logical_start) as u32;
                let addr = disk_offset(extent.ag_id, phys) + in_block_offset;
                dev.read(addr, &mut buf[read_so_far..read_so_far + chunk])?;
            }
        }

        read_so_far += chunk;
        cursor += chunk as u64;
    }

    Ok(read_so_far)
}
