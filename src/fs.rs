//! The top-level filesystem value composing every component, replacing the original's global
//! singletons (block device, AG locks, journal) with one owned struct.

use crate::ag;
use crate::alloc::Allocator;
use crate::config::NUM_AGS;
use crate::disk::BlockDevice;
use crate::error::Result;
use crate::inode::InodeTable;
use crate::io;
use crate::journal::Journal;
use crate::sb::Superblock;
use std::time::Duration;

/// An in-memory XFS-style filesystem: a block device, its allocator, journal, and inode table.
pub struct Filesystem {
    device: BlockDevice,
    allocator: Allocator,
    journal: Option<Journal>,
    inodes: InodeTable,
    flush_delay: Duration,
}

impl Filesystem {
    /// Builds an unformatted, unmounted filesystem with the default journal flush delay.
    pub fn new() -> Self {
        Self::with_flush_delay(Duration::from_millis(crate::config::DEFAULT_FLUSH_DELAY_MS))
    }

    /// Builds an unformatted, unmounted filesystem with a caller-chosen journal flush delay.
    ///
    /// Tests pass [`Duration::ZERO`] so end-to-end scenarios aren't slowed by the simulated
    /// per-entry journal latency.
    pub fn with_flush_delay(flush_delay: Duration) -> Self {
        Self {
            device: BlockDevice::new(),
            allocator: Allocator::new(),
            journal: None,
            inodes: InodeTable::new(),
            flush_delay,
        }
    }

    /// Formats the device to `size` bytes: zeroes the buffer, writes the superblock and every
    /// AG's AGF/AGI header, then reconciles each AG's allocator state via `init_alloc`.
    pub fn format(&self, size: u64) -> Result<()> {
        self.device.init(size);
        ag::write_headers(&self.device, size / crate::config::BLOCK_SIZE)?;
        for ag_id in 0..NUM_AGS {
            self.allocator.init_alloc(ag_id, &self.device)?;
        }
        Ok(())
    }

    /// Starts the journal worker thread. Calling this twice without an intervening [`Self::unmount`]
    /// replaces the previous journal (and drains it via `Drop`), matching spec.md §4.7's note that
    /// repeated mounts without an intervening shutdown are not supported.
    pub fn mount(&mut self) {
        self.journal = Some(Journal::start_with_delay(self.flush_delay));
    }

    /// Stops the journal worker and drains any residual entries. The inverse of [`Self::mount`].
    pub fn unmount(&mut self) {
        if let Some(mut journal) = self.journal.take() {
            journal.shutdown();
        }
    }

    /// Returns the mounted journal, if any.
    fn journal(&self) -> Result<&Journal> {
        self.journal.as_ref().ok_or(crate::error::Error::NotInitialized)
    }

    /// Reads the superblock back from the device.
    pub fn superblock(&self) -> Result<Superblock> {
        Superblock::read(&self.device)
    }

    /// Reads the AGF of allocation group `ag_id`.
    pub fn agf(&self, ag_id: usize) -> Result<ag::Agf> {
        ag::Agf::read(ag_id, &self.device)
    }

    /// Reads the AGI of allocation group `ag_id`.
    pub fn agi(&self, ag_id: usize) -> Result<ag::Agi> {
        ag::Agi::read(ag_id, &self.device)
    }

    /// Creates a new inode, optionally named, returning its inode number.
    pub fn create(&self, name: Option<&str>) -> u32 {
        self.inodes.create_named(name)
    }

    /// Writes `buf` to inode `inode_num` at `offset`, allocating blocks on demand.
    pub fn write(&self, inode_num: u32, buf: &[u8], offset: u64) -> Result<usize> {
        io::write(&self.inodes, &self.allocator, &self.device, self.journal()?, inode_num, buf, offset)
    }

    /// Reads up to `buf.len()` bytes from inode `inode_num` starting at `offset`.
    pub fn read(&self, inode_num: u32, buf: &mut [u8], offset: u64) -> Result<usize> {
        io::read(&self.inodes, &self.device, inode_num, buf, offset)
    }

    /// Returns a snapshot of inode `inode_num`'s metadata, if it exists.
    pub fn inspect(&self, inode_num: u32) -> Option<crate::inode::Inode> {
        self.inodes.lookup_by_num(inode_num)
    }

    /// Returns every `(inode_num, name)` pair currently in the inode table.
    pub fn list(&self) -> Vec<(u32, String)> {
        self.inodes.list_all()
    }

    /// Looks up an inode number by name.
    pub fn lookup_by_name(&self, name: &str) -> Option<u32> {
        self.inodes.num_by_name(name)
    }

    /// Blocks until every journal entry enqueued so far has been flushed.
    pub fn commit_barrier(&self) -> Result<()> {
        self.journal()?.commit_barrier()
    }

    /// Returns the number of entries currently queued in the journal. Purely advisory.
    pub fn journal_queue_len(&self) -> Result<usize> {
        Ok(self.journal()?.queue_len())
    }
}

impl Default for Filesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Filesystem {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn formatted() -> Filesystem {
        let mut fs = Filesystem::with_flush_delay(Duration::ZERO);
        fs.format(NUM_AGS as u64 * crate::config::AG_SIZE).unwrap();
        fs.mount();
        fs
    }

    #[test]
    fn format_then_mount_then_write_read() {
        let fs = formatted();
        let num = fs.create(Some("hello.txt"));
        fs.write(num, b"hi there", 0).unwrap();

        let mut out = [0u8; 8];
        fs.read(num, &mut out, 0).unwrap();
        assert_eq!(&out, b"hi there");
    }

    #[test]
    fn unmount_then_remount() {
        let mut fs = formatted();
        fs.unmount();
        fs.mount();
        let num = fs.create(Some("f"));
        fs.write(num, b"x", 0).unwrap();
    }

    #[test]
    fn superblock_reports_ag_count() {
        let fs = formatted();
        let sb = fs.superblock().unwrap();
        assert_eq!(sb.ag_count, NUM_AGS as u32);
    }

    #[test]
    fn write_without_mount_errors() {
        let fs = Filesystem::with_flush_delay(Duration::ZERO);
        fs.format(NUM_AGS as u64 * crate::config::AG_SIZE).unwrap();
        let num = fs.create(Some("f"));
        assert!(fs.write(num, b"x", 0).is_err());
    }
}
