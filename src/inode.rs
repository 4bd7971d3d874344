//! The flat in-memory inode table and its parallel name index.

use std::sync::Mutex;

use crate::config::MAX_EXTENTS;
use crate::config::MAX_INODES;
use crate::config::MAX_NAME_LEN;
use crate::error::Error;
use crate::error::Result;

/// A contiguous run of physical blocks mapped to a contiguous range of logical file blocks.
///
/// `ag_id` identifies which allocation group `phys_start` is a slot index within (see Open
/// Question 3 in `SPEC_FULL.md`: slot indices are always interpreted relative to their AG, never
/// as bare global block numbers).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent {
    /// The first logical block this extent covers.
    pub logical_start: u64,
    /// The allocation group the physical blocks live in.
    pub ag_id: usize,
    /// The first physical slot, local to `ag_id`, this extent covers.
    pub phys_start: u32,
    /// The number of contiguous blocks covered.
    pub block_count: u64,
}

impl Extent {
    /// Returns `true` if this extent covers logical block `block`.
    pub fn covers(&self, block: u64) -> bool {
        block >= self.logical_start && block < self.logical_start + self.block_count
    }
}

/// Per-file metadata: size, extent list, and informational POSIX-ish fields.
#[derive(Clone, Debug)]
pub struct Inode {
    /// The inode number (`>= 1`; `0` is the sentinel "nonexistent").
    pub num: u32,
    /// File mode (informational).
    pub mode: u16,
    /// Owning user id (informational).
    pub uid: u32,
    /// Owning group id (informational).
    pub gid: u32,
    /// Hard link count (informational).
    pub nlink: u32,
    /// The file size in bytes.
    pub size: u64,
    /// The inode's extent list, in insertion order. At most [`MAX_EXTENTS`] entries.
    pub extents: Vec<Extent>,
}

impl Inode {
    fn new(num: u32) -> Self {
        Self {
            num,
            mode: 0o666,
            uid: 1000,
            gid: 1000,
            nlink: 1,
            size: 0,
            extents: Vec::new(),
        }
    }

    /// Returns the extent covering logical block `block`, if any.
    pub fn find_extent(&self, block: u64) -> Option<&Extent> {
        self.extents.iter().find(|e| e.covers(block))
    }

    /// Appends a new extent. Fails with [`Error::ExtentLimit`] if the inode is already full.
    pub fn add_extent(&mut self, extent: Extent) -> Result<()> {
        if self.extents.len() >= MAX_EXTENTS {
            return Err(Error::ExtentLimit(self.num));
        }
        self.extents.push(extent);
        Ok(())
    }
}

struct Table {
    inodes: Vec<Option<Inode>>,
    names: Vec<Option<String>>,
    max_inode_num: u32,
}

impl Table {
    fn new() -> Self {
        Self {
            inodes: vec![None; MAX_INODES],
            names: vec![None; MAX_INODES],
            max_inode_num: 0,
        }
    }
}

/// The flat, fixed-capacity table of every inode in the filesystem, plus its name index.
///
/// Initialization is lazy and idempotent: the table starts empty and inode `0` is always the
/// "absent" sentinel. A single table-wide mutex guards both the inode array and the name index
/// (see `SPEC_FULL.md` §4.5 for why this port picks a table-wide lock over per-inode locks).
pub struct InodeTable {
    inner: Mutex<Table>,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    /// Creates an empty inode table.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Table::new()),
        }
    }

    /// Creates a new inode, optionally named `name`. If `name` is `None`, or would not fit in
    /// [`MAX_NAME_LEN`] bytes, the inode is given the auto-generated name `unnamed_<n>`.
    pub fn create_named(&self, name: Option<&str>) -> u32 {
        let mut table = self.inner.lock().unwrap();
        let num = table.max_inode_num + 1;
        table.max_inode_num = num;

        let name = match name {
            Some(name) if name.len() <= MAX_NAME_LEN => name.to_owned(),
            _ => format!("unnamed_{num}"),
        };

        let idx = num as usize;
        table.inodes[idx] = Some(Inode::new(num));
        table.names[idx] = Some(name);
        num
    }

    /// Looks up an inode by number. Returns `None` for `0` or any number never created.
    pub fn lookup_by_num(&self, num: u32) -> Option<Inode> {
        if num == 0 {
            return None;
        }
        let table = self.inner.lock().unwrap();
        table.inodes.get(num as usize)?.clone()
    }

    /// Returns the first inode whose name matches `name`, in ascending inode-number order.
    ///
    /// Names are not enforced unique (see Open Question 6 in `SPEC_FULL.md`); the first match
    /// wins, mirroring the original source's linear scan.
    pub fn lookup_by_name(&self, name: &str) -> Option<Inode> {
        let num = self.num_by_name(name)?;
        self.lookup_by_num(num)
    }

    /// Returns the inode number of the first inode named `name`, if any.
    pub fn num_by_name(&self, name: &str) -> Option<u32> {
        let table = self.inner.lock().unwrap();
        for (idx, n) in table.names.iter().enumerate() {
            if table.inodes[idx].is_some() && n.as_deref() == Some(name) {
                return Some(idx as u32);
            }
        }
        None
    }

    /// Returns every `(inode_num, name)` pair currently in the table, in ascending order.
    pub fn list_all(&self) -> Vec<(u32, String)> {
        let table = self.inner.lock().unwrap();
        table
            .inodes
            .iter()
            .enumerate()
            .filter_map(|(idx, inode)| {
                inode
                    .as_ref()
                    .map(|i| (i.num, table.names[idx].clone().unwrap_or_default()))
            })
            .collect()
    }

    /// Runs `f` against a mutable reference to inode `num`, under the table lock.
    ///
    /// This is the only way to mutate an inode's extents or size: it keeps the
    /// read-modify-write under the same exclusive section the spec requires for extent-list
    /// mutation (spec.md §5).
    pub fn with_mut<T>(&self, num: u32, f: impl FnOnce(&mut Inode) -> Result<T>) -> Result<T> {
        let mut table = self.inner.lock().unwrap();
        let slot = table
            .inodes
            .get_mut(num as usize)
            .and_then(|i| i.as_mut())
            .ok_or(Error::NoSuchInode(num))?;
        f(slot)
    }
}
