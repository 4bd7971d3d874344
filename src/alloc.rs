//! The per-allocation-group free-block allocator.

use std::sync::Mutex;

use crate::ag::Agf;
use crate::config::BITMAP_CAPACITY;
use crate::config::NUM_AGS;
use crate::config::RESERVED_SLOTS;
use crate::disk::BlockDevice;
use crate::error::Error;
use crate::error::Result;
use crate::journal::Journal;

/// Per-AG exclusive allocator.
///
/// Every allocator operation acquires the AG's mutex for its entire critical section: read the
/// AGF, mutate it, write it back, enqueue a journal entry, then release. Different AGs never
/// contend with one another.
pub struct Allocator {
    /// One mutex per allocation group, guarding that AG's AGF read-modify-write.
    locks: Vec<Mutex<()>>,
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator {
    /// Creates an allocator with one unlocked mutex per AG.
    pub fn new() -> Self {
        Self {
            locks: (0..NUM_AGS).map(|_| Mutex::new(())).collect(),
        }
    }

    fn check_ag(&self, ag_id: usize) -> Result<()> {
        if ag_id >= NUM_AGS {
            return Err(Error::InvalidAg(ag_id));
        }
        Ok(())
    }

    /// Resets AG `ag_id`'s bitmap to "every slot free except the reserved ones", matching
    /// spec.md §4.2's `init_alloc`: slots `0..RESERVED_SLOTS` used, the rest free, with
    /// `agf_freeblks`/`agf_longest` reconciled to `BITMAP_CAPACITY - RESERVED_SLOTS`.
    pub fn init_alloc(&self, ag_id: usize, dev: &BlockDevice) -> Result<()> {
        self.check_ag(ag_id)?;
        let _guard = self.locks[ag_id].lock().unwrap();

        let mut agf = Agf::read(ag_id, dev)?;
        for (slot, b) in agf.bitmap.iter_mut().enumerate() {
            *b = if slot < RESERVED_SLOTS { 1 } else { 0 };
        }
        agf.freeblks = (BITMAP_CAPACITY - RESERVED_SLOTS) as u32;
        agf.longest = agf.freeblks;
        agf.write(ag_id, dev)?;
        Ok(())
    }

    /// Finds and marks used the first contiguous run of `count` free slots in AG `ag_id`,
    /// starting the scan at slot [`RESERVED_SLOTS`].
    ///
    /// Returns the starting slot index, local to `ag_id`. Returns `Ok(None)` — not an error — when
    /// no run fits, matching the "return 0" sentinel of spec.md §4.3 (slot `0` is reserved, so it
    /// is never itself a valid allocation; `None` is the idiomatic equivalent).
    pub fn alloc_blocks(&self, ag_id: usize, count: usize, dev: &BlockDevice, journal: &Journal) -> Result<Option<u32>> {
        self.check_ag(ag_id)?;
        if count == 0 {
            return Ok(None);
        }
        let _guard = self.locks[ag_id].lock().unwrap();

        let mut agf = Agf::read(ag_id, dev)?;
        let Some(start) = find_free_run(&agf.bitmap, count) else {
            return Ok(None);
        };

        for slot in start..start + count {
            agf.bitmap[slot] = 1;
        }
        agf.freeblks = agf.freeblks.saturating_sub(count as u32);
        agf.longest = agf.freeblks;
        agf.write(ag_id, dev)?;
        journal.add_item(&agf.encode())?;

        Ok(Some(start as u32))
    }

    /// Marks `count` slots starting at `start` free again in AG `ag_id`.
    ///
    /// The range is clamped to [`BITMAP_CAPACITY`], matching spec.md §4.3's free algorithm.
    pub fn free_blocks(&self, ag_id: usize, start: u32, count: usize, dev: &BlockDevice, journal: &Journal) -> Result<()> {
        self.check_ag(ag_id)?;
        let _guard = self.locks[ag_id].lock().unwrap();

        let mut agf = Agf::read(ag_id, dev)?;
        let start = start as usize;
        let end = (start + count).min(BITMAP_CAPACITY);
        for slot in start..end {
            agf.bitmap[slot] = 0;
        }
        agf.freeblks += count as u32;
        agf.longest = agf.longest.max(count as u32);
        agf.write(ag_id, dev)?;
        journal.add_item(&agf.encode())?;

        Ok(())
    }
}

/// First-fit scan for `count` contiguous free (`0`) slots, starting at [`RESERVED_SLOTS`].
fn find_free_run(bitmap: &[u8], count: usize) -> Option<usize> {
    if count > bitmap.len() {
        return None;
    }
    let mut i = RESERVED_SLOTS;
    while i + count <= bitmap.len() {
        match bitmap[i..i + count].iter().position(|&b| b != 0) {
            None => return Some(i),
            Some(j) => i += j + 1,
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ag;
    use std::time::Duration;

    fn setup() -> (BlockDevice, Allocator, Journal) {
        let dev = BlockDevice::new();
        dev.init(NUM_AGS as u64 * crate::config::AG_SIZE);
        ag::write_headers(&dev, 25600).unwrap();
        let alloc = Allocator::new();
        for ag_id in 0..NUM_AGS {
            alloc.init_alloc(ag_id, &dev).unwrap();
        }
        let journal = Journal::start_with_delay(Duration::ZERO);
        (dev, alloc, journal)
    }

    #[test]
    fn init_alloc_reconciles_freeblks() {
        let (dev, _alloc, _journal) = setup();
        let agf = Agf::read(0, &dev).unwrap();
        assert_eq!(agf.freeblks, 2398);
        assert_eq!(agf.bitmap[0], 1);
        assert_eq!(agf.bitmap[1], 1);
        assert_eq!(agf.count_free(), 2398);
    }

    #[test]
    fn sequential_allocations_decrement_freeblks() {
        let (dev, alloc, journal) = setup();
        for _ in 0..10 {
            alloc.alloc_blocks(0, 1, &dev, &journal).unwrap().unwrap();
        }
        let agf = Agf::read(0, &dev).unwrap();
        assert_eq!(agf.freeblks, 2398 - 10);
    }

    #[test]
    fn alloc_free_roundtrip_restores_state() {
        let (dev, alloc, journal) = setup();
        let before = Agf::read(0, &dev).unwrap();

        let start = alloc.alloc_blocks(0, 5, &dev, &journal).unwrap().unwrap();
        alloc.free_blocks(0, start, 5, &dev, &journal).unwrap();

        let after = Agf::read(0, &dev).unwrap();
        assert_eq!(after.freeblks, before.freeblks);
        assert_eq!(after.bitmap, before.bitmap);
    }

    #[test]
    fn exhaustion_returns_none() {
        let (dev, alloc, journal) = setup();
        let big = alloc.alloc_blocks(0, 2399, &dev, &journal).unwrap();
        assert!(big.is_none());
    }

    #[test]
    fn invalid_ag() {
        let (dev, alloc, journal) = setup();
        assert!(matches!(alloc.alloc_blocks(NUM_AGS, 1, &dev, &journal), Err(Error::InvalidAg(_))));
    }

    #[test]
    fn skips_blocker_in_window() {
        let bitmap_len = BITMAP_CAPACITY;
        let mut bitmap = vec![0u8; bitmap_len];
        bitmap[0] = 1;
        bitmap[1] = 1;
        bitmap[3] = 1; // a lone used slot inside the first candidate window
        let start = find_free_run(&bitmap, 3).unwrap();
        assert_eq!(start, 4);
    }
}
