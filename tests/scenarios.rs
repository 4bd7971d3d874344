//! End-to-end scenarios exercising format/mount/create/write/read through the public
//! `Filesystem` API, plus the concurrency and barrier-ordering properties.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use xfssim::config::AG_SIZE;
use xfssim::config::BLOCK_SIZE;
use xfssim::config::NUM_AGS;
use xfssim::error::Error;
use xfssim::fs::Filesystem;

fn formatted() -> Filesystem {
    let mut fs = Filesystem::with_flush_delay(Duration::ZERO);
    fs.format(100 * 1024 * 1024).unwrap();
    fs.mount();
    fs
}

/// S1 — Format -> Mount -> Create -> Write -> Read.
#[test]
fn s1_format_mount_create_write_read() {
    let fs = formatted();

    let agf_before = fs.agf(0).unwrap();

    let i = fs.create(Some("a.txt"));
    let n = fs.write(i, b"hello", 0).unwrap();
    assert_eq!(n, 5);

    let mut buf = [0u8; 5];
    fs.read(i, &mut buf, 0).unwrap();
    assert_eq!(&buf, b"hello");

    let inode = fs.inspect(i).unwrap();
    assert_eq!(inode.size, 5);
    assert_eq!(inode.extents.len(), 1);
    assert_eq!(inode.extents[0].block_count, 1);
    assert_eq!(inode.extents[0].logical_start, 0);

    assert_eq!(inode.extents[0].ag_id, 0); // block 0 mod NUM_AGS == 0
    let agf_after = fs.agf(0).unwrap();
    assert_eq!(agf_after.freeblks, agf_before.freeblks - 1);
}

/// S2 — Multi-block write spanning three allocation groups.
#[test]
fn s2_multi_block_write() {
    let fs = formatted();
    let i = fs.create(Some("big.bin"));

    let payload = vec![b'A'; 8193];
    let n = fs.write(i, &payload, 0).unwrap();
    assert_eq!(n, 8193);

    let inode = fs.inspect(i).unwrap();
    assert_eq!(inode.size, 8193);
    assert_eq!(inode.extents.len(), 3);
    for (idx, extent) in inode.extents.iter().enumerate() {
        assert_eq!(extent.logical_start, idx as u64);
        assert_eq!(extent.block_count, 1);
        assert_eq!(extent.ag_id, idx % NUM_AGS);
    }
}

/// S3 — The write path's barrier drains everything queued before it.
#[test]
fn s3_barrier_in_write_path() {
    let fs = formatted();
    fs.commit_barrier().unwrap(); // drain whatever format/mount produced

    let i = fs.create(Some("f"));
    fs.write(i, b"x", 0).unwrap();
    fs.write(i, b"y", BLOCK_SIZE).unwrap();

    // By the time write() returns, its own barrier has drained the queue.
    assert_eq!(fs.journal_queue_len().unwrap(), 0);
}

/// S4 — Writing a 17th distinct block fails with ExtentLimit; the first 16 remain intact.
#[test]
fn s4_extent_limit() {
    let fs = formatted();
    let i = fs.create(Some("full"));

    for block in 0..16u64 {
        fs.write(i, b"x", block * BLOCK_SIZE).unwrap();
    }

    let err = fs.write(i, b"x", 16 * BLOCK_SIZE);
    assert!(matches!(err, Err(Error::ExtentLimit(_))));

    let inode = fs.inspect(i).unwrap();
    assert_eq!(inode.extents.len(), 16);
    for block in 0..16u64 {
        let mut buf = [0u8];
        fs.read(i, &mut buf, block * BLOCK_SIZE).unwrap();
        assert_eq!(buf, [b'x']);
    }
}

/// S5 — Reading across a hole returns zero-filled bytes before the written tail.
#[test]
fn s5_hole_read() {
    let fs = formatted();
    let i = fs.create(Some("sparse"));

    fs.write(i, b"end", 5 * BLOCK_SIZE).unwrap();

    let mut buf = vec![0xffu8; (5 * BLOCK_SIZE + 3) as usize];
    let n = fs.read(i, &mut buf, 0).unwrap();
    assert_eq!(n, buf.len());
    assert!(buf[..5 * BLOCK_SIZE as usize].iter().all(|&b| b == 0));
    assert_eq!(&buf[5 * BLOCK_SIZE as usize..], b"end");

    let inode = fs.inspect(i).unwrap();
    assert_eq!(inode.size, 5 * BLOCK_SIZE + 3);
}

/// S6 — Ten threads each allocating 100 blocks in their own AG never contend, and the bitmaps
/// compose as if the calls ran serially per AG.
#[test]
fn s6_concurrency_across_distinct_ags() {
    use xfssim::ag;
    use xfssim::alloc::Allocator;
    use xfssim::disk::BlockDevice;
    use xfssim::journal::Journal;

    let dev = Arc::new(BlockDevice::new());
    dev.init(NUM_AGS as u64 * AG_SIZE);
    ag::write_headers(&dev, (NUM_AGS as u64 * AG_SIZE) / BLOCK_SIZE).unwrap();
    let allocator = Arc::new(Allocator::new());
    for ag_id in 0..NUM_AGS {
        allocator.init_alloc(ag_id, &dev).unwrap();
    }
    let journal = Arc::new(Journal::start_with_delay(Duration::ZERO));

    let handles: Vec<_> = (0..NUM_AGS)
        .map(|ag_id| {
            let dev = Arc::clone(&dev);
            let allocator = Arc::clone(&allocator);
            let journal = Arc::clone(&journal);
            thread::spawn(move || {
                for _ in 0..100 {
                    allocator.alloc_blocks(ag_id, 1, &dev, &journal).unwrap().unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let total_free: u32 = (0..NUM_AGS).map(|ag_id| ag::Agf::read(ag_id, &dev).unwrap().freeblks).sum();
    assert_eq!(total_free, (NUM_AGS as u32) * 2398 - 1000);

    for ag_id in 0..NUM_AGS {
        let agf = ag::Agf::read(ag_id, &dev).unwrap();
        assert_eq!(agf.freeblks, 2398 - 100);
    }
}

/// Property 3 — free-then-allocate idempotence, driven through the allocator module directly.
#[test]
fn property_free_then_alloc_idempotence() {
    use xfssim::ag;
    use xfssim::alloc::Allocator;
    use xfssim::disk::BlockDevice;
    use xfssim::journal::Journal;

    let dev = BlockDevice::new();
    dev.init(NUM_AGS as u64 * AG_SIZE);
    ag::write_headers(&dev, 25600).unwrap();
    let allocator = Allocator::new();
    allocator.init_alloc(0, &dev).unwrap();
    let journal = Journal::start_with_delay(Duration::ZERO);

    let before = ag::Agf::read(0, &dev).unwrap();
    let start = allocator.alloc_blocks(0, 7, &dev, &journal).unwrap().unwrap();
    allocator.free_blocks(0, start, 7, &dev, &journal).unwrap();
    let after = ag::Agf::read(0, &dev).unwrap();

    assert_eq!(before.freeblks, after.freeblks);
    assert_eq!(before.bitmap, after.bitmap);
}
