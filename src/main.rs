//! An interactive shell exercising the simulated filesystem, in the style of a single-tool
//! `mkfs`/`fdisk`-style binary built on top of the `xfssim` library.

use std::io;
use std::io::BufRead;
use std::io::Write;
use std::process::exit;
use std::time::Duration;

use xfssim::fs::Filesystem;

const PROMPT: &str = "XFS_SIM> ";

fn main() {
    println!("xfssim interactive shell. Type 'format <bytes>' to begin, or 'exit' to quit.");

    let mut fs: Option<Filesystem> = None;
    let stdin = io::stdin();

    loop {
        print!("{PROMPT}");
        let _ = io::stdout().flush();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap_or("");
        let args: Vec<&str> = parts.collect();

        match dispatch(cmd, &args, &mut fs) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => exit(0),
            Err(e) => eprintln!("xfssim: {e}"),
        }
    }
    exit(0);
}

enum Flow {
    Continue,
    Exit,
}

fn dispatch(cmd: &str, args: &[&str], fs: &mut Option<Filesystem>) -> xfssim::error::Result<Flow> {
    match cmd {
        "format" => {
            let size: u64 = args.first().and_then(|s| s.parse().ok()).unwrap_or(100 * 1024 * 1024);
            let new_fs = Filesystem::with_flush_delay(Duration::from_millis(xfssim::config::DEFAULT_FLUSH_DELAY_MS));
            new_fs.format(size)?;
            println!("formatted {size} bytes across {} allocation groups", xfssim::config::NUM_AGS);
            *fs = Some(new_fs);
        }
        "mount" => {
            let fs = require(fs)?;
            fs.mount();
            println!("mounted; journal worker started");
        }
        "create" => {
            let fs = require(fs)?;
            let num = fs.create(args.first().copied());
            println!("created inode {num}");
        }
        "write" => {
            let fs = require(fs)?;
            let target = args.first().ok_or(xfssim::error::Error::NoSuchName(String::new()))?;
            let data = args.get(1).copied().unwrap_or("");
            let num = resolve(fs, target)?;
            let n = fs.write(num, data.as_bytes(), 0)?;
            println!("wrote {n} byte(s) to inode {num}");
        }
        "read" => {
            let fs = require(fs)?;
            let target = args.first().ok_or(xfssim::error::Error::NoSuchName(String::new()))?;
            let num = resolve(fs, target)?;
            let size = fs.inspect(num).map(|i| i.size).unwrap_or(0);
            let mut buf = vec![0u8; size as usize];
            fs.read(num, &mut buf, 0)?;
            println!("{}", String::from_utf8_lossy(&buf));
        }
        "inspect" => {
            let fs = require(fs)?;
            let target = args.first().ok_or(xfssim::error::Error::NoSuchName(String::new()))?;
            let num = resolve(fs, target)?;
            let inode = fs.inspect(num).ok_or(xfssim::error::Error::NoSuchInode(num))?;
            println!("inode {num}: size={} extents={}", inode.size, inode.extents.len());
            for extent in &inode.extents {
                println!(
                    "  logical_start={} ag={} phys_start={} block_count={}",
                    extent.logical_start, extent.ag_id, extent.phys_start, extent.block_count
                );
            }
        }
        "ls" | "list" => {
            let fs = require(fs)?;
            for (num, name) in fs.list() {
                println!("{num}\t{name}");
            }
        }
        "superblock" => {
            let fs = require(fs)?;
            let sb = fs.superblock()?;
            println!("magic=0x{:08x} block_size={} dblocks={} ag_count={} version={}", sb.magic, sb.block_size, sb.dblocks, sb.ag_count, sb.version);
        }
        "agf" => {
            let fs = require(fs)?;
            let ag_id = parse_ag(args)?;
            let agf = fs.agf(ag_id)?;
            println!("agf[{ag_id}]: length={} freeblks={} longest={}", agf.length, agf.freeblks, agf.longest);
        }
        "agi" => {
            let fs = require(fs)?;
            let ag_id = parse_ag(args)?;
            let agi = fs.agi(ag_id)?;
            println!("agi[{ag_id}]: count={} root={} freecount={}", agi.count, agi.root, agi.freecount);
        }
        "ag_summary" => {
            let fs = require(fs)?;
            for ag_id in 0..xfssim::config::NUM_AGS {
                let agf = fs.agf(ag_id)?;
                println!("ag {ag_id}: freeblks={} longest={}", agf.freeblks, agf.longest);
            }
        }
        "log" => {
            let fs = require(fs)?;
            println!("journal queue length: {}", fs.journal_queue_len()?);
        }
        "barrier_test" => {
            let fs = require(fs)?;
            fs.commit_barrier()?;
            println!("barrier flushed");
        }
        "exit" | "quit" => {
            if let Some(fs) = fs {
                fs.unmount();
            }
            return Ok(Flow::Exit);
        }
        _ => eprintln!("xfssim: unknown command '{cmd}'"),
    }
    Ok(Flow::Continue)
}

fn require(fs: &mut Option<Filesystem>) -> xfssim::error::Result<&mut Filesystem> {
    fs.as_mut().ok_or(xfssim::error::Error::NotInitialized)
}

fn parse_ag(args: &[&str]) -> xfssim::error::Result<usize> {
    args.first().and_then(|s| s.parse().ok()).ok_or(xfssim::error::Error::InvalidAg(usize::MAX))
}

/// Resolves a shell argument to an inode number: a bare integer is an inode number, anything else
/// is looked up by name.
fn resolve(fs: &Filesystem, target: &str) -> xfssim::error::Result<u32> {
    if let Ok(num) = target.parse::<u32>() {
        if fs.inspect(num).is_some() {
            return Ok(num);
        }
    }
    fs.lookup_by_name(target).ok_or_else(|| xfssim::error::Error::NoSuchName(target.to_owned()))
}
