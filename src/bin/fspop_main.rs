//! Entry point for the `fspop` tool.
//!
//! Reads a manifest (from a file or standard input) and populates the
//! target directory with the files, directories, and symlinks it describes.
//! This file only handles CLI glue; the population logic lives in the
//! library.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process;

use clap::Parser;

use fspop::hostdir::HostDirFs;
use fspop::populate;

/// Populate a filesystem tree from a manifest.
#[derive(Parser)]
struct Cli {
    /// Target directory to populate. Must already exist.
    target: PathBuf,

    /// Manifest file; standard input when omitted.
    manifest: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Cli::parse();

    let input: Box<dyn BufRead> = match &args.manifest {
        Some(path) => match File::open(path) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => {
                eprintln!("fspop: open {}: {}", path.display(), e);
                process::exit(1);
            }
        },
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut fs = match HostDirFs::open(&args.target) {
        Ok(fs) => fs,
        Err(e) => {
            eprintln!("fspop: open {}: {}", args.target.display(), e);
            process::exit(1);
        }
    };

    // Any error leaves the target in whatever partial state it had reached;
    // there is no rollback.
    match populate::run(&mut fs, input) {
        Ok(summary) => {
            println!(
                "populated {}: {} created, {} skipped",
                args.target.display(),
                summary.created,
                summary.skipped
            );
        }
        Err(e) => {
            eprintln!("fspop: {}", e);
            process::exit(1);
        }
    }
}
