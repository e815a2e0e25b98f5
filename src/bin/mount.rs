//! `rufs`: mounts `./DISKFILE` at a mountpoint via FUSE.

use fuser::MountOption;
use rufs_core::fs_ops::Filesystem;
use rufs_core::mount::RufsAdapter;
use std::env;
use std::path::{Path, PathBuf};
use std::process::exit;

/// The diskfile's path is fixed relative to the current working directory.
const DISKFILE: &str = "./DISKFILE";

#[derive(Default)]
struct Args {
	prog: String,
	mountpoint: Option<PathBuf>,
	debug: bool,
	single_threaded: bool,
	help: bool,
}

fn parse_args() -> Args {
	let mut args = Args::default();
	let mut iter = env::args();
	args.prog = iter.next().unwrap_or_else(|| "rufs".to_owned());

	for arg in iter {
		match arg.as_str() {
			"-h" | "--help" => args.help = true,
			"-d" => args.debug = true,
			"-s" => args.single_threaded = true,
			_ => args.mountpoint = Some(PathBuf::from(arg)),
		}
	}
	args
}

fn error(prog: &str, msg: &str) -> ! {
	eprintln!("{prog}: {msg}");
	exit(1);
}

fn main() {
	let args = parse_args();

	if args.help {
		println!("usage: {} [-s] [-d] MOUNTPOINT", args.prog);
		return;
	}
	// `fuser` dispatches every request from one thread regardless; `-s` is
	// accepted only for command-line compatibility.
	let _ = args.single_threaded;

	let Some(mountpoint) = args.mountpoint else {
		error(&args.prog, "specify a mountpoint directory");
	};

	let disk_path = Path::new(DISKFILE);
	let fs = Filesystem::open_or_create(disk_path).unwrap_or_else(|e| {
		error(&args.prog, &format!("{}: {e}", disk_path.display()));
	});

	if args.debug {
		eprintln!("{}: mounting {} at {}", args.prog, disk_path.display(), mountpoint.display());
	}

	let options = vec![MountOption::FSName("rufs".to_owned())];
	if let Err(e) = fuser::mount2(RufsAdapter::new(fs), &mountpoint, &options) {
		error(&args.prog, &format!("{}: {e}", mountpoint.display()));
	}
}
