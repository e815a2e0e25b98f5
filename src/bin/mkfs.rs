//! `mkfs.rufs`: formats a diskfile as a fresh `rufs` image.

use rufs_core::block::BlockDevice;
use rufs_core::cli::confirm;
use rufs_core::superblock::Superblock;
use std::env;
use std::path::{Path, PathBuf};
use std::process::exit;

#[derive(Default)]
struct Args {
	prog: String,
	diskfile: Option<PathBuf>,
	force: bool,
	help: bool,
}

fn parse_args() -> Args {
	let mut args = Args::default();
	let mut iter = env::args();
	args.prog = iter.next().unwrap_or_else(|| "mkfs.rufs".to_owned());

	for arg in iter {
		match arg.as_str() {
			"-h" | "--help" => args.help = true,
			"-f" | "--force" => args.force = true,
			_ => args.diskfile = Some(PathBuf::from(arg)),
		}
	}
	args
}

fn error(prog: &str, msg: &str) -> ! {
	eprintln!("{prog}: {msg}");
	exit(1);
}

/// Returns whether `path` already looks like a valid `rufs` image: it opens,
/// and block 0 carries the right magic number.
fn looks_like_rufs_image(path: &Path) -> bool {
	let Ok(mut dev) = BlockDevice::open(path) else {
		return false;
	};
	Superblock::read(&mut dev).is_ok()
}

fn main() {
	let args = parse_args();

	if args.help {
		println!("usage: {} [-f] DISKFILE", args.prog);
		return;
	}

	let Some(path) = args.diskfile else {
		error(&args.prog, "specify a path for the diskfile");
	};

	if !args.force && looks_like_rufs_image(&path) {
		let ok = confirm(&format!(
			"{} already contains a rufs image, overwrite? (y/N) ",
			path.display()
		));
		if !ok {
			eprintln!("Abort.");
			exit(1);
		}
	}

	if let Err(e) = rufs_core::mkfs::format(&path) {
		error(&args.prog, &format!("{}: {e}", path.display()));
	}

	println!("{}: formatted rufs image", path.display());
}
