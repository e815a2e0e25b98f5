//! `mkfs`: bootstraps a brand-new diskfile with a valid root directory.

use crate::alloc::alloc_dblk;
use crate::bitmap::Bitmap;
use crate::block::{BlockDevice, BLOCK_SIZE};
use crate::dirent::dir_add;
use crate::error::Result;
use crate::inode::{FileType, Inode, Vstat, DIRECT_PTRS, INDIRECT_PTRS};
use crate::namei::ROOT_INO;
use crate::superblock::Superblock;
use crate::util::get_timestamp;
use std::path::Path;

/// Formats a fresh `rufs` image at `path`, overwriting anything already
/// there. Idempotent in effect: running it twice on the same path produces
/// a byte-for-byte identical diskfile (modulo the root's `mtime`, which is
/// sampled from the wall clock both times).
pub fn format<P: AsRef<Path>>(path: P) -> Result<()> {
	let sb = Superblock::new();
	let mut dev = BlockDevice::init(path, sb.total_blocks())?;
	sb.write(&mut dev)?;

	// Zero-initialize both bitmaps before anything is allocated out of them.
	dev.bio_write(sb.i_bitmap_blk as u64, &[0u8; BLOCK_SIZE])?;
	dev.bio_write(sb.d_bitmap_blk as u64, &[0u8; BLOCK_SIZE])?;

	let now = get_timestamp().as_secs() as i64;

	let mut root = Inode {
		ino: ROOT_INO,
		valid: true,
		size: 0,
		file_type: FileType::Directory as u32,
		link: 0,
		direct_ptr: [0i32; DIRECT_PTRS],
		indirect_ptr: [0i32; INDIRECT_PTRS],
		vstat: Vstat {
			mode: 0o040755,
			nlink: 0,
			ino: ROOT_INO as u64,
			mtime: now,
			blocks: 0,
			blksize: BLOCK_SIZE as u64,
			size: 0,
		},
	};
	// The root is its own parent: both `.` and `..` point back at inode 0.
	dir_add(&mut dev, &sb, &mut root, ROOT_INO, ".", now)?;
	dir_add(&mut dev, &sb, &mut root, ROOT_INO, "..", now)?;
	crate::inode::writei(&mut dev, &sb, ROOT_INO, &root)?;

	// Mark inode 0 allocated only now that it is fully populated on disk.
	let mut ibuf = [0u8; BLOCK_SIZE];
	dev.bio_read(sb.i_bitmap_blk as u64, &mut ibuf)?;
	Bitmap::new(&mut ibuf).set(ROOT_INO as usize);
	dev.bio_write(sb.i_bitmap_blk as u64, &ibuf)?;

	dev.flush()
}

/// Allocates and zero-initializes a fresh data block, returning its
/// absolute number. A thin wrapper kept here so callers that build a new
/// inode's first block (root, `mkdir`) share one code path with `dir_add`'s
/// own growth step.
pub(crate) fn alloc_zeroed_block(dev: &mut BlockDevice, sb: &Superblock) -> Result<u32> {
	let blk = alloc_dblk(dev, sb)?.ok_or(crate::error::Error::NoSpace)?;
	dev.bio_write(blk as u64, &[0u8; BLOCK_SIZE])?;
	Ok(blk)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::dirent::dir_list;
	use tempfile::NamedTempFile;

	#[test]
	fn root_is_allocated_and_valid() {
		let tmp = NamedTempFile::new().unwrap();
		format(tmp.path()).unwrap();
		let mut dev = BlockDevice::open(tmp.path()).unwrap();
		let sb = Superblock::read(&mut dev).unwrap();

		let mut bm = [0u8; BLOCK_SIZE];
		dev.bio_read(sb.i_bitmap_blk as u64, &mut bm).unwrap();
		assert_eq!(Bitmap::new(&mut bm).get(ROOT_INO as usize), 1);

		let root = crate::inode::readi(&mut dev, &sb, ROOT_INO).unwrap();
		assert!(root.valid);
		assert_eq!(root.kind(), Some(FileType::Directory));
		assert_eq!(root.link, 2);
	}

	#[test]
	fn root_listing_is_dot_and_dotdot() {
		let tmp = NamedTempFile::new().unwrap();
		format(tmp.path()).unwrap();
		let mut dev = BlockDevice::open(tmp.path()).unwrap();
		let sb = Superblock::read(&mut dev).unwrap();
		let root = crate::inode::readi(&mut dev, &sb, ROOT_INO).unwrap();

		let mut entries = dir_list(&mut dev, &root).unwrap();
		entries.sort_by(|a, b| a.name.cmp(&b.name));
		assert_eq!(entries.len(), 2);
		assert_eq!(entries[0].name, ".");
		assert_eq!(entries[0].ino, ROOT_INO);
		assert_eq!(entries[1].name, "..");
		assert_eq!(entries[1].ino, ROOT_INO);
	}

	#[test]
	fn diskfile_is_preallocated_through_data_region() {
		let tmp = NamedTempFile::new().unwrap();
		format(tmp.path()).unwrap();
		let sb = Superblock::new();
		let len = std::fs::metadata(tmp.path()).unwrap().len();
		assert!(len >= sb.d_start_blk as u64 * BLOCK_SIZE as u64);
	}

	#[test]
	fn magic_bytes_at_block_zero() {
		let tmp = NamedTempFile::new().unwrap();
		format(tmp.path()).unwrap();
		let bytes = std::fs::read(tmp.path()).unwrap();
		assert_eq!(&bytes[0..4], &[0x3A, 0x5C, 0x00, 0x00]);
	}

	#[test]
	fn format_twice_is_byte_for_byte_idempotent() {
		// The root inode's `vstat.mtime` (an i64) sits 128 bytes into its
		// encoded record: ino(2) + valid(2) + size(4) + type(4) + link(4) +
		// 16 direct_ptr(4 each) + 8 indirect_ptr(4 each) + vstat.mode(4) +
		// vstat.nlink(4) + vstat.ino(8) = 128. It is the only field `format`
		// samples from the wall clock, so it is masked before comparing.
		const MTIME_OFFSET_IN_INODE: u64 = 128;
		const MTIME_LEN: usize = 8;

		let tmp = NamedTempFile::new().unwrap();
		format(tmp.path()).unwrap();
		let mut first = std::fs::read(tmp.path()).unwrap();

		format(tmp.path()).unwrap();
		let mut second = std::fs::read(tmp.path()).unwrap();

		assert_eq!(first.len(), second.len());

		let sb = Superblock::new();
		let mtime_at = (sb.i_start_blk as u64 * BLOCK_SIZE as u64 + MTIME_OFFSET_IN_INODE) as usize;
		for buf in [&mut first, &mut second] {
			buf[mtime_at..mtime_at + MTIME_LEN].fill(0);
		}
		assert_eq!(first, second);
	}
}
