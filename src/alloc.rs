//! Inode and data-block allocators.
//!
//! `direct_ptr` slots store *absolute* block numbers. The data bitmap,
//! however, is indexed by *logical* position within the data region, so
//! [`alloc_dblk`]/[`free_dblk`] are the single conversion point between the
//! two: everything else in the crate only ever sees absolute block numbers.

use crate::bitmap::Bitmap;
use crate::block::{BlockDevice, BLOCK_SIZE};
use crate::error::Result;
use crate::superblock::Superblock;

/// Finds and claims the first available inode number.
///
/// Returns `None` if the inode table is full.
pub fn alloc_ino(dev: &mut BlockDevice, sb: &Superblock) -> Result<Option<u16>> {
	let mut buf = [0u8; BLOCK_SIZE];
	dev.bio_read(sb.i_bitmap_blk as u64, &mut buf)?;
	let mut bitmap = Bitmap::new(&mut buf);
	let Some(i) = bitmap.first_clear(sb.max_inum as usize) else {
		return Ok(None);
	};
	bitmap.set(i);
	dev.bio_write(sb.i_bitmap_blk as u64, &buf)?;
	Ok(Some(i as u16))
}

/// Clears the inode-bitmap bit for `ino`.
pub fn free_ino(dev: &mut BlockDevice, sb: &Superblock, ino: u16) -> Result<()> {
	let mut buf = [0u8; BLOCK_SIZE];
	dev.bio_read(sb.i_bitmap_blk as u64, &mut buf)?;
	Bitmap::new(&mut buf).unset(ino as usize);
	dev.bio_write(sb.i_bitmap_blk as u64, &buf)
}

/// Finds and claims the first available data block, returning its
/// *absolute* block number.
///
/// Returns `None` if the data region is full.
pub fn alloc_dblk(dev: &mut BlockDevice, sb: &Superblock) -> Result<Option<u32>> {
	let mut buf = [0u8; BLOCK_SIZE];
	dev.bio_read(sb.d_bitmap_blk as u64, &mut buf)?;
	let mut bitmap = Bitmap::new(&mut buf);
	let Some(logical) = bitmap.first_clear(sb.max_dnum as usize) else {
		return Ok(None);
	};
	bitmap.set(logical);
	dev.bio_write(sb.d_bitmap_blk as u64, &buf)?;
	Ok(Some(sb.d_start_blk + logical as u32))
}

/// Clears the data-bitmap bit backing the *absolute* block number `abs_blk`.
pub fn free_dblk(dev: &mut BlockDevice, sb: &Superblock, abs_blk: u32) -> Result<()> {
	let logical = (abs_blk - sb.d_start_blk) as usize;
	let mut buf = [0u8; BLOCK_SIZE];
	dev.bio_read(sb.d_bitmap_blk as u64, &mut buf)?;
	Bitmap::new(&mut buf).unset(logical);
	dev.bio_write(sb.d_bitmap_blk as u64, &buf)
}

#[cfg(test)]
mod test {
	use super::*;
	use tempfile::NamedTempFile;

	fn dev(sb: &Superblock) -> BlockDevice {
		let tmp = NamedTempFile::new().unwrap();
		BlockDevice::init(tmp.path(), sb.total_blocks()).unwrap()
	}

	#[test]
	fn alloc_ino_scans_in_order_and_is_stable() {
		let sb = Superblock::new();
		let mut d = dev(&sb);
		assert_eq!(alloc_ino(&mut d, &sb).unwrap(), Some(0));
		assert_eq!(alloc_ino(&mut d, &sb).unwrap(), Some(1));
		free_ino(&mut d, &sb, 0).unwrap();
		assert_eq!(alloc_ino(&mut d, &sb).unwrap(), Some(0));
	}

	#[test]
	fn alloc_ino_exhausts() {
		let sb = Superblock::new();
		let mut d = dev(&sb);
		for i in 0..sb.max_inum {
			assert_eq!(alloc_ino(&mut d, &sb).unwrap(), Some(i));
		}
		assert_eq!(alloc_ino(&mut d, &sb).unwrap(), None);
	}

	#[test]
	fn alloc_dblk_returns_absolute_numbers() {
		let sb = Superblock::new();
		let mut d = dev(&sb);
		let first = alloc_dblk(&mut d, &sb).unwrap().unwrap();
		assert_eq!(first, sb.d_start_blk);
		let second = alloc_dblk(&mut d, &sb).unwrap().unwrap();
		assert_eq!(second, sb.d_start_blk + 1);
	}

	#[test]
	fn free_dblk_allows_reuse() {
		let sb = Superblock::new();
		let mut d = dev(&sb);
		let blk = alloc_dblk(&mut d, &sb).unwrap().unwrap();
		free_dblk(&mut d, &sb, blk).unwrap();
		assert_eq!(alloc_dblk(&mut d, &sb).unwrap().unwrap(), blk);
	}
}
