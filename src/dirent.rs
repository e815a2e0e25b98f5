//! The directory engine: a directory's data is a dense array of fixed-size
//! entries spread across its (at most 16) direct data blocks.

use crate::alloc::alloc_dblk;
use crate::block::{BlockDevice, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::inode::{Inode, DIRECT_PTRS};
use crate::superblock::Superblock;

/// Maximum length of a name, not counting the terminating nul.
pub const NAME_CAPACITY: usize = 207;

const NAME_FIELD: usize = 208;
/// On-disk size of one directory entry.
pub const DIRENT_SIZE: usize = 2 + 2 + NAME_FIELD + 2;

/// One directory entry: binds a name to a child inode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
	pub ino: u16,
	pub valid: bool,
	pub name: String,
	pub len: u16,
}

impl DirEntry {
	fn encode(&self, buf: &mut [u8]) {
		let mut off = 0;
		buf[off..off + 2].copy_from_slice(&self.ino.to_le_bytes());
		off += 2;
		buf[off..off + 2].copy_from_slice(&(self.valid as u16).to_le_bytes());
		off += 2;
		let name_bytes = self.name.as_bytes();
		buf[off..off + NAME_FIELD].fill(0);
		buf[off..off + name_bytes.len()].copy_from_slice(name_bytes);
		off += NAME_FIELD;
		buf[off..off + 2].copy_from_slice(&self.len.to_le_bytes());
	}

	fn decode(buf: &[u8]) -> Self {
		let ino = u16::from_le_bytes(buf[0..2].try_into().unwrap());
		let valid = u16::from_le_bytes(buf[2..4].try_into().unwrap()) != 0;
		let name_field = &buf[4..4 + NAME_FIELD];
		let nul = name_field.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD);
		let name = String::from_utf8_lossy(&name_field[..nul]).into_owned();
		let len = u16::from_le_bytes(buf[4 + NAME_FIELD..4 + NAME_FIELD + 2].try_into().unwrap());
		Self {
			ino,
			valid,
			name,
			len,
		}
	}
}

/// Number of entry slots per data block.
pub fn entries_per_block() -> usize {
	BLOCK_SIZE / DIRENT_SIZE
}

/// Calls `f` for every populated direct pointer of `dir`, stopping at the
/// first zero slot (a directory's direct blocks are always allocated
/// contiguously from index 0, so this is equivalent to scanning all 16).
fn for_each_block<F: FnMut(u64) -> Result<bool>>(dir: &Inode, mut f: F) -> Result<()> {
	for &ptr in &dir.direct_ptr {
		if ptr == 0 {
			break;
		}
		if !f(ptr as u64)? {
			break;
		}
	}
	Ok(())
}

/// Looks up `name` in directory `dir`, returning its live entry.
pub fn dir_find(dev: &mut BlockDevice, dir: &Inode, name: &str) -> Result<DirEntry> {
	let mut found = None;
	for_each_block(dir, |blk| {
		let mut buf = [0u8; BLOCK_SIZE];
		dev.bio_read(blk, &mut buf)?;
		for slot in 0..entries_per_block() {
			let off = slot * DIRENT_SIZE;
			let entry = DirEntry::decode(&buf[off..off + DIRENT_SIZE]);
			if entry.valid && entry.name == name {
				found = Some(entry);
				return Ok(false);
			}
		}
		Ok(true)
	})?;
	found.ok_or(Error::NotFound)
}

/// Returns every live entry in directory `dir`, in on-disk order.
pub fn dir_list(dev: &mut BlockDevice, dir: &Inode) -> Result<Vec<DirEntry>> {
	let mut out = Vec::new();
	for_each_block(dir, |blk| {
		let mut buf = [0u8; BLOCK_SIZE];
		dev.bio_read(blk, &mut buf)?;
		for slot in 0..entries_per_block() {
			let off = slot * DIRENT_SIZE;
			let entry = DirEntry::decode(&buf[off..off + DIRENT_SIZE]);
			if entry.valid {
				out.push(entry);
			}
		}
		Ok(true)
	})?;
	Ok(out)
}

/// Adds a directory entry binding `name` to `f_ino` inside `dir`, updating
/// `dir`'s `size`/`link`/`vstat` in place. Does not call `writei`; the
/// caller persists `dir` itself.
pub fn dir_add(
	dev: &mut BlockDevice,
	sb: &Superblock,
	dir: &mut Inode,
	f_ino: u16,
	name: &str,
	mtime: i64,
) -> Result<()> {
	if name.is_empty() || name.len() > NAME_CAPACITY {
		return Err(Error::OutOfRange);
	}

	// Uniqueness check + first-tombstone search, in one pass.
	let mut free_slot: Option<(u64, usize)> = None;
	let mut err = None;
	for_each_block(dir, |blk| {
		let mut buf = [0u8; BLOCK_SIZE];
		dev.bio_read(blk, &mut buf)?;
		for slot in 0..entries_per_block() {
			let off = slot * DIRENT_SIZE;
			let entry = DirEntry::decode(&buf[off..off + DIRENT_SIZE]);
			if entry.valid && entry.name == name {
				err = Some(Error::AlreadyExists);
				return Ok(false);
			}
			if !entry.valid && free_slot.is_none() {
				free_slot = Some((blk, slot));
			}
		}
		Ok(true)
	})?;
	if let Some(e) = err {
		return Err(e);
	}

	let (blk, slot) = match free_slot {
		Some(s) => s,
		None => {
			// Growth: find the first unused direct pointer and allocate a block.
			let free_ptr_idx = dir
				.direct_ptr
				.iter()
				.position(|&p| p == 0)
				.ok_or(Error::NoSpace)?;
			let new_blk = alloc_dblk(dev, sb)?.ok_or(Error::NoSpace)?;
			dev.bio_write(new_blk as u64, &[0u8; BLOCK_SIZE])?;
			dir.direct_ptr[free_ptr_idx] = new_blk as i32;
			(new_blk as u64, 0)
		}
	};

	let entry = DirEntry {
		ino: f_ino,
		valid: true,
		name: name.to_owned(),
		len: name.len() as u16 + 1,
	};
	let mut buf = [0u8; BLOCK_SIZE];
	dev.bio_read(blk, &mut buf)?;
	entry.encode(&mut buf[slot * DIRENT_SIZE..(slot + 1) * DIRENT_SIZE]);
	dev.bio_write(blk, &buf)?;

	dir.size += DIRENT_SIZE as u32;
	dir.link += 1;
	dir.sync_vstat(mtime);
	Ok(())
}

/// Removes the live entry named `name` from `dir`, updating `dir`'s
/// `size`/`link`/`vstat` in place. Does not call `writei` or reclaim the
/// block even if it becomes entirely empty. Does not free the target's
/// inode/data blocks — the caller does that after consulting the returned
/// entry's `ino`.
pub fn dir_remove(
	dev: &mut BlockDevice,
	dir: &mut Inode,
	name: &str,
	mtime: i64,
) -> Result<DirEntry> {
	let mut removed = None;
	for_each_block(dir, |blk| {
		let mut buf = [0u8; BLOCK_SIZE];
		dev.bio_read(blk, &mut buf)?;
		for slot in 0..entries_per_block() {
			let off = slot * DIRENT_SIZE;
			let mut entry = DirEntry::decode(&buf[off..off + DIRENT_SIZE]);
			if entry.valid && entry.name == name {
				let original = entry.clone();
				entry.valid = false;
				entry.encode(&mut buf[off..off + DIRENT_SIZE]);
				dev.bio_write(blk, &buf)?;
				removed = Some(original);
				return Ok(false);
			}
		}
		Ok(true)
	})?;
	let removed = removed.ok_or(Error::NotFound)?;
	dir.size -= DIRENT_SIZE as u32;
	dir.link -= 1;
	dir.sync_vstat(mtime);
	Ok(removed)
}

/// The maximum number of live entries a directory can ever hold: all direct
/// blocks allocated and full.
pub fn max_entries() -> usize {
	DIRECT_PTRS * entries_per_block()
}
