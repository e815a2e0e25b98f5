//! The inode table: fixed-size inode records packed into the inode region.

use crate::block::{BlockDevice, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::superblock::Superblock;

/// Number of direct data-block pointers an inode carries.
pub const DIRECT_PTRS: usize = 16;
/// Number of reserved indirect pointers; unused by the core, must round-trip
/// as zero.
pub const INDIRECT_PTRS: usize = 8;

/// The inode record's on-disk size, in bytes.
pub const INODE_SIZE: usize = 2 + 2 + 4 + 4 + 4 + DIRECT_PTRS * 4 + INDIRECT_PTRS * 4 + VSTAT_SIZE;

const VSTAT_SIZE: usize = 4 + 4 + 8 + 8 + 8 + 8 + 8;

/// A file's type, as stored in an inode's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
	Regular = 1,
	Directory = 2,
}

impl FileType {
	fn from_u32(v: u32) -> Option<Self> {
		match v {
			1 => Some(Self::Regular),
			2 => Some(Self::Directory),
			_ => None,
		}
	}
}

/// The cached POSIX-`stat` projection carried alongside each inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vstat {
	pub mode: u32,
	pub nlink: u32,
	pub ino: u64,
	pub mtime: i64,
	pub blocks: u64,
	pub blksize: u64,
	pub size: u64,
}

/// An inode: a file or directory's metadata, independent of its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
	pub ino: u16,
	pub valid: bool,
	pub size: u32,
	pub file_type: u32,
	pub link: u32,
	pub direct_ptr: [i32; DIRECT_PTRS],
	pub indirect_ptr: [i32; INDIRECT_PTRS],
	pub vstat: Vstat,
}

impl Inode {
	/// Returns the inode's type, if it is one the core understands.
	pub fn kind(&self) -> Option<FileType> {
		FileType::from_u32(self.file_type)
	}

	/// Returns the number of non-zero direct pointers, matching the
	/// `st_blocks` invariant.
	pub fn block_count(&self) -> u32 {
		self.direct_ptr.iter().filter(|&&p| p != 0).count() as u32
	}

	/// Recomputes `vstat` from the inode's own fields; called after any
	/// mutation that should be reflected in a subsequent `getattr`.
	pub fn sync_vstat(&mut self, mtime: i64) {
		self.vstat.ino = self.ino as u64;
		self.vstat.nlink = self.link;
		self.vstat.size = self.size as u64;
		self.vstat.blocks = self.block_count() as u64;
		self.vstat.blksize = BLOCK_SIZE as u64;
		self.vstat.mtime = mtime;
	}

	fn encode(&self, buf: &mut [u8]) {
		let mut off = 0;
		macro_rules! put {
			($v:expr) => {{
				let bytes = $v.to_le_bytes();
				buf[off..off + bytes.len()].copy_from_slice(&bytes);
				off += bytes.len();
			}};
		}
		put!(self.ino);
		put!(if self.valid { 1u16 } else { 0u16 });
		put!(self.size);
		put!(self.file_type);
		put!(self.link);
		for p in self.direct_ptr {
			put!(p);
		}
		for p in self.indirect_ptr {
			put!(p);
		}
		put!(self.vstat.mode);
		put!(self.vstat.nlink);
		put!(self.vstat.ino);
		put!(self.vstat.mtime);
		put!(self.vstat.blocks);
		put!(self.vstat.blksize);
		put!(self.vstat.size);
		debug_assert_eq!(off, INODE_SIZE);
	}

	fn decode(buf: &[u8]) -> Self {
		let mut off = 0;
		macro_rules! get {
			($t:ty) => {{
				const N: usize = std::mem::size_of::<$t>();
				let v = <$t>::from_le_bytes(buf[off..off + N].try_into().unwrap());
				off += N;
				v
			}};
		}
		let ino = get!(u16);
		let valid = get!(u16) != 0;
		let size = get!(u32);
		let file_type = get!(u32);
		let link = get!(u32);
		let mut direct_ptr = [0i32; DIRECT_PTRS];
		for p in &mut direct_ptr {
			*p = get!(i32);
		}
		let mut indirect_ptr = [0i32; INDIRECT_PTRS];
		for p in &mut indirect_ptr {
			*p = get!(i32);
		}
		let vstat = Vstat {
			mode: get!(u32),
			nlink: get!(u32),
			ino: get!(u64),
			mtime: get!(i64),
			blocks: get!(u64),
			blksize: get!(u64),
			size: get!(u64),
		};
		Self {
			ino,
			valid,
			size,
			file_type,
			link,
			direct_ptr,
			indirect_ptr,
			vstat,
		}
	}
}

/// Computes the inode table block and in-block byte offset for `ino`.
fn locate(ino: u16, sb: &Superblock) -> Result<(u64, usize)> {
	if ino as u32 >= sb.max_inum as u32 {
		return Err(Error::OutOfRange);
	}
	let inodes_per_block = sb.inodes_per_block();
	let block = sb.i_start_blk as u64 + ino as u64 / inodes_per_block;
	let offset = (ino as u64 % inodes_per_block) as usize * INODE_SIZE;
	Ok((block, offset))
}

/// Reads inode `ino` from the inode table.
pub fn readi(dev: &mut BlockDevice, sb: &Superblock, ino: u16) -> Result<Inode> {
	let (block, offset) = locate(ino, sb)?;
	let mut buf = [0u8; BLOCK_SIZE];
	dev.bio_read(block, &mut buf)?;
	Ok(Inode::decode(&buf[offset..offset + INODE_SIZE]))
}

/// Writes `inode` into the inode table at its own `ino`'s slot.
///
/// Read-modify-write: the containing block is read first so neighboring
/// inodes packed into the same block are preserved.
pub fn writei(dev: &mut BlockDevice, sb: &Superblock, ino: u16, inode: &Inode) -> Result<()> {
	let (block, offset) = locate(ino, sb)?;
	let mut buf = [0u8; BLOCK_SIZE];
	dev.bio_read(block, &mut buf)?;
	inode.encode(&mut buf[offset..offset + INODE_SIZE]);
	dev.bio_write(block, &buf)
}
