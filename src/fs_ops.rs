//! The filesystem façade: one operation per FUSE upcall, each taking and
//! returning plain core types. The mount adapter is the only caller; it owns
//! mapping these `Result`s to FUSE's replies.

use crate::alloc::{alloc_ino, free_dblk, free_ino};
use crate::block::{BlockDevice, BLOCK_SIZE};
use crate::dirent::{dir_add, dir_find, dir_list, dir_remove, DirEntry};
use crate::error::{Error, Result};
use crate::inode::{readi, writei, FileType, Inode, Vstat, DIRECT_PTRS, INDIRECT_PTRS};
use crate::namei::{get_node_by_path, split_parent, ROOT_INO};
use crate::superblock::Superblock;
use crate::util::get_timestamp;
use std::path::Path;

/// The maximum size, in bytes, a regular file can reach: 16 direct blocks,
/// no indirect addressing.
pub const MAX_FILE_SIZE: u64 = DIRECT_PTRS as u64 * BLOCK_SIZE as u64;

/// An open, mounted `rufs` image. Owns the block device and the (immutable,
/// post-`mkfs`) superblock; every operation takes `&mut self` since the
/// underlying diskfile is not safe for concurrent access from two callers.
pub struct Filesystem {
	dev: BlockDevice,
	sb: Superblock,
}

impl Filesystem {
	/// Opens an existing `rufs` image at `path`.
	pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
		let mut dev = BlockDevice::open(path)?;
		let sb = Superblock::read(&mut dev)?;
		Ok(Self { dev, sb })
	}

	/// Formats a new image at `path` and opens it.
	pub fn create<P: AsRef<Path> + Clone>(path: P) -> Result<Self> {
		crate::mkfs::format(path.clone())?;
		Self::open(path)
	}

	/// Opens `path`, formatting it first if it doesn't exist yet or doesn't
	/// look like a valid `rufs` image (bad magic). Runs `mkfs` at most once,
	/// on first mount.
	pub fn open_or_create<P: AsRef<Path> + Clone>(path: P) -> Result<Self> {
		match Self::open(path.clone()) {
			Ok(fs) => Ok(fs),
			Err(Error::Corrupt) => Self::create(path),
			Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::create(path),
			Err(e) => Err(e),
		}
	}

	fn now(&self) -> i64 {
		get_timestamp().as_secs() as i64
	}

	fn resolve(&mut self, path: &str) -> Result<Inode> {
		get_node_by_path(&mut self.dev, &self.sb, path, ROOT_INO)
	}

	fn resolve_parent(&mut self, path: &str) -> Result<(Inode, String)> {
		let (parent_path, leaf) = split_parent(path).ok_or(Error::NotFound)?;
		let parent = self.resolve(&parent_path)?;
		Ok((parent, leaf))
	}

	/// Returns `path`'s cached `stat` projection.
	pub fn getattr(&mut self, path: &str) -> Result<Vstat> {
		Ok(self.resolve(path)?.vstat)
	}

	/// Confirms `path` exists and is a directory, for `opendir`.
	pub fn opendir(&mut self, path: &str) -> Result<()> {
		let node = self.resolve(path)?;
		if node.kind() != Some(FileType::Directory) {
			return Err(Error::NotFound);
		}
		Ok(())
	}

	/// Lists `path`'s live entries.
	pub fn readdir(&mut self, path: &str) -> Result<Vec<DirEntry>> {
		let dir = self.resolve(path)?;
		if dir.kind() != Some(FileType::Directory) {
			return Err(Error::NotFound);
		}
		dir_list(&mut self.dev, &dir)
	}

	/// Creates a new, empty directory at `path`.
	pub fn mkdir(&mut self, path: &str, mode: u32) -> Result<Vstat> {
		let (mut parent, leaf) = self.resolve_parent(path)?;
		if parent.kind() != Some(FileType::Directory) {
			return Err(Error::NotFound);
		}
		let now = self.now();
		let new_ino = alloc_ino(&mut self.dev, &self.sb)?.ok_or(Error::NoSpace)?;

		let mut node = blank_inode(new_ino, FileType::Directory, mode | 0o040000, now);
		// Growing the new directory's own `.`/`..` can still fail (e.g. the
		// data region is exhausted); back out both the inode and any data
		// block already allocated for it if so.
		if let Err(e) = (|| {
			dir_add(&mut self.dev, &self.sb, &mut node, new_ino, ".", now)?;
			dir_add(&mut self.dev, &self.sb, &mut node, parent.ino, "..", now)
		})() {
			self.reclaim(&node)?;
			free_ino(&mut self.dev, &self.sb, new_ino)?;
			return Err(e);
		}

		if let Err(e) = dir_add(&mut self.dev, &self.sb, &mut parent, new_ino, &leaf, now) {
			self.reclaim(&node)?;
			free_ino(&mut self.dev, &self.sb, new_ino)?;
			return Err(e);
		}

		writei(&mut self.dev, &self.sb, new_ino, &node)?;
		writei(&mut self.dev, &self.sb, parent.ino, &parent)?;
		Ok(node.vstat)
	}

	/// Removes the empty directory at `path`.
	pub fn rmdir(&mut self, path: &str) -> Result<()> {
		let (mut parent, leaf) = self.resolve_parent(path)?;
		let entry = dir_find(&mut self.dev, &parent, &leaf)?;
		let target = readi(&mut self.dev, &self.sb, entry.ino)?;
		if target.kind() != Some(FileType::Directory) {
			return Err(Error::NotFound);
		}
		// Only "." and ".." may remain: dir_add counts both in `link`.
		if target.link > 2 {
			return Err(Error::NotEmpty);
		}

		let now = self.now();
		dir_remove(&mut self.dev, &mut parent, &leaf, now)?;
		writei(&mut self.dev, &self.sb, parent.ino, &parent)?;
		self.reclaim(&target)?;
		free_ino(&mut self.dev, &self.sb, entry.ino)?;
		Ok(())
	}

	/// Creates a new, empty regular file at `path`.
	pub fn create_file(&mut self, path: &str, mode: u32) -> Result<Vstat> {
		let (mut parent, leaf) = self.resolve_parent(path)?;
		if parent.kind() != Some(FileType::Directory) {
			return Err(Error::NotFound);
		}
		let now = self.now();
		let new_ino = alloc_ino(&mut self.dev, &self.sb)?.ok_or(Error::NoSpace)?;
		let mut node = blank_inode(new_ino, FileType::Regular, mode | 0o100000, now);
		// Regular files carry no entries of their own to accumulate `link`
		// the way a directory's `.`/`..` does, so it is seeded at 1 (the
		// one hard link `create` itself establishes) rather than left at 0.
		node.link = 1;
		node.sync_vstat(now);

		if let Err(e) = dir_add(&mut self.dev, &self.sb, &mut parent, new_ino, &leaf, now) {
			free_ino(&mut self.dev, &self.sb, new_ino)?;
			return Err(e);
		}
		writei(&mut self.dev, &self.sb, new_ino, &node)?;
		writei(&mut self.dev, &self.sb, parent.ino, &parent)?;
		Ok(node.vstat)
	}

	/// Confirms `path` exists and is a regular file, for `open`.
	pub fn open_file(&mut self, path: &str) -> Result<Vstat> {
		let node = self.resolve(path)?;
		if node.kind() != Some(FileType::Regular) {
			return Err(Error::NotFound);
		}
		Ok(node.vstat)
	}

	/// Reads up to `size` bytes from `path` starting at `offset`, stopping at
	/// the file's logical end. A hole (an unallocated direct block) reads
	/// back as zeroes.
	pub fn read(&mut self, path: &str, offset: u64, size: u32) -> Result<Vec<u8>> {
		let node = self.resolve(path)?;
		if node.kind() != Some(FileType::Regular) {
			return Err(Error::NotFound);
		}
		let file_size = node.size as u64;
		if offset >= file_size {
			return Ok(Vec::new());
		}
		let want = (size as u64).min(file_size - offset) as usize;
		let mut out = Vec::with_capacity(want);
		let mut pos = offset;
		while out.len() < want {
			let blk_idx = (pos / BLOCK_SIZE as u64) as usize;
			let blk_off = (pos % BLOCK_SIZE as u64) as usize;
			let take = (BLOCK_SIZE - blk_off).min(want - out.len());
			let ptr = node.direct_ptr[blk_idx];
			if ptr == 0 {
				out.extend(std::iter::repeat(0u8).take(take));
			} else {
				let mut buf = [0u8; BLOCK_SIZE];
				self.dev.bio_read(ptr as u64, &mut buf)?;
				out.extend_from_slice(&buf[blk_off..blk_off + take]);
			}
			pos += take as u64;
		}
		Ok(out)
	}

	/// Writes `data` into `path` at `offset`, growing the file (and
	/// allocating blocks on demand) as needed. Returns the number of bytes
	/// written.
	pub fn write(&mut self, path: &str, offset: u64, data: &[u8]) -> Result<u32> {
		let mut node = self.resolve(path)?;
		if node.kind() != Some(FileType::Regular) {
			return Err(Error::NotFound);
		}
		if offset + data.len() as u64 > MAX_FILE_SIZE {
			return Err(Error::NoSpace);
		}

		let mut pos = offset;
		let mut written = 0usize;
		while written < data.len() {
			let blk_idx = (pos / BLOCK_SIZE as u64) as usize;
			let blk_off = (pos % BLOCK_SIZE as u64) as usize;
			let take = (BLOCK_SIZE - blk_off).min(data.len() - written);

			if node.direct_ptr[blk_idx] == 0 {
				let blk = crate::mkfs::alloc_zeroed_block(&mut self.dev, &self.sb)?;
				node.direct_ptr[blk_idx] = blk as i32;
			}
			let ptr = node.direct_ptr[blk_idx] as u64;
			let mut buf = [0u8; BLOCK_SIZE];
			self.dev.bio_read(ptr, &mut buf)?;
			buf[blk_off..blk_off + take].copy_from_slice(&data[written..written + take]);
			self.dev.bio_write(ptr, &buf)?;

			pos += take as u64;
			written += take;
		}

		if pos > node.size as u64 {
			node.size = pos as u32;
		}
		let now = self.now();
		node.sync_vstat(now);
		writei(&mut self.dev, &self.sb, node.ino, &node)?;
		Ok(written as u32)
	}

	/// Truncates or grows `path` to exactly `size` bytes. Shrinking frees the
	/// blocks past the new end; growing eagerly allocates and zeroes the
	/// newly covered blocks rather than leaving a sparse hole.
	pub fn truncate(&mut self, path: &str, size: u64) -> Result<()> {
		if size > MAX_FILE_SIZE {
			return Err(Error::NoSpace);
		}
		let mut node = self.resolve(path)?;
		if node.kind() != Some(FileType::Regular) {
			return Err(Error::NotFound);
		}

		let old_blocks = crate::util::ceil_division(node.size as u64, BLOCK_SIZE as u64) as usize;
		let new_blocks = crate::util::ceil_division(size, BLOCK_SIZE as u64) as usize;
		for idx in new_blocks..old_blocks {
			let ptr = node.direct_ptr[idx];
			if ptr != 0 {
				free_dblk(&mut self.dev, &self.sb, ptr as u32)?;
				node.direct_ptr[idx] = 0;
			}
		}
		for idx in old_blocks..new_blocks {
			if node.direct_ptr[idx] == 0 {
				let blk = crate::mkfs::alloc_zeroed_block(&mut self.dev, &self.sb)?;
				node.direct_ptr[idx] = blk as i32;
			}
		}

		node.size = size as u32;
		let now = self.now();
		node.sync_vstat(now);
		writei(&mut self.dev, &self.sb, node.ino, &node)
	}

	/// Removes the regular file at `path`, reclaiming its data blocks and
	/// inode.
	pub fn unlink(&mut self, path: &str) -> Result<()> {
		let (mut parent, leaf) = self.resolve_parent(path)?;
		let entry = dir_find(&mut self.dev, &parent, &leaf)?;
		let target = readi(&mut self.dev, &self.sb, entry.ino)?;
		if target.kind() != Some(FileType::Regular) {
			return Err(Error::NotFound);
		}

		let now = self.now();
		dir_remove(&mut self.dev, &mut parent, &leaf, now)?;
		writei(&mut self.dev, &self.sb, parent.ino, &parent)?;
		self.reclaim(&target)?;
		free_ino(&mut self.dev, &self.sb, entry.ino)?;
		Ok(())
	}

	/// Updates `path`'s recorded modification time.
	pub fn utimens(&mut self, path: &str, mtime: i64) -> Result<()> {
		let mut node = self.resolve(path)?;
		node.sync_vstat(mtime);
		writei(&mut self.dev, &self.sb, node.ino, &node)
	}

	/// Flushes buffered writes to the backing diskfile.
	pub fn flush(&mut self) -> Result<()> {
		self.dev.flush()
	}

	/// Frees every data block still referenced by `node`'s direct pointers.
	fn reclaim(&mut self, node: &Inode) -> Result<()> {
		for &ptr in &node.direct_ptr {
			if ptr != 0 {
				free_dblk(&mut self.dev, &self.sb, ptr as u32)?;
			}
		}
		Ok(())
	}
}

fn blank_inode(ino: u16, kind: FileType, mode: u32, now: i64) -> Inode {
	Inode {
		ino,
		valid: true,
		size: 0,
		file_type: kind as u32,
		link: 0,
		direct_ptr: [0; DIRECT_PTRS],
		indirect_ptr: [0; INDIRECT_PTRS],
		vstat: Vstat {
			mode,
			nlink: 0,
			ino: ino as u64,
			mtime: now,
			blocks: 0,
			blksize: BLOCK_SIZE as u64,
			size: 0,
		},
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use tempfile::NamedTempFile;

	fn fresh() -> Filesystem {
		let tmp = NamedTempFile::new().unwrap();
		Filesystem::create(tmp.path().to_owned()).unwrap()
	}

	/// Counts set bits in the data bitmap, i.e. data blocks currently
	/// considered allocated.
	fn allocated_data_blocks(fs: &mut Filesystem) -> usize {
		let mut buf = [0u8; BLOCK_SIZE];
		fs.dev.bio_read(fs.sb.d_bitmap_blk as u64, &mut buf).unwrap();
		let bitmap = crate::bitmap::Bitmap::new(&mut buf);
		(0..fs.sb.max_dnum as usize).filter(|&i| bitmap.get(i) == 1).count()
	}

	#[test]
	fn root_lists_dot_and_dotdot_on_fresh_mount() {
		let mut fs = fresh();
		let entries = fs.readdir("/").unwrap();
		assert_eq!(entries.len(), 2);
	}

	#[test]
	fn mkdir_then_listed_in_parent() {
		let mut fs = fresh();
		fs.mkdir("/sub", 0o755).unwrap();
		let names: Vec<_> = fs.readdir("/").unwrap().into_iter().map(|e| e.name).collect();
		assert!(names.contains(&"sub".to_owned()));
	}

	#[test]
	fn nested_path_resolves() {
		let mut fs = fresh();
		fs.mkdir("/a", 0o755).unwrap();
		fs.mkdir("/a/b", 0o755).unwrap();
		let attr = fs.getattr("/a/b").unwrap();
		assert!(attr.mode & 0o040000 != 0);
	}

	#[test]
	fn duplicate_mkdir_is_rejected() {
		let mut fs = fresh();
		fs.mkdir("/a", 0o755).unwrap();
		let blocks_before = allocated_data_blocks(&mut fs);
		assert!(matches!(fs.mkdir("/a", 0o755), Err(Error::AlreadyExists)));
		// The rejected mkdir must not leak the data block(s) it allocated for
		// the discarded directory's own "." / ".." entries.
		assert_eq!(allocated_data_blocks(&mut fs), blocks_before);
	}

	#[test]
	fn create_write_read_round_trips() {
		let mut fs = fresh();
		fs.create_file("/hello", 0o644).unwrap();
		let n = fs.write("/hello", 0, b"hello world").unwrap();
		assert_eq!(n, 11);
		let back = fs.read("/hello", 0, 11).unwrap();
		assert_eq!(back, b"hello world");
	}

	#[test]
	fn write_past_eof_extends_size() {
		let mut fs = fresh();
		fs.create_file("/f", 0o644).unwrap();
		fs.write("/f", 10, b"xyz").unwrap();
		let attr = fs.getattr("/f").unwrap();
		assert_eq!(attr.size, 13);
		let back = fs.read("/f", 0, 13).unwrap();
		assert_eq!(&back[0..10], &[0u8; 10]);
		assert_eq!(&back[10..13], b"xyz");
	}

	#[test]
	fn write_beyond_max_file_size_is_rejected() {
		let mut fs = fresh();
		fs.create_file("/big", 0o644).unwrap();
		assert!(matches!(
			fs.write("/big", MAX_FILE_SIZE, b"x"),
			Err(Error::NoSpace)
		));
	}

	#[test]
	fn truncate_shrinks_and_frees_blocks() {
		let mut fs = fresh();
		fs.create_file("/f", 0o644).unwrap();
		fs.write("/f", 0, &[1u8; BLOCK_SIZE * 2]).unwrap();
		fs.truncate("/f", 10).unwrap();
		let attr = fs.getattr("/f").unwrap();
		assert_eq!(attr.size, 10);
	}

	#[test]
	fn truncate_grow_eagerly_allocates_and_zeroes_new_blocks() {
		let mut fs = fresh();
		fs.create_file("/f", 0o644).unwrap();
		fs.truncate("/f", (BLOCK_SIZE * 2) as u64).unwrap();

		let attr = fs.getattr("/f").unwrap();
		assert_eq!(attr.size, (BLOCK_SIZE * 2) as u64);
		assert_eq!(attr.blocks, 2);

		let data = fs.read("/f", 0, (BLOCK_SIZE * 2) as u32).unwrap();
		assert_eq!(data, vec![0u8; BLOCK_SIZE * 2]);
	}

	#[test]
	fn unlink_removes_entry_and_frees_inode() {
		let mut fs = fresh();
		fs.create_file("/f", 0o644).unwrap();
		fs.unlink("/f").unwrap();
		assert!(matches!(fs.getattr("/f"), Err(Error::NotFound)));
		assert!(!fs.readdir("/").unwrap().iter().any(|e| e.name == "f"));
	}

	#[test]
	fn rmdir_rejects_nonempty_directory() {
		let mut fs = fresh();
		fs.mkdir("/a", 0o755).unwrap();
		fs.create_file("/a/f", 0o644).unwrap();
		assert!(matches!(fs.rmdir("/a"), Err(Error::NotEmpty)));
	}

	#[test]
	fn rmdir_succeeds_once_empty() {
		let mut fs = fresh();
		fs.mkdir("/a", 0o755).unwrap();
		fs.rmdir("/a").unwrap();
		assert!(!fs.readdir("/").unwrap().iter().any(|e| e.name == "a"));
	}

	#[test]
	fn reopen_after_flush_preserves_tree() {
		let tmp = NamedTempFile::new().unwrap();
		{
			let mut fs = Filesystem::create(tmp.path().to_owned()).unwrap();
			fs.mkdir("/persisted", 0o755).unwrap();
			fs.flush().unwrap();
		}
		let mut fs = Filesystem::open(tmp.path().to_owned()).unwrap();
		assert!(fs.readdir("/").unwrap().iter().any(|e| e.name == "persisted"));
	}
}
