//! The block device: fixed-size block I/O against a single host file.
//!
//! Everything above this layer addresses the diskfile in units of
//! [`BLOCK_SIZE`] bytes; nothing else touches `std::fs::File` directly.

use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// The size, in bytes, of a single block. All persistent I/O is block-aligned.
pub const BLOCK_SIZE: usize = 4096;

/// A fixed-size block device backed by one host file.
pub struct BlockDevice {
	file: File,
}

impl BlockDevice {
	/// Creates (truncating any existing file) the diskfile at `path` and
	/// pre-sizes it to hold `block_count` blocks.
	pub fn init<P: AsRef<Path>>(path: P, block_count: u64) -> Result<Self> {
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(true)
			.open(path)?;
		file.set_len(block_count * BLOCK_SIZE as u64)?;
		Ok(Self { file })
	}

	/// Opens an existing diskfile at `path` without altering its contents.
	pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
		let file = OpenOptions::new().read(true).write(true).open(path)?;
		Ok(Self { file })
	}

	/// Reads block `block_no` into `buf`, which must be exactly [`BLOCK_SIZE`] bytes.
	///
	/// Reading past the end of the backing file (e.g. a block that was
	/// never written within the preallocated region) yields a zeroed block.
	pub fn bio_read(&mut self, block_no: u64, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
		self.file.seek(SeekFrom::Start(block_no * BLOCK_SIZE as u64))?;
		buf.fill(0);
		match self.file.read_exact(buf) {
			Ok(()) => Ok(()),
			// A short read past EOF: whatever was read is real, the rest is
			// implicitly zero because the file was preallocated sparse.
			Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(()),
			Err(e) => Err(Error::Io(e)),
		}
	}

	/// Writes `buf` (exactly [`BLOCK_SIZE`] bytes) to block `block_no`.
	pub fn bio_write(&mut self, block_no: u64, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
		self.file.seek(SeekFrom::Start(block_no * BLOCK_SIZE as u64))?;
		self.file.write_all(buf)?;
		Ok(())
	}

	/// Flushes any buffered writes to the host file system.
	pub fn flush(&mut self) -> Result<()> {
		self.file.flush()?;
		Ok(())
	}
}
