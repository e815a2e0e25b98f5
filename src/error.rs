//! Error taxonomy shared by every layer of the core.
//!
//! Low-level components (`block`, `inode`, `dirent`, `namei`) return
//! [`Result<T>`]; the façade (`fs_ops`) is the only place that turns a
//! variant into a negated POSIX errno for the mount adapter.

use std::fmt;
use std::io;

/// An error produced by the filesystem core.
#[derive(Debug)]
pub enum Error {
	/// A host read/write against the diskfile failed.
	Io(io::Error),
	/// An inode or block index fell outside the declared maxima.
	OutOfRange,
	/// A path component or directory entry does not exist.
	NotFound,
	/// `dir_add` was asked to create a name that is already live in the directory.
	AlreadyExists,
	/// An allocator (inode or data block) or a directory ran out of room.
	NoSpace,
	/// `rmdir` was called on a directory with live entries other than `.`/`..`.
	NotEmpty,
	/// The superblock magic number did not match on mount.
	Corrupt,
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Io(e) => write!(f, "I/O error: {e}"),
			Self::OutOfRange => write!(f, "index out of range"),
			Self::NotFound => write!(f, "no such file or directory"),
			Self::AlreadyExists => write!(f, "file exists"),
			Self::NoSpace => write!(f, "no space left on device"),
			Self::NotEmpty => write!(f, "directory not empty"),
			Self::Corrupt => write!(f, "bad magic number, not a rufs image"),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Self {
		Self::Io(e)
	}
}

impl Error {
	/// Maps the error to the negated `errno` value the mount driver expects.
	pub fn to_errno(&self) -> i32 {
		let e = match self {
			Self::Io(_) => libc::EIO,
			Self::OutOfRange => libc::EIO,
			Self::NotFound => libc::ENOENT,
			Self::AlreadyExists => libc::EEXIST,
			Self::NoSpace => libc::ENOSPC,
			Self::NotEmpty => libc::ENOTEMPTY,
			Self::Corrupt => libc::EIO,
		};
		-e
	}
}

/// Shorthand result type used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;
