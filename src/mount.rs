//! The FUSE adapter: translates `fuser`'s inode-number protocol into calls
//! against the path-based [`crate::fs_ops::Filesystem`] façade.
//!
//! `fuser` identifies files by a 64-bit inode number it expects to stay
//! stable for the file's lifetime; `rufs`'s own inode numbers (`u16`, 0 is
//! the root) already satisfy that, so the adapter's FUSE ino is simply
//! `rufs_ino + 1` (FUSE reserves 1 for the root). The adapter keeps a small
//! path cache so it can turn an ino back into the path string the façade's
//! operations expect.

use crate::fs_ops::Filesystem;
use crate::inode::Vstat;
use fuser::{
	FileAttr, FileType, Filesystem as FuseFilesystem, ReplyAttr, ReplyCreate, ReplyData,
	ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyWrite, Request, TimeOrNow, FUSE_ROOT_ID,
};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Attribute cache duration handed back to the kernel on every reply. Short
/// enough that external changes to the diskfile become visible quickly.
const ATTR_TTL: Duration = Duration::from_secs(1);

/// Adapts a [`Filesystem`] to `fuser`'s `Filesystem` trait.
pub struct RufsAdapter {
	fs: Filesystem,
	paths: HashMap<u64, String>,
}

impl RufsAdapter {
	pub fn new(fs: Filesystem) -> Self {
		let mut paths = HashMap::new();
		paths.insert(FUSE_ROOT_ID, "/".to_owned());
		Self { fs, paths }
	}

	fn path_of(&self, ino: u64) -> Option<&str> {
		self.paths.get(&ino).map(String::as_str)
	}

	fn remember(&mut self, path: String, vstat: &Vstat) -> u64 {
		let ino = vstat.ino + 1;
		self.paths.insert(ino, path);
		ino
	}

	fn child_path(parent: &str, name: &str) -> String {
		if parent == "/" {
			format!("/{name}")
		} else {
			format!("{parent}/{name}")
		}
	}
}

fn to_file_attr(ino: u64, vstat: &Vstat) -> FileAttr {
	let kind = if vstat.mode & 0o040000 != 0 {
		FileType::Directory
	} else {
		FileType::RegularFile
	};
	let mtime = UNIX_EPOCH + Duration::from_secs(vstat.mtime.max(0) as u64);
	FileAttr {
		ino,
		size: vstat.size,
		blocks: vstat.blocks,
		atime: mtime,
		mtime,
		ctime: mtime,
		crtime: mtime,
		kind,
		perm: (vstat.mode & 0o7777) as u16,
		nlink: vstat.nlink,
		uid: unsafe { libc::getuid() },
		gid: unsafe { libc::getgid() },
		rdev: 0,
		blksize: vstat.blksize as u32,
		flags: 0,
	}
}

impl FuseFilesystem for RufsAdapter {
	fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
		let Some(parent_path) = self.path_of(parent).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		let Some(name) = name.to_str() else {
			reply.error(libc::EINVAL);
			return;
		};
		let child = Self::child_path(&parent_path, name);
		match self.fs.getattr(&child) {
			Ok(vstat) => {
				let ino = self.remember(child, &vstat);
				reply.entry(&ATTR_TTL, &to_file_attr(ino, &vstat), 0);
			}
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
		let Some(path) = self.path_of(ino).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		match self.fs.getattr(&path) {
			Ok(vstat) => reply.attr(&ATTR_TTL, &to_file_attr(ino, &vstat)),
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn setattr(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		_mode: Option<u32>,
		_uid: Option<u32>,
		_gid: Option<u32>,
		size: Option<u64>,
		_atime: Option<TimeOrNow>,
		mtime: Option<TimeOrNow>,
		_ctime: Option<SystemTime>,
		_fh: Option<u64>,
		_crtime: Option<SystemTime>,
		_chgtime: Option<SystemTime>,
		_bkuptime: Option<SystemTime>,
		_flags: Option<u32>,
		reply: ReplyAttr,
	) {
		let Some(path) = self.path_of(ino).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		if let Some(size) = size {
			if let Err(e) = self.fs.truncate(&path, size) {
				reply.error(-e.to_errno());
				return;
			}
		}
		if let Some(t) = mtime {
			let secs = match t {
				TimeOrNow::SpecificTime(t) => t
					.duration_since(UNIX_EPOCH)
					.map(|d| d.as_secs() as i64)
					.unwrap_or(0),
				TimeOrNow::Now => crate::util::get_timestamp().as_secs() as i64,
			};
			if let Err(e) = self.fs.utimens(&path, secs) {
				reply.error(-e.to_errno());
				return;
			}
		}
		match self.fs.getattr(&path) {
			Ok(vstat) => reply.attr(&ATTR_TTL, &to_file_attr(ino, &vstat)),
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: fuser::ReplyOpen) {
		let Some(path) = self.path_of(ino).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		match self.fs.opendir(&path) {
			Ok(()) => reply.opened(0, 0),
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn readdir(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		_fh: u64,
		offset: i64,
		mut reply: ReplyDirectory,
	) {
		let Some(path) = self.path_of(ino).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		let entries = match self.fs.readdir(&path) {
			Ok(e) => e,
			Err(e) => {
				reply.error(-e.to_errno());
				return;
			}
		};
		for (i, entry) in entries.into_iter().enumerate().skip(offset as usize) {
			let child_path = Self::child_path(&path, &entry.name);
			let kind = match self.fs.getattr(&child_path) {
				Ok(v) if v.mode & 0o040000 != 0 => FileType::Directory,
				Ok(_) => FileType::RegularFile,
				Err(_) => FileType::RegularFile,
			};
			let fuse_ino = entry.ino as u64 + 1;
			self.paths.entry(fuse_ino).or_insert(child_path);
			if reply.add(fuse_ino, (i + 1) as i64, kind, &entry.name) {
				break;
			}
		}
		reply.ok();
	}

	fn mkdir(
		&mut self,
		_req: &Request<'_>,
		parent: u64,
		name: &OsStr,
		mode: u32,
		_umask: u32,
		reply: ReplyEntry,
	) {
		let Some(parent_path) = self.path_of(parent).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		let Some(name) = name.to_str() else {
			reply.error(libc::EINVAL);
			return;
		};
		let child = Self::child_path(&parent_path, name);
		match self.fs.mkdir(&child, mode) {
			Ok(vstat) => {
				let ino = self.remember(child, &vstat);
				reply.entry(&ATTR_TTL, &to_file_attr(ino, &vstat), 0);
			}
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
		let Some(parent_path) = self.path_of(parent).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		let Some(name) = name.to_str() else {
			reply.error(libc::EINVAL);
			return;
		};
		let child = Self::child_path(&parent_path, name);
		match self.fs.rmdir(&child) {
			Ok(()) => {
				self.paths.retain(|_, p| p != &child);
				reply.ok();
			}
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn create(
		&mut self,
		_req: &Request<'_>,
		parent: u64,
		name: &OsStr,
		mode: u32,
		_umask: u32,
		_flags: i32,
		reply: ReplyCreate,
	) {
		let Some(parent_path) = self.path_of(parent).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		let Some(name) = name.to_str() else {
			reply.error(libc::EINVAL);
			return;
		};
		let child = Self::child_path(&parent_path, name);
		match self.fs.create_file(&child, mode) {
			Ok(vstat) => {
				let ino = self.remember(child, &vstat);
				reply.created(&ATTR_TTL, &to_file_attr(ino, &vstat), 0, 0, 0);
			}
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: fuser::ReplyOpen) {
		let Some(path) = self.path_of(ino).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		match self.fs.open_file(&path) {
			Ok(_) => reply.opened(0, 0),
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn read(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		_fh: u64,
		offset: i64,
		size: u32,
		_flags: i32,
		_lock_owner: Option<u64>,
		reply: ReplyData,
	) {
		let Some(path) = self.path_of(ino).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		match self.fs.read(&path, offset.max(0) as u64, size) {
			Ok(data) => reply.data(&data),
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn write(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		_fh: u64,
		offset: i64,
		data: &[u8],
		_write_flags: u32,
		_flags: i32,
		_lock_owner: Option<u64>,
		reply: ReplyWrite,
	) {
		let Some(path) = self.path_of(ino).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		match self.fs.write(&path, offset.max(0) as u64, data) {
			Ok(n) => reply.written(n),
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
		let Some(parent_path) = self.path_of(parent).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		let Some(name) = name.to_str() else {
			reply.error(libc::EINVAL);
			return;
		};
		let child = Self::child_path(&parent_path, name);
		match self.fs.unlink(&child) {
			Ok(()) => {
				self.paths.retain(|_, p| p != &child);
				reply.ok();
			}
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn release(
		&mut self,
		_req: &Request<'_>,
		_ino: u64,
		_fh: u64,
		_flags: i32,
		_lock_owner: Option<u64>,
		_flush: bool,
		reply: ReplyEmpty,
	) {
		reply.ok();
	}

	fn releasedir(
		&mut self,
		_req: &Request<'_>,
		_ino: u64,
		_fh: u64,
		_flags: i32,
		reply: ReplyEmpty,
	) {
		reply.ok();
	}

	fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
		match self.fs.flush() {
			Ok(()) => reply.ok(),
			Err(e) => reply.error(-e.to_errno()),
		}
	}
}
