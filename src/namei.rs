//! `namei`: path-to-inode resolution.

use crate::block::BlockDevice;
use crate::dirent::dir_find;
use crate::error::{Error, Result};
use crate::inode::{readi, Inode};
use crate::superblock::Superblock;

/// The root directory always lives at inode 0.
pub const ROOT_INO: u16 = 0;

/// Resolves `path` to its inode, walking from `start_ino`.
///
/// `path == ""` is an error. `path == "/"` resolves directly to the root.
/// Otherwise the path is tokenized on `/` (empty components from leading,
/// trailing, or repeated slashes are ignored) and each token is looked up
/// with [`dir_find`] against the previous token's target.
pub fn get_node_by_path(
	dev: &mut BlockDevice,
	sb: &Superblock,
	path: &str,
	start_ino: u16,
) -> Result<Inode> {
	if path.is_empty() {
		return Err(Error::NotFound);
	}
	if path == "/" {
		return readi(dev, sb, ROOT_INO);
	}

	let mut cur = start_ino;
	let mut cur_inode = readi(dev, sb, cur)?;
	for token in path.split('/').filter(|c| !c.is_empty()) {
		let entry = dir_find(dev, &cur_inode, token)?;
		cur = entry.ino;
		cur_inode = readi(dev, sb, cur)?;
	}
	Ok(cur_inode)
}

/// Splits `path` into its parent path and leaf (basename) components, the
/// way the original's `dirname()`/`basename()` pair does.
///
/// `"/foo/bar"` splits into `("/foo", "bar")`; `"/foo"` splits into
/// `("/", "foo")`.
pub fn split_parent(path: &str) -> Option<(String, String)> {
	let trimmed = path.strip_suffix('/').unwrap_or(path);
	if trimmed.is_empty() {
		return None;
	}
	let pos = trimmed.rfind('/')?;
	let leaf = trimmed[pos + 1..].to_owned();
	if leaf.is_empty() {
		return None;
	}
	let parent = if pos == 0 {
		"/".to_owned()
	} else {
		trimmed[..pos].to_owned()
	};
	Some((parent, leaf))
}
