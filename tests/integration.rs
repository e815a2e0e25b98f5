//! End-to-end exercises against a tempfile-backed diskfile, driving the
//! façade directly without mounting FUSE.

use rufs_core::fs_ops::Filesystem;
use rufs_core::Error;
use tempfile::NamedTempFile;

fn fresh_image() -> NamedTempFile {
	let tmp = NamedTempFile::new().unwrap();
	rufs_core::mkfs::format(tmp.path()).unwrap();
	tmp
}

#[test]
fn fresh_mount_exposes_a_valid_root() {
	let tmp = fresh_image();
	let mut fs = Filesystem::open(tmp.path()).unwrap();
	let attr = fs.getattr("/").unwrap();
	assert!(attr.mode & 0o040000 != 0);
}

#[test]
fn root_listing_contains_only_dot_and_dotdot() {
	let tmp = fresh_image();
	let mut fs = Filesystem::open(tmp.path()).unwrap();
	let mut names: Vec<_> = fs.readdir("/").unwrap().into_iter().map(|e| e.name).collect();
	names.sort();
	assert_eq!(names, vec![".".to_owned(), "..".to_owned()]);
}

#[test]
fn create_subdir_then_nested_file_resolves() {
	let tmp = fresh_image();
	let mut fs = Filesystem::open(tmp.path()).unwrap();

	fs.mkdir("/docs", 0o755).unwrap();
	fs.create_file("/docs/readme.txt", 0o644).unwrap();
	fs.write("/docs/readme.txt", 0, b"hello").unwrap();

	let data = fs.read("/docs/readme.txt", 0, 5).unwrap();
	assert_eq!(data, b"hello");
}

#[test]
fn deeply_nested_path_resolves() {
	let tmp = fresh_image();
	let mut fs = Filesystem::open(tmp.path()).unwrap();

	fs.mkdir("/a", 0o755).unwrap();
	fs.mkdir("/a/b", 0o755).unwrap();
	fs.mkdir("/a/b/c", 0o755).unwrap();
	fs.create_file("/a/b/c/leaf", 0o644).unwrap();

	let attr = fs.getattr("/a/b/c/leaf").unwrap();
	assert_eq!(attr.size, 0);
}

#[test]
fn duplicate_name_in_same_directory_is_rejected() {
	let tmp = fresh_image();
	let mut fs = Filesystem::open(tmp.path()).unwrap();

	fs.mkdir("/x", 0o755).unwrap();
	assert!(matches!(fs.mkdir("/x", 0o755), Err(Error::AlreadyExists)));

	fs.create_file("/f", 0o644).unwrap();
	assert!(matches!(fs.create_file("/f", 0o644), Err(Error::AlreadyExists)));
}

#[test]
fn tree_survives_unmount_and_remount() {
	let tmp = fresh_image();
	{
		let mut fs = Filesystem::open(tmp.path()).unwrap();
		fs.mkdir("/persisted", 0o755).unwrap();
		fs.create_file("/persisted/data.bin", 0o644).unwrap();
		fs.write("/persisted/data.bin", 0, &[7u8; 100]).unwrap();
		fs.flush().unwrap();
	}
	{
		let mut fs = Filesystem::open(tmp.path()).unwrap();
		let data = fs.read("/persisted/data.bin", 0, 100).unwrap();
		assert_eq!(data, vec![7u8; 100]);
		let names: Vec<_> = fs.readdir("/").unwrap().into_iter().map(|e| e.name).collect();
		assert!(names.contains(&"persisted".to_owned()));
	}
}

#[test]
fn open_or_create_formats_a_missing_diskfile_exactly_once() {
	let tmp = NamedTempFile::new().unwrap();
	let path = tmp.path().to_owned();
	std::fs::remove_file(&path).unwrap();

	let mut fs = Filesystem::open_or_create(&path).unwrap();
	fs.mkdir("/once", 0o755).unwrap();
	fs.flush().unwrap();
	drop(fs);

	// A second open_or_create against the now-valid image must not reformat
	// it, or `/once` would disappear.
	let mut fs = Filesystem::open_or_create(&path).unwrap();
	let names: Vec<_> = fs.readdir("/").unwrap().into_iter().map(|e| e.name).collect();
	assert!(names.contains(&"once".to_owned()));
}

#[test]
fn rmdir_then_unlink_fully_reclaim_the_namespace() {
	let tmp = fresh_image();
	let mut fs = Filesystem::open(tmp.path()).unwrap();

	fs.mkdir("/tmp", 0o755).unwrap();
	fs.create_file("/tmp/scratch", 0o644).unwrap();
	fs.write("/tmp/scratch", 0, b"scratch data").unwrap();
	fs.unlink("/tmp/scratch").unwrap();
	fs.rmdir("/tmp").unwrap();

	assert!(matches!(fs.getattr("/tmp"), Err(Error::NotFound)));
	let names: Vec<_> = fs.readdir("/").unwrap().into_iter().map(|e| e.name).collect();
	assert!(!names.contains(&"tmp".to_owned()));
}
