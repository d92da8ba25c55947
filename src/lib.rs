//! A small, self-contained block-structured filesystem stored inside a
//! single host file.
//!
//! All metadata — superblock, directory entries, file inodes, free-list
//! pages — and all file data live in fixed-size blocks of a backing store.
//! [`Mount`] is the handle returned by [`Mount::format`]/[`Mount::open`];
//! every other operation (`write_file`, `read_file`, `unlink`, `mkdir`,
//! `rmdir`, `list_dir`, `get_block`, `put_block`) is a method on it.
//!
//! The backing store is anything implementing [`BlockDevice`]: a host file
//! via [`FileDevice`], or an in-memory buffer via [`MemDevice`] for tests.
//! There is no journaling, no block cache, and no concurrent mutators
//! within a single mount — see `SPEC_FULL.md` for the full non-goal list.

mod device;
mod dir;
mod error;
mod file;
mod inode;
mod layout;
mod mount;
mod path;

pub use device::{BlockDevice, FileDevice, MemDevice};
pub use error::{Error, Result};
pub use layout::{MIN_BLOCK_COUNT, MIN_BLOCK_SIZE};
pub use mount::Mount;

#[cfg(test)]
mod tests {
	use super::*;

	fn mem_mount(blocks: u64, blksz: u64) -> Mount<MemDevice> {
		let dev = MemDevice::new(blocks * blksz);
		Mount::format(dev, blksz).expect("format")
	}

	#[test]
	fn format_then_reopen_layout() {
		let blksz = 4096;
		let blocks = 1024;
		let m = mem_mount(blocks, blksz);
		assert_eq!(m.total_blocks(), blocks);
		assert_eq!(m.free_blocks(), blocks - 3);
	}

	#[test]
	fn root_starts_empty() {
		let mut m = mem_mount(1024, 4096);
		assert_eq!(m.list_dir("/").unwrap(), "");
	}

	#[test]
	fn mkdir_and_list() {
		let mut m = mem_mount(1024, 4096);
		m.mkdir("/a").unwrap();
		m.mkdir("/a/b").unwrap();
		assert_eq!(m.list_dir("/").unwrap(), "a/");
		assert_eq!(m.list_dir("/a").unwrap(), "b/");
	}

	#[test]
	fn mkdir_existing_fails() {
		let mut m = mem_mount(1024, 4096);
		m.mkdir("/a").unwrap();
		assert!(matches!(m.mkdir("/a"), Err(Error::Exists)));
	}

	#[test]
	fn mkdir_missing_parent_fails() {
		let mut m = mem_mount(1024, 4096);
		assert!(matches!(m.mkdir("/a/b"), Err(Error::NotFound)));
	}

	#[test]
	fn write_then_read_small_file() {
		let mut m = mem_mount(1024, 4096);
		m.mkdir("/a").unwrap();
		m.write_file("/a/hello", b"hello world").unwrap();
		let buf = m.read_file("/a/hello", 64).unwrap();
		assert_eq!(&buf, b"hello world");
	}

	#[test]
	fn empty_write_creates_empty_file() {
		let mut m = mem_mount(1024, 4096);
		let free_before = m.free_blocks();
		m.write_file("/empty", b"").unwrap();
		let buf = m.read_file("/empty", 64).unwrap();
		assert!(buf.is_empty());
		// head inode + nodeinfo consumed, no data blocks.
		assert_eq!(m.free_blocks(), free_before - 2);
	}

	#[test]
	fn unlink_restores_free_count() {
		let mut m = mem_mount(1024, 4096);
		let free_before = m.free_blocks();
		m.write_file("/big", &vec![0u8; 10_000]).unwrap();
		m.unlink("/big").unwrap();
		assert_eq!(m.free_blocks(), free_before);
	}

	#[test]
	fn rmdir_requires_empty() {
		let mut m = mem_mount(1024, 4096);
		m.mkdir("/a").unwrap();
		m.write_file("/a/hello", b"x").unwrap();
		assert!(matches!(m.rmdir("/a"), Err(Error::NotEmpty)));
		m.unlink("/a/hello").unwrap();
		m.rmdir("/a").unwrap();
	}

	#[test]
	fn rmdir_root_is_not_empty_once_populated() {
		let mut m = mem_mount(1024, 4096);
		m.mkdir("/a").unwrap();
		assert!(matches!(m.rmdir("/"), Err(Error::NotEmpty)));
	}

	#[test]
	fn read_directory_fails() {
		let mut m = mem_mount(1024, 4096);
		m.mkdir("/a").unwrap();
		assert!(matches!(m.read_file("/a", 64), Err(Error::IsDirectory)));
	}

	#[test]
	fn rmdir_non_directory_fails() {
		let mut m = mem_mount(1024, 4096);
		m.write_file("/a", b"x").unwrap();
		assert!(matches!(m.rmdir("/a"), Err(Error::NotDirectory)));
	}

	#[test]
	fn overwriting_existing_file_replaces_content() {
		let mut m = mem_mount(1024, 4096);
		m.write_file("/a", b"first").unwrap();
		m.write_file("/a", b"second content").unwrap();
		let buf = m.read_file("/a", 64).unwrap();
		assert_eq!(&buf, b"second content");
	}

	#[test]
	fn format_rejects_too_small_block_size() {
		let dev = MemDevice::new(4096 * 16);
		assert!(matches!(
			Mount::format(dev, 8),
			Err(Error::InvalidArgument)
		));
	}

	#[test]
	fn format_rejects_too_small_image() {
		let dev = MemDevice::new(MIN_BLOCK_SIZE * 2);
		assert!(matches!(
			Mount::format(dev, MIN_BLOCK_SIZE),
			Err(Error::NoSpace)
		));
	}

	#[test]
	fn exhausting_freelist_fails_write_without_mutating() {
		// A tiny image: superblock, root inode, root nodeinfo and a single
		// free block — just enough to format, not enough for any file.
		let dev = MemDevice::new(MIN_BLOCK_SIZE * 5);
		let mut m = Mount::format(dev, MIN_BLOCK_SIZE).unwrap();
		let free_before = m.free_blocks();
		let big = vec![0u8; MIN_BLOCK_SIZE as usize * 8];
		assert!(matches!(m.write_file("/big", &big), Err(Error::NoSpace)));
		assert_eq!(m.free_blocks(), free_before);
		assert_eq!(m.list_dir("/").unwrap(), "");
	}

	#[test]
	fn second_open_on_same_file_is_busy() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("image");
		std::fs::write(&path, vec![0u8; 4096 * 64]).unwrap();

		let dev = FileDevice::open(&path).unwrap();
		let mount = Mount::format(dev, 4096).unwrap();

		let dev2 = FileDevice::open(&path).unwrap();
		assert!(matches!(Mount::open(dev2), Err(Error::Busy)));

		mount.close().unwrap();
		let dev3 = FileDevice::open(&path).unwrap();
		Mount::open(dev3).unwrap().close().unwrap();
	}

	#[test]
	fn overflow_chain_round_trips() {
		// link_max for 512-byte blocks: (512-32)/8 = 60.
		let blksz = 512u64;
		let link_max = 60usize;
		let mut m = mem_mount(4096, blksz);
		let data: Vec<u8> = (0..(link_max as u64 * 3 + 1) * blksz)
			.map(|i| (i % 251) as u8)
			.collect();
		m.write_file("/big", &data).unwrap();
		let back = m.read_file("/big", data.len()).unwrap();
		assert_eq!(back, data);
	}

	#[test]
	fn write_exactly_link_max_uses_no_overflow() {
		let blksz = 512u64;
		let link_max = 60usize;
		let mut m = mem_mount(4096, blksz);
		let data = vec![7u8; link_max * blksz as usize];
		let free_before = m.free_blocks();
		m.write_file("/f", &data).unwrap();
		// head inode + nodeinfo + exactly link_max data blocks, no overflow inode.
		assert_eq!(free_before - m.free_blocks(), 2 + link_max as u64);
		let back = m.read_file("/f", data.len()).unwrap();
		assert_eq!(back, data);
	}
}
