//! Block I/O: positioned read/write of exactly one block from the backing
//! store, plus the process-wide advisory lock used to guard a mount.
//!
//! [`BlockDevice`] makes the backing store a trait seam instead of
//! hard-wiring [`std::fs::File`] into the engine, so tests can drive the
//! whole filesystem against an in-memory buffer.

use std::fs::File;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::os::fd::AsRawFd;

use crate::error::Error;
use crate::error::Result;

/// A backing store for a mounted image: bulk positioned read/write of
/// exactly one block, a size query, and the exclusive advisory lock taken by
/// `format`/`open` for the lifetime of the mount.
pub trait BlockDevice {
	/// Reads exactly `buf.len()` bytes at byte offset `index * buf.len() as u64`.
	///
	/// A short read is reported as [`Error::Io`].
	fn read_block(&mut self, index: u64, buf: &mut [u8]) -> Result<()>;

	/// Writes exactly `buf.len()` bytes at byte offset `index * buf.len() as u64`.
	///
	/// A short write is reported as [`Error::Io`].
	fn write_block(&mut self, index: u64, buf: &[u8]) -> Result<()>;

	/// Returns the total size of the backing store in bytes.
	fn size_in_bytes(&mut self) -> Result<u64>;

	/// Acquires the mount-exclusive advisory lock, non-blocking. Fails with
	/// [`Error::Busy`] if another holder already has it.
	fn lock_exclusive(&mut self) -> Result<()>;

	/// Releases the lock acquired by [`BlockDevice::lock_exclusive`].
	fn unlock(&mut self) -> Result<()>;
}

/// A [`BlockDevice`] backed by a regular host file, the way the original
/// implementation opens its device with `open()` and locks it with `flock()`.
pub struct FileDevice {
	file: File,
}

impl FileDevice {
	/// Opens `path` for reading and writing, without acquiring the mount lock
	/// — that happens in `format`/`open`.
	pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
		let file = std::fs::OpenOptions::new()
			.read(true)
			.write(true)
			.open(path)?;
		Ok(Self { file })
	}
}

impl BlockDevice for FileDevice {
	fn read_block(&mut self, index: u64, buf: &mut [u8]) -> Result<()> {
		let offset = index
			.checked_mul(buf.len() as u64)
			.ok_or_else(|| Error::Io(io::Error::from(io::ErrorKind::InvalidInput)))?;
		self.file.seek(SeekFrom::Start(offset))?;
		self.file.read_exact(buf)?;
		Ok(())
	}

	fn write_block(&mut self, index: u64, buf: &[u8]) -> Result<()> {
		let offset = index
			.checked_mul(buf.len() as u64)
			.ok_or_else(|| Error::Io(io::Error::from(io::ErrorKind::InvalidInput)))?;
		self.file.seek(SeekFrom::Start(offset))?;
		self.file.write_all(buf)?;
		Ok(())
	}

	fn size_in_bytes(&mut self) -> Result<u64> {
		Ok(self.file.metadata()?.len())
	}

	fn lock_exclusive(&mut self) -> Result<()> {
		let ret = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
		if ret == -1 {
			let err = io::Error::last_os_error();
			return match err.raw_os_error() {
				Some(libc::EWOULDBLOCK) => Err(Error::Busy),
				_ => Err(Error::Io(err)),
			};
		}
		Ok(())
	}

	fn unlock(&mut self) -> Result<()> {
		let ret = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
		if ret == -1 {
			return Err(Error::Io(io::Error::last_os_error()));
		}
		Ok(())
	}
}

/// An in-memory [`BlockDevice`], mainly useful for tests: it has no
/// cross-process lock, just a single in-process flag.
pub struct MemDevice {
	data: Vec<u8>,
	locked: bool,
}

impl MemDevice {
	/// Creates a device of `size` zeroed bytes.
	pub fn new(size: u64) -> Self {
		Self {
			data: vec![0; size as usize],
			locked: false,
		}
	}
}

impl BlockDevice for MemDevice {
	fn read_block(&mut self, index: u64, buf: &mut [u8]) -> Result<()> {
		let start = index as usize * buf.len();
		let end = start + buf.len();
		let slice = self
			.data
			.get(start..end)
			.ok_or_else(|| Error::Io(io::Error::from(io::ErrorKind::UnexpectedEof)))?;
		buf.copy_from_slice(slice);
		Ok(())
	}

	fn write_block(&mut self, index: u64, buf: &[u8]) -> Result<()> {
		let start = index as usize * buf.len();
		let end = start + buf.len();
		let slice = self
			.data
			.get_mut(start..end)
			.ok_or_else(|| Error::Io(io::Error::from(io::ErrorKind::UnexpectedEof)))?;
		slice.copy_from_slice(buf);
		Ok(())
	}

	fn size_in_bytes(&mut self) -> Result<u64> {
		Ok(self.data.len() as u64)
	}

	fn lock_exclusive(&mut self) -> Result<()> {
		if self.locked {
			return Err(Error::Busy);
		}
		self.locked = true;
		Ok(())
	}

	fn unlock(&mut self) -> Result<()> {
		self.locked = false;
		Ok(())
	}
}
