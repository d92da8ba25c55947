//! Error taxonomy for the filesystem engine.

use std::fmt;
use std::io;

/// An error produced by a filesystem operation.
#[derive(Debug)]
pub enum Error {
	/// `blksz` was smaller than [`crate::MIN_BLOCK_SIZE`] at format time.
	InvalidArgument,
	/// Not enough free blocks for the operation, or the image has fewer than
	/// [`crate::MIN_BLOCK_COUNT`] blocks at format time.
	NoSpace,
	/// The mount lock is held by another holder.
	Busy,
	/// The superblock magic did not match on open/close.
	BadImage,
	/// A path component could not be resolved.
	NotFound,
	/// The target of `mkdir`, or a fresh `write_file`, already exists.
	Exists,
	/// `read_file`/`unlink` was called on a directory.
	IsDirectory,
	/// `rmdir`/`list_dir` was called on something that is not a directory.
	NotDirectory,
	/// `rmdir` was called on a directory that still has entries.
	NotEmpty,
	/// A backing-store read/write failed or returned fewer bytes than requested,
	/// or an overflow chain ended before the logical end of a file.
	Io(io::Error),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::InvalidArgument => write!(f, "invalid argument"),
			Self::NoSpace => write!(f, "no space left on device"),
			Self::Busy => write!(f, "device or resource busy"),
			Self::BadImage => write!(f, "not a valid filesystem image"),
			Self::NotFound => write!(f, "no such file or directory"),
			Self::Exists => write!(f, "file exists"),
			Self::IsDirectory => write!(f, "is a directory"),
			Self::NotDirectory => write!(f, "not a directory"),
			Self::NotEmpty => write!(f, "directory not empty"),
			Self::Io(e) => write!(f, "i/o error: {e}"),
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

/// Shorthand result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
