//! The mount handle and the superblock/freelist allocator.
//!
//! The mount is not process-global state: it is an explicit handle
//! threaded through every operation, the same way a disk or partition
//! handle gets threaded through a tool's call graph instead of living
//! in static mutables.

use log::debug;
use log::trace;

use crate::device::BlockDevice;
use crate::error::Error;
use crate::error::Result;
use crate::layout::FIRST_FREE_BLOCK;
use crate::layout::Freepage;
use crate::layout::Inode;
use crate::layout::MAGIC;
use crate::layout::MIN_BLOCK_COUNT;
use crate::layout::MIN_BLOCK_SIZE;
use crate::layout::Mode;
use crate::layout::Nodeinfo;
use crate::layout::ROOT_BLOCK;
use crate::layout::ROOT_NODEINFO_BLOCK;
use crate::layout::Superblock;

/// A live handle onto an opened image: the backing device, the lock it
/// holds, and an in-memory copy of the superblock kept in sync with disk.
pub struct Mount<D: BlockDevice> {
	pub(crate) device: D,
	pub(crate) sb: Superblock,
}

impl<D: BlockDevice> Mount<D> {
	/// Block size of the mounted image.
	pub fn block_size(&self) -> u64 {
		self.sb.blksz
	}

	/// Number of blocks currently on the freelist.
	pub fn free_blocks(&self) -> u64 {
		self.sb.freeblks
	}

	/// Total number of blocks in the image.
	pub fn total_blocks(&self) -> u64 {
		self.sb.blks
	}

	/// Creates a fresh image over an existing, already-sized backing device.
	pub fn format(mut device: D, blksz: u64) -> Result<Self> {
		if blksz < MIN_BLOCK_SIZE {
			return Err(Error::InvalidArgument);
		}
		device.lock_exclusive()?;
		match Self::format_locked(&mut device, blksz) {
			Ok(sb) => {
				debug!("formatted image: blks={} blksz={}", sb.blks, blksz);
				Ok(Self { device, sb })
			}
			Err(e) => {
				let _ = device.unlock();
				Err(e)
			}
		}
	}

	fn format_locked(device: &mut D, blksz: u64) -> Result<Superblock> {
		let size = device.size_in_bytes()?;
		let blks = size / blksz;
		if blks < MIN_BLOCK_COUNT {
			return Err(Error::NoSpace);
		}

		let sb = Superblock {
			magic: MAGIC,
			blksz,
			blks,
			freeblks: blks - FIRST_FREE_BLOCK,
			freelist: FIRST_FREE_BLOCK,
			root: ROOT_BLOCK,
		};
		let mut buf = vec![0u8; blksz as usize];
		sb.encode(&mut buf);
		device.write_block(0, &buf)?;

		let root_inode = Inode::new_empty(Mode::Dir, ROOT_BLOCK, ROOT_NODEINFO_BLOCK, blksz);
		root_inode.encode(&mut buf);
		device.write_block(ROOT_BLOCK, &buf)?;

		let root_info = Nodeinfo {
			size: 0,
			name: "/".to_owned(),
		};
		root_info.encode(&mut buf, blksz);
		device.write_block(ROOT_NODEINFO_BLOCK, &buf)?;

		for i in FIRST_FREE_BLOCK..blks {
			let next = if i + 1 == blks { 0 } else { i + 1 };
			let page = Freepage { next };
			page.encode(&mut buf);
			device.write_block(i, &buf)?;
		}

		Ok(sb)
	}

	/// Mounts an existing image, acquiring the exclusive advisory lock.
	pub fn open(mut device: D) -> Result<Self> {
		device.lock_exclusive()?;
		match Self::open_locked(&mut device) {
			Ok(sb) => Ok(Self { device, sb }),
			Err(e) => {
				let _ = device.unlock();
				Err(e)
			}
		}
	}

	fn open_locked(device: &mut D) -> Result<Superblock> {
		// The superblock's own size is fixed regardless of `blksz`; the
		// smallest legal block size is always large enough to hold it.
		let mut buf = vec![0u8; MIN_BLOCK_SIZE as usize];
		device.read_block(0, &mut buf)?;
		let sb = Superblock::decode(&buf);
		if sb.magic != MAGIC {
			return Err(Error::BadImage);
		}
		Ok(sb)
	}

	/// Unmounts the image, releasing the lock.
	pub fn close(mut self) -> Result<()> {
		if self.sb.magic != MAGIC {
			return Err(Error::BadImage);
		}
		self.device.unlock()
	}

	/// Pops the head of the freelist. Returns `0` if the freelist is empty —
	/// the caller decides whether that is an error.
	pub fn get_block(&mut self) -> Result<u64> {
		if self.sb.freeblks == 0 {
			return Ok(0);
		}
		let page = self.read_freepage(self.sb.freelist)?;
		let ret = self.sb.freelist;
		self.sb.freelist = page.next;
		self.sb.freeblks -= 1;
		self.persist_superblock()?;
		trace!("get_block -> {ret} ({} left)", self.sb.freeblks);
		Ok(ret)
	}

	/// Pushes `b` back onto the freelist. Not idempotent: releasing an
	/// already-free block corrupts the freelist.
	pub fn put_block(&mut self, b: u64) -> Result<()> {
		let page = Freepage {
			next: self.sb.freelist,
		};
		self.write_freepage(b, &page)?;
		self.sb.freelist = b;
		self.sb.freeblks += 1;
		self.persist_superblock()?;
		trace!("put_block({b}) ({} free)", self.sb.freeblks);
		Ok(())
	}

	fn persist_superblock(&mut self) -> Result<()> {
		let mut buf = vec![0u8; self.sb.blksz as usize];
		self.sb.encode(&mut buf);
		self.device.write_block(0, &buf)
	}

	pub(crate) fn read_freepage(&mut self, block: u64) -> Result<Freepage> {
		let mut buf = vec![0u8; self.sb.blksz as usize];
		self.device.read_block(block, &mut buf)?;
		Ok(Freepage::decode(&buf))
	}

	fn write_freepage(&mut self, block: u64, page: &Freepage) -> Result<()> {
		let mut buf = vec![0u8; self.sb.blksz as usize];
		page.encode(&mut buf);
		self.device.write_block(block, &buf)
	}

	pub(crate) fn read_inode(&mut self, block: u64) -> Result<Inode> {
		let mut buf = vec![0u8; self.sb.blksz as usize];
		self.device.read_block(block, &mut buf)?;
		Inode::decode(&buf, self.sb.blksz)
	}

	pub(crate) fn write_inode(&mut self, block: u64, inode: &Inode) -> Result<()> {
		let mut buf = vec![0u8; self.sb.blksz as usize];
		inode.encode(&mut buf);
		self.device.write_block(block, &buf)
	}

	pub(crate) fn read_nodeinfo(&mut self, block: u64) -> Result<Nodeinfo> {
		let mut buf = vec![0u8; self.sb.blksz as usize];
		self.device.read_block(block, &mut buf)?;
		Ok(Nodeinfo::decode(&buf, self.sb.blksz))
	}

	pub(crate) fn write_nodeinfo(&mut self, block: u64, info: &Nodeinfo) -> Result<()> {
		let mut buf = vec![0u8; self.sb.blksz as usize];
		info.encode(&mut buf, self.sb.blksz);
		self.device.write_block(block, &buf)
	}

	pub(crate) fn read_data_block(&mut self, block: u64, out: &mut [u8]) -> Result<()> {
		self.device.read_block(block, out)
	}

	pub(crate) fn write_data_block(&mut self, block: u64, data: &[u8]) -> Result<()> {
		self.device.write_block(block, data)
	}

	/// Number of 64-bit link slots per inode for this image.
	pub(crate) fn link_max(&self) -> usize {
		crate::layout::link_max(self.sb.blksz)
	}
}
