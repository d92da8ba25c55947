//! The inode engine: head inodes, their overflow chains, and the four
//! primitives every higher-level operation is built from.

use log::trace;

use crate::device::BlockDevice;
use crate::error::Error;
use crate::error::Result;
use crate::layout::Inode;
use crate::layout::Mode;
use crate::mount::Mount;

impl<D: BlockDevice> Mount<D> {
	/// Scans the `links[]` arrays across the overflow chain rooted at
	/// `head_block` for `needle`. Returns the carrier block and slot index of
	/// the first match, or the tail carrier with `None` if `needle` is not
	/// present — used with `needle = 0` to find a free slot, and with
	/// `needle = child_block` to find a back reference for removal.
	pub(crate) fn find_link(&mut self, head_block: u64, needle: u64) -> Result<(u64, Option<usize>)> {
		let mut carrier = head_block;
		loop {
			let inode = self.read_inode(carrier)?;
			if let Some(slot) = inode.links.iter().position(|&l| l == needle) {
				return Ok((carrier, Some(slot)));
			}
			if inode.next == 0 {
				return Ok((carrier, None));
			}
			carrier = inode.next;
		}
	}

	/// Allocates one block, initializes it as an `IMCHILD` continuation of
	/// `head_block` chained after `tail_block`, and links it in.
	pub(crate) fn create_child(&mut self, tail_block: u64, head_block: u64) -> Result<u64> {
		let new_block = self.get_block()?;
		if new_block == 0 {
			return Err(Error::NoSpace);
		}
		let child = Inode::new_empty(Mode::Child, head_block, tail_block, self.sb.blksz);
		self.write_inode(new_block, &child)?;

		let mut tail = self.read_inode(tail_block)?;
		tail.next = new_block;
		self.write_inode(tail_block, &tail)?;

		trace!("create_child: {tail_block} -> {new_block} (head {head_block})");
		Ok(new_block)
	}

	/// Resolves the block of the head inode owning `carrier` — itself if
	/// `carrier` is already a head, otherwise its `parent` back pointer,
	/// which already names the owning head directly for an `IMCHILD`.
	pub(crate) fn head_of(&mut self, carrier: u64) -> Result<u64> {
		let inode = self.read_inode(carrier)?;
		if inode.is_head() {
			Ok(carrier)
		} else {
			Ok(inode.parent)
		}
	}

	/// Sets `carrier.links[slot] := target` and increments the owning head's
	/// `nodeinfo.size`.
	pub(crate) fn add_link(&mut self, carrier: u64, slot: usize, target: u64) -> Result<()> {
		let mut inode = self.read_inode(carrier)?;
		inode.links[slot] = target;
		self.write_inode(carrier, &inode)?;

		let head_block = self.head_of(carrier)?;
		let head = self.read_inode(head_block)?;
		let mut info = self.read_nodeinfo(head.meta)?;
		info.size += 1;
		self.write_nodeinfo(head.meta, &info)
	}

	/// Symmetric to [`Mount::add_link`]: zeros the slot and decrements the
	/// owning head's `nodeinfo.size`.
	pub(crate) fn remove_link(&mut self, carrier: u64, slot: usize) -> Result<()> {
		let mut inode = self.read_inode(carrier)?;
		inode.links[slot] = 0;
		self.write_inode(carrier, &inode)?;

		let head_block = self.head_of(carrier)?;
		let head = self.read_inode(head_block)?;
		let mut info = self.read_nodeinfo(head.meta)?;
		info.size = info.size.saturating_sub(1);
		self.write_nodeinfo(head.meta, &info)
	}
}
