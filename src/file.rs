//! File operations: `write_file`, `read_file`, `unlink` — translating
//! between a byte buffer and the block graph.

use log::debug;

use crate::device::BlockDevice;
use crate::error::Error;
use crate::error::Result;
use crate::layout::Inode;
use crate::layout::Mode;
use crate::layout::Nodeinfo;
use crate::mount::Mount;

fn ceil_div(n: u64, d: u64) -> u64 {
	if n == 0 {
		0
	} else {
		(n - 1) / d + 1
	}
}

impl<D: BlockDevice> Mount<D> {
	/// Allocates `n` fresh data blocks and fills them with `buf[offset..]`,
	/// zero-padding the final block past the end of `buf`.
	fn alloc_data_blocks(&mut self, buf: &[u8], offset: usize, n: usize) -> Result<Vec<u64>> {
		let blksz = self.sb.blksz as usize;
		let mut blocks = Vec::with_capacity(n);
		for i in 0..n {
			let block = self.get_block()?;
			if block == 0 {
				return Err(Error::NoSpace);
			}
			let start = offset + i * blksz;
			let mut data = vec![0u8; blksz];
			if start < buf.len() {
				let end = (start + blksz).min(buf.len());
				data[..end - start].copy_from_slice(&buf[start..end]);
			}
			self.write_data_block(block, &data)?;
			blocks.push(block);
		}
		Ok(blocks)
	}

	/// Writes `buf` as the content of the file at `path`, creating it (and
	/// replacing any existing entry at `path`) in the process.
	pub fn write_file(&mut self, path: &str, buf: &[u8]) -> Result<()> {
		let blksz = self.sb.blksz;
		let link_max = self.link_max();
		let cnt = buf.len() as u64;
		let datablks = ceil_div(cnt, blksz) as usize;
		let extra_inodes = if datablks <= link_max {
			0
		} else {
			ceil_div(datablks as u64, link_max as u64) as usize - 1
		};

		let mut r = self.resolve(path)?;
		if r.target_block.is_some() {
			self.unlink(path)?;
			r = self.resolve(path)?;
		}

		let (carrier, slot) = self.find_link(r.dir_block, 0)?;
		let slot_missing = slot.is_none();
		let need = datablks as u64 + 2 + extra_inodes as u64 + u64::from(slot_missing);
		if need > self.sb.freeblks {
			return Err(Error::NoSpace);
		}

		let (carrier, slot) = if let Some(slot) = slot {
			(carrier, slot)
		} else {
			(self.create_child(carrier, r.dir_block)?, 0)
		};

		let head_block = self.get_block()?;
		self.add_link(carrier, slot, head_block)?;
		let info_block = self.get_block()?;

		let head_n = datablks.min(link_max);
		let head_links = self.alloc_data_blocks(buf, 0, head_n)?;
		let mut inode = Inode::new_empty(Mode::Reg, r.dir_block, info_block, blksz);
		inode.links[..head_n].copy_from_slice(&head_links);
		self.write_inode(head_block, &inode)?;

		let mut remaining = datablks - head_n;
		let mut offset = head_n * blksz as usize;
		let mut tail = head_block;
		while remaining > 0 {
			let n = remaining.min(link_max);
			let child_block = self.create_child(tail, head_block)?;
			let links = self.alloc_data_blocks(buf, offset, n)?;
			let mut child = Inode::new_empty(Mode::Child, head_block, tail, blksz);
			child.links[..n].copy_from_slice(&links);
			self.write_inode(child_block, &child)?;

			offset += n * blksz as usize;
			remaining -= n;
			tail = child_block;
		}

		let info = Nodeinfo {
			size: cnt,
			name: r.leaf_name.clone(),
		};
		self.write_nodeinfo(info_block, &info)?;

		debug!("write_file {path:?}: {cnt} bytes, {datablks} data blocks");
		Ok(())
	}

	/// Reads up to `bufsz` bytes of the file at `path`, clamped to its
	/// logical length.
	pub fn read_file(&mut self, path: &str, bufsz: usize) -> Result<Vec<u8>> {
		let r = self.resolve(path)?;
		let target = r.target_block.ok_or(Error::NotFound)?;
		let head = self.read_inode(target)?;
		if head.mode == Mode::Dir {
			return Err(Error::IsDirectory);
		}
		let info = self.read_nodeinfo(head.meta)?;
		let read_len = (bufsz as u64).min(info.size) as usize;

		let blksz = self.sb.blksz as usize;
		let link_max = self.link_max();
		let nblocks = ceil_div(read_len as u64, blksz as u64) as usize;

		let mut out = vec![0u8; read_len];
		let mut carrier_inode = head;
		for i in 0..nblocks {
			if i > 0 && i % link_max == 0 {
				if carrier_inode.next == 0 {
					return Err(Error::Io(std::io::Error::other(
						"overflow chain ended before logical end of file",
					)));
				}
				carrier_inode = self.read_inode(carrier_inode.next)?;
			}
			let block = carrier_inode.links[i % link_max];
			let mut tmp = vec![0u8; blksz];
			self.read_data_block(block, &mut tmp)?;
			let start = i * blksz;
			let end = (start + blksz).min(read_len);
			out[start..end].copy_from_slice(&tmp[..end - start]);
		}
		Ok(out)
	}

	/// Removes the file at `path` and returns every block it owns to the
	/// freelist. Makes no check that `path` names a regular file: routing
	/// directories to `rmdir` instead is the caller's responsibility.
	pub fn unlink(&mut self, path: &str) -> Result<()> {
		let r = self.resolve(path)?;
		let target = r.target_block.ok_or(Error::NotFound)?;
		let head = self.read_inode(target)?;
		let info = self.read_nodeinfo(head.meta)?;
		let blksz = self.sb.blksz;
		let link_max = self.link_max();
		let mut remaining = ceil_div(info.size, blksz) as usize;

		let mut carrier = target;
		let mut first_segment = true;
		loop {
			let cur = self.read_inode(carrier)?;
			let n = remaining.min(link_max);
			for &block in &cur.links[..n] {
				if block != 0 {
					self.put_block(block)?;
				}
			}
			remaining -= n;
			let next = cur.next;
			if first_segment {
				self.put_block(head.meta)?;
				first_segment = false;
			}
			self.put_block(carrier)?;
			if next == 0 {
				break;
			}
			carrier = next;
		}

		let (carrier, slot) = self.find_link(r.dir_block, target)?;
		let slot = slot.ok_or_else(|| {
			Error::Io(std::io::Error::other("file entry missing its parent link"))
		})?;
		self.remove_link(carrier, slot)
	}
}
