//! Directory operations: `mkdir`, `rmdir`, `list_dir`.

use log::debug;

use crate::device::BlockDevice;
use crate::error::Error;
use crate::error::Result;
use crate::layout::Inode;
use crate::layout::Mode;
use crate::layout::Nodeinfo;
use crate::layout::ROOT_BLOCK;
use crate::mount::Mount;

impl<D: BlockDevice> Mount<D> {
	/// Creates a new, empty directory at `path`.
	pub fn mkdir(&mut self, path: &str) -> Result<()> {
		let r = self.resolve(path)?;
		if r.target_block.is_some() {
			return Err(Error::Exists);
		}

		let (carrier, slot) = self.find_link(r.dir_block, 0)?;
		let slot_missing = slot.is_none();
		let need = 2 + u64::from(slot_missing);
		if need > self.sb.freeblks {
			return Err(Error::NoSpace);
		}

		let (carrier, slot) = if let Some(slot) = slot {
			(carrier, slot)
		} else {
			(self.create_child(carrier, r.dir_block)?, 0)
		};

		let dir_block = self.get_block()?;
		let info_block = self.get_block()?;
		self.add_link(carrier, slot, dir_block)?;

		let inode = Inode::new_empty(Mode::Dir, r.dir_block, info_block, self.sb.blksz);
		self.write_inode(dir_block, &inode)?;
		let info = Nodeinfo {
			size: 0,
			name: r.leaf_name.clone(),
		};
		self.write_nodeinfo(info_block, &info)?;

		debug!("mkdir {path:?} -> block {dir_block}");
		Ok(())
	}

	/// Removes the empty directory at `path`.
	pub fn rmdir(&mut self, path: &str) -> Result<()> {
		let r = self.resolve(path)?;
		let target = r.target_block.ok_or(Error::NotFound)?;
		if target == ROOT_BLOCK {
			// The root has no parent link to detach from; find_link below
			// would fail on it even when empty.
			return Err(Error::NotEmpty);
		}
		let inode = self.read_inode(target)?;
		if inode.mode != Mode::Dir {
			return Err(Error::NotDirectory);
		}
		let info = self.read_nodeinfo(inode.meta)?;
		if info.size != 0 {
			return Err(Error::NotEmpty);
		}

		// Release the whole overflow chain, not just the head: a directory
		// that once grew past LINK_MAX and shrank back to empty still has
		// IMCHILD continuations allocated.
		let mut next = inode.next;
		while next != 0 {
			let seg = self.read_inode(next)?;
			let freed = next;
			next = seg.next;
			self.put_block(freed)?;
		}
		self.put_block(inode.meta)?;
		self.put_block(target)?;

		let (carrier, slot) = self.find_link(r.dir_block, target)?;
		let slot = slot.ok_or_else(|| {
			Error::Io(std::io::Error::other("directory entry missing its parent link"))
		})?;
		self.remove_link(carrier, slot)?;

		debug!("rmdir {path:?}");
		Ok(())
	}

	/// Lists the entries of the directory at `path`: names separated by a
	/// single space, directories suffixed with `/`.
	pub fn list_dir(&mut self, path: &str) -> Result<String> {
		let r = self.resolve(path)?;
		let target = r.target_block.ok_or(Error::NotFound)?;
		let inode = self.read_inode(target)?;
		if inode.mode != Mode::Dir {
			return Err(Error::NotDirectory);
		}

		let mut entries = Vec::new();
		let mut carrier = target;
		loop {
			let cur = self.read_inode(carrier)?;
			for &link in &cur.links {
				if link == 0 {
					continue;
				}
				let child = self.read_inode(link)?;
				let info = self.read_nodeinfo(child.meta)?;
				if child.mode == Mode::Dir {
					entries.push(format!("{}/", info.name));
				} else {
					entries.push(info.name);
				}
			}
			if cur.next == 0 {
				break;
			}
			carrier = cur.next;
		}
		Ok(entries.join(" "))
	}
}
