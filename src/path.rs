//! The path resolver: walks a POSIX-style absolute path through nested
//! directory inodes and their overflow chains.

use crate::device::BlockDevice;
use crate::error::Error;
use crate::error::Result;
use crate::layout::Mode;
use crate::layout::ROOT_BLOCK;
use crate::mount::Mount;

/// The result of resolving a path: the innermost directory found, the
/// target block if the full path resolved, and the unresolved leaf name.
pub(crate) struct Resolved {
	/// Block of the innermost directory found.
	pub dir_block: u64,
	/// Block of the final path component, if it exists.
	pub target_block: Option<u64>,
	/// The final path component, preserved for callers that create entries.
	pub leaf_name: String,
}

impl<D: BlockDevice> Mount<D> {
	/// Walks `path` component by component starting at the root.
	pub(crate) fn resolve(&mut self, path: &str) -> Result<Resolved> {
		let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
		if components.is_empty() {
			return Ok(Resolved {
				dir_block: ROOT_BLOCK,
				target_block: Some(ROOT_BLOCK),
				leaf_name: String::new(),
			});
		}

		let mut cursor = ROOT_BLOCK;
		let last = components.len() - 1;
		for (i, name) in components.iter().enumerate() {
			let found = self.find_entry(cursor, name)?;
			let is_last = i == last;
			match (found, is_last) {
				(Some(block), true) => {
					return Ok(Resolved {
						dir_block: cursor,
						target_block: Some(block),
						leaf_name: (*name).to_owned(),
					});
				}
				(Some(block), false) => {
					let inode = self.read_inode(block)?;
					if inode.mode != Mode::Dir {
						return Err(Error::NotFound);
					}
					cursor = block;
				}
				(None, true) => {
					return Ok(Resolved {
						dir_block: cursor,
						target_block: None,
						leaf_name: (*name).to_owned(),
					});
				}
				(None, false) => return Err(Error::NotFound),
			}
		}
		unreachable!("components is non-empty, loop always returns")
	}

	/// Scans `dir_block`'s overflow chain for a child entry named `name`.
	fn find_entry(&mut self, dir_block: u64, name: &str) -> Result<Option<u64>> {
		let mut carrier = dir_block;
		loop {
			let inode = self.read_inode(carrier)?;
			for &link in &inode.links {
				if link == 0 {
					continue;
				}
				let child = self.read_inode(link)?;
				if !child.is_head() {
					continue;
				}
				let info = self.read_nodeinfo(child.meta)?;
				if info.name == name {
					return Ok(Some(link));
				}
			}
			if inode.next == 0 {
				return Ok(None);
			}
			carrier = inode.next;
		}
	}
}
