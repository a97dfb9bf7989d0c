use std::path::Path;

use crate::addr::{self, Address};
use crate::alloc::Allocator;
use crate::error::{Result, UstarError};
use crate::image::Image;
use crate::layout::{
    sectors_for, Sector, ADDRESSES_PER_INDIRECT, LONG_MODE_LIMIT, NAME_LEN, RECORD_SIZE,
    SECTOR_SIZE, TOTAL_SECTORS,
};
use crate::node::{DirRecord, Header, Mode, NodeKind};
use crate::tree::Node;

use log::{debug, info};

/// Sectors reserved for one node's payload.
struct Extent {
    mode: Mode,
    /// Indirect sectors, only used in long mode.
    indirect: Vec<Address>,
    /// Payload sectors in block order.
    blocks: Vec<Address>,
}

impl Extent {
    /// What the header's block table points at.
    fn table(&self) -> &[Address] {
        match self.mode {
            Mode::Short => &self.blocks,
            Mode::Long => &self.indirect,
        }
    }
}

/// A name must be a single path component: not empty, not `.` or `..`, and
/// free of `/` and NUL.
fn is_valid_name(name: &str) -> bool {
    !matches!(name, "" | "." | "..") && !name.contains(|c: char| c == '/' || c == '\0')
}

/// Places a source tree into a fresh set of LBA groups.
///
/// Every node gets a header sector followed by its payload. Directories reserve
/// their own sectors first, then place their children in order, and finally
/// write their records once every child address is known.
pub struct Builder {
    alloc: Allocator,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            alloc: Allocator::new(),
        }
    }

    /// Places `node` and everything below it, returning the address of its
    /// header. `parent` is the header of the enclosing directory, `None` for
    /// the root.
    pub fn place(&mut self, node: &Node, parent: Option<Address>) -> Result<Address> {
        self.place_at(node, parent, Path::new(""))
    }

    pub fn allocator(&self) -> &Allocator {
        &self.alloc
    }

    /// Flattens the placed groups into an image.
    pub fn finish(self) -> Image {
        Image::assemble(&self.alloc)
    }

    fn place_at(&mut self, node: &Node, parent: Option<Address>, prefix: &Path) -> Result<Address> {
        let path = prefix.join(node.name());
        if !is_valid_name(node.name()) {
            return Err(UstarError::InvalidName { path });
        }
        let len = node.name().len();
        if len > NAME_LEN {
            return Err(UstarError::NameTooLong { path, len });
        }

        match node {
            Node::File { name, data } => self.place_file(name, data, parent, &path),
            Node::Directory { name, children } => self.place_dir(name, children, parent, &path),
        }
    }

    fn place_file(
        &mut self,
        name: &str,
        data: &[u8],
        parent: Option<Address>,
        path: &Path,
    ) -> Result<Address> {
        let at = self.alloc.allocate()?;
        let extent = self.reserve(sectors_for(data.len()), path)?;

        self.write_header(at, name, NodeKind::File, data.len(), parent, &extent)?;
        self.write_payload(&extent, data)?;
        debug!(
            "placed file {:?} at {} ({:?} mode, {} blocks)",
            path,
            at,
            extent.mode,
            extent.blocks.len()
        );
        Ok(at)
    }

    fn place_dir(
        &mut self,
        name: &str,
        children: &[Node],
        parent: Option<Address>,
        path: &Path,
    ) -> Result<Address> {
        let at = self.alloc.allocate()?;
        let size = children.len() * RECORD_SIZE;
        let extent = self.reserve(sectors_for(size), path)?;

        let mut records = Vec::with_capacity(size);
        for child in children {
            let child_at = self.place_at(child, Some(at), path)?;
            records.extend_from_slice(&DirRecord::new(child.name(), child_at).encode());
        }

        self.write_header(at, name, NodeKind::Directory, size, parent, &extent)?;
        self.write_payload(&extent, &records)?;
        debug!(
            "placed directory {:?} at {} ({} entries, {:?} mode, {} blocks)",
            path,
            at,
            children.len(),
            extent.mode,
            extent.blocks.len()
        );
        Ok(at)
    }

    /// Allocates indirect sectors (long mode only) and then payload sectors.
    fn reserve(&mut self, block_count: usize, path: &Path) -> Result<Extent> {
        if block_count > LONG_MODE_LIMIT {
            return Err(UstarError::FileTooLarge {
                path: path.to_path_buf(),
                blocks: block_count,
            });
        }

        let mode = Mode::for_blocks(block_count);
        let indirect_count = match mode {
            Mode::Short => 0,
            Mode::Long => block_count.div_ceil(ADDRESSES_PER_INDIRECT),
        };
        let indirect = self.allocate_many(indirect_count)?;
        let blocks = self.allocate_many(block_count)?;
        Ok(Extent {
            mode,
            indirect,
            blocks,
        })
    }

    fn allocate_many(&mut self, n: usize) -> Result<Vec<Address>> {
        (0..n).map(|_| self.alloc.allocate()).collect()
    }

    fn write_header(
        &mut self,
        at: Address,
        name: &str,
        kind: NodeKind,
        size: usize,
        parent: Option<Address>,
        extent: &Extent,
    ) -> Result<()> {
        let mut header = Header::new(name, kind);
        // Bounded by LONG_MODE_LIMIT sectors, which fits in 32 bits.
        header.size = size as u32;
        header.block_count = extent.blocks.len() as u32;
        header.parent = parent;
        header.mode = extent.mode;
        header.set_block_table(extent.table());
        self.alloc.write(at, &header.encode()?)
    }

    /// Writes indirect sectors, then `data` split across the payload sectors.
    /// The last sector is zero padded.
    fn write_payload(&mut self, extent: &Extent, data: &[u8]) -> Result<()> {
        for (i, &at) in extent.indirect.iter().enumerate() {
            let mut sector: Sector = [0; SECTOR_SIZE];
            let entries = extent
                .blocks
                .iter()
                .skip(i * ADDRESSES_PER_INDIRECT)
                .take(ADDRESSES_PER_INDIRECT)
                .map(|&a| Some(a));
            addr::write_run(entries, &mut sector);
            self.alloc.write(at, &sector)?;
        }

        for (chunk, &at) in data.chunks(SECTOR_SIZE).zip(&extent.blocks) {
            let mut sector: Sector = [0; SECTOR_SIZE];
            sector[..chunk.len()].copy_from_slice(chunk);
            self.alloc.write(at, &sector)?;
        }
        Ok(())
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a complete image from `root`.
///
/// # Errors
///
/// Any failure aborts the build and no image is returned.
pub fn build(root: &Node) -> Result<Image> {
    info!("building image for {:?}", root.name());
    let mut builder = Builder::new();
    let root_at = builder.place(root, None)?;
    debug_assert_eq!(root_at, Address::at(0, 0));

    let free = builder.allocator().free_sectors();
    info!(
        "placed tree using {} of {} sectors",
        TOTAL_SECTORS - free,
        TOTAL_SECTORS
    );
    Ok(builder.finish())
}
