use std::collections::HashSet;

use crate::addr::{self, Address};
use crate::alloc::{Bitmap, State};
use crate::error::{Result, UstarError};
use crate::layout::{
    Sector, GROUP_COUNT, IMAGE_SIZE, RECORD_SIZE, SECTORS_PER_GROUP, TOTAL_SECTORS,
};
use crate::node::{DirRecord, Header, Mode, NodeKind};
use crate::tree::Node;

use zerocopy::FromBytes;

/// Sector usage of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub used: usize,
    pub free: usize,
}

/// Read-only view over an assembled image.
pub struct ImageReader<'a> {
    sectors: &'a [Sector],
}

impl<'a> ImageReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() != IMAGE_SIZE {
            return Err(UstarError::InvalidImage { len: bytes.len() });
        }
        let sectors = <Sector as FromBytes>::slice_from(bytes)
            .ok_or(UstarError::InvalidImage { len: bytes.len() })?;
        Ok(Self { sectors })
    }

    /// `None` for a group past the end of the image.
    pub fn bitmap(&self, group: usize) -> Option<Bitmap> {
        if group >= GROUP_COUNT {
            return None;
        }
        self.sectors.get(group * SECTORS_PER_GROUP).map(Bitmap::parse)
    }

    pub fn is_allocated(&self, addr: Address) -> bool {
        self.bitmap(addr.group())
            .and_then(|bmp| bmp.get(addr.sector()))
            == Some(State::Used)
    }

    pub fn sector(&self, addr: Address) -> &'a Sector {
        &self.sectors[addr.group() * SECTORS_PER_GROUP + 1 + addr.sector()]
    }

    /// Decodes the header stored at `addr`, which must be allocated.
    pub fn header(&self, addr: Address) -> Result<Header> {
        if !self.is_allocated(addr) {
            return Err(UstarError::InvalidAddress {
                group: addr.group(),
                sector: addr.sector(),
            });
        }
        Header::decode(self.sector(addr), addr)
    }

    pub fn root_address(&self) -> Address {
        Address::at(0, 0)
    }

    pub fn root(&self) -> Result<Header> {
        self.header(self.root_address())
    }

    /// Payload sectors of the node whose header is at `at`, in block order.
    pub fn blocks(&self, header: &Header, at: Address) -> Result<Vec<Address>> {
        let count = header.block_count as usize;
        let blocks: Vec<Address> = match header.mode {
            Mode::Short => header.table_entries().take(count).collect(),
            Mode::Long => header
                .table_entries()
                .flat_map(|indirect| addr::read_run(self.sector(indirect)))
                .map_while(|a| a)
                .take(count)
                .collect(),
        };

        if blocks.len() != count {
            return Err(UstarError::corrupt(
                at,
                format!("expected {} blocks, found {}", count, blocks.len()),
            ));
        }
        if let Some(bad) = blocks.iter().find(|&&b| !self.is_allocated(b)) {
            return Err(UstarError::corrupt(
                at,
                format!("block {} is not allocated", bad),
            ));
        }
        Ok(blocks)
    }

    /// Payload of the node, cut to its recorded size.
    pub fn payload(&self, header: &Header, at: Address) -> Result<Vec<u8>> {
        let blocks = self.blocks(header, at)?;
        let mut data = Vec::with_capacity(blocks.len() * std::mem::size_of::<Sector>());
        for block in blocks {
            data.extend_from_slice(self.sector(block));
        }
        if (header.size as usize) > data.len() {
            return Err(UstarError::corrupt(at, "size exceeds allocated blocks"));
        }
        data.truncate(header.size as usize);
        Ok(data)
    }

    /// Records of the directory whose header is at `at`.
    pub fn entries(&self, header: &Header, at: Address) -> Result<Vec<DirRecord>> {
        if !header.is_dir() {
            return Err(UstarError::corrupt(at, "not a directory"));
        }
        if header.size as usize % RECORD_SIZE != 0 {
            return Err(UstarError::corrupt(
                at,
                format!("directory size {} is not a whole number of records", header.size),
            ));
        }
        self.payload(header, at)?
            .chunks_exact(RECORD_SIZE)
            .map(|raw| {
                DirRecord::decode(raw, at)?
                    .ok_or_else(|| UstarError::corrupt(at, "empty record inside directory"))
            })
            .collect()
    }

    /// Visits every node below and including `at` depth first, in record order.
    pub fn walk<F>(&self, at: Address, mut visit: F) -> Result<()>
    where
        F: FnMut(usize, Address, &Header),
    {
        let mut seen = HashSet::new();
        self.walk_inner(at, 0, &mut seen, &mut visit)
    }

    fn walk_inner<F>(
        &self,
        at: Address,
        depth: usize,
        seen: &mut HashSet<Address>,
        visit: &mut F,
    ) -> Result<()>
    where
        F: FnMut(usize, Address, &Header),
    {
        if !seen.insert(at) {
            return Err(UstarError::corrupt(at, "header reachable twice"));
        }
        let header = self.header(at)?;
        visit(depth, at, &header);
        if header.is_dir() {
            for record in self.entries(&header, at)? {
                self.walk_inner(record.address, depth + 1, seen, visit)?;
            }
        }
        Ok(())
    }

    /// Rebuilds the source tree rooted at `at`. Names come from the child
    /// headers, so they are not affected by the 28 byte record limit.
    pub fn load_tree(&self, at: Address) -> Result<Node> {
        let mut seen = HashSet::new();
        self.load_inner(at, &mut seen)
    }

    fn load_inner(&self, at: Address, seen: &mut HashSet<Address>) -> Result<Node> {
        if !seen.insert(at) {
            return Err(UstarError::corrupt(at, "header reachable twice"));
        }
        let header = self.header(at)?;
        match header.kind {
            NodeKind::File => {
                let data = self.payload(&header, at)?;
                Ok(Node::file(header.name, data))
            }
            NodeKind::Directory => {
                let mut children = Vec::new();
                for record in self.entries(&header, at)? {
                    children.push(self.load_inner(record.address, seen)?);
                }
                Ok(Node::dir(header.name, children))
            }
        }
    }

    pub fn stats(&self) -> Stats {
        let free: usize = (0..GROUP_COUNT)
            .filter_map(|g| self.bitmap(g))
            .map(|bmp| bmp.free_count())
            .sum();
        Stats {
            used: TOTAL_SECTORS - free,
            free,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::image::Image;
    use crate::layout::SECTOR_SIZE;

    fn sample_tree() -> Node {
        Node::dir(
            "root",
            vec![
                Node::file("a.txt", "hi"),
                Node::dir(
                    "sub",
                    vec![
                        Node::file("b.bin", vec![0u8; 600]),
                        Node::file("big", vec![9u8; 120 * SECTOR_SIZE + 3]),
                    ],
                ),
                Node::dir("empty", vec![]),
                Node::file("a_name_longer_than_one_record", "x"),
            ],
        )
    }

    #[test]
    fn reader_rejects_short_buffer() {
        assert!(matches!(
            ImageReader::new(&[0; 1024]),
            Err(UstarError::InvalidImage { len: 1024 })
        ));
    }

    #[test]
    fn loads_back_the_tree_that_was_built() {
        let tree = sample_tree();
        let image = build(&tree).unwrap();
        let reader = image.reader().unwrap();

        assert_eq!(reader.load_tree(reader.root_address()).unwrap(), tree);
    }

    #[test]
    fn walk_visits_nodes_depth_first() {
        let image = build(&sample_tree()).unwrap();
        let reader = image.reader().unwrap();

        let mut seen = Vec::new();
        reader
            .walk(reader.root_address(), |depth, _, header| {
                seen.push((depth, header.name.clone()))
            })
            .unwrap();

        let expected = vec![
            (0, "root"),
            (1, "a.txt"),
            (1, "sub"),
            (2, "b.bin"),
            (2, "big"),
            (1, "empty"),
            (1, "a_name_longer_than_one_record"),
        ];
        let expected: Vec<(usize, String)> = expected
            .into_iter()
            .map(|(d, n)| (d, n.to_string()))
            .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn record_names_are_truncated_but_headers_are_not() {
        let long = "n".repeat(30);
        let image = build(&Node::dir("root", vec![Node::file(long.clone(), "")])).unwrap();
        let reader = image.reader().unwrap();

        let root = reader.root().unwrap();
        let records = reader.entries(&root, reader.root_address()).unwrap();
        assert_eq!(records[0].name, "n".repeat(28));
        assert_eq!(reader.header(records[0].address).unwrap().name, long);
    }

    #[test]
    fn stats_count_used_sectors() {
        let image = build(&Node::dir("root", vec![Node::file("a", "hi")])).unwrap();
        let stats = image.reader().unwrap().stats();
        // Root header, root records, file header, file payload.
        assert_eq!(stats.used, 4);
        assert_eq!(stats.free, TOTAL_SECTORS - 4);
    }

    #[test]
    fn header_of_free_sector_is_invalid() {
        let image = build(&Node::dir("root", vec![])).unwrap();
        let reader = image.reader().unwrap();
        assert!(matches!(
            reader.header(Address::new(5, 5).unwrap()),
            Err(UstarError::InvalidAddress { group: 5, sector: 5 })
        ));
    }

    #[test]
    fn corrupt_type_byte_is_reported() {
        let image = build(&Node::dir("root", vec![])).unwrap();
        let mut bytes = image.into_bytes();
        // Type byte of the root header: past the bitmap sector, offset 471.
        bytes[SECTOR_SIZE + 471] = 9;
        let image = Image::from_bytes(bytes).unwrap();

        let reader = image.reader().unwrap();
        assert!(matches!(
            reader.root(),
            Err(UstarError::CorruptSector { .. })
        ));
    }

    #[test]
    fn partial_directory_record_is_reported() {
        let image = build(&Node::dir("root", vec![Node::file("a", "hi")])).unwrap();
        let mut bytes = image.into_bytes();
        // Size field of the root header, offset 28: one record plus one byte.
        bytes[SECTOR_SIZE + 28..SECTOR_SIZE + 32].copy_from_slice(&33u32.to_le_bytes());
        let image = Image::from_bytes(bytes).unwrap();

        let reader = image.reader().unwrap();
        assert!(matches!(
            reader.load_tree(reader.root_address()),
            Err(UstarError::CorruptSector { .. })
        ));
    }

    #[test]
    fn bitmap_past_last_group_is_none() {
        let image = build(&Node::dir("root", vec![])).unwrap();
        let reader = image.reader().unwrap();
        assert!(reader.bitmap(GROUP_COUNT - 1).is_some());
        assert!(reader.bitmap(GROUP_COUNT).is_none());
    }
}
