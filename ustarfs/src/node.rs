use crate::addr::{self, Address};
use crate::error::{Result, UstarError};
use crate::layout::{
    Sector, ADDRESS_SIZE, NAME_LEN, RECORD_NAME_LEN, RECORD_SIZE, SECTOR_SIZE, SHORT_MODE_LIMIT,
};

use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory = 1,
    File = 2,
}

/// How a header's block table is interpreted.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Table entries are payload sectors.
    Short = 0,
    /// Table entries are indirect sectors, each listing up to 128 payload
    /// sectors.
    Long = 1,
}

impl Mode {
    /// Picks the addressing mode for a payload of `block_count` sectors.
    pub fn for_blocks(block_count: usize) -> Self {
        if block_count > SHORT_MODE_LIMIT {
            Mode::Long
        } else {
            Mode::Short
        }
    }
}

impl TryFrom<u8> for NodeKind {
    type Error = String;

    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        match v {
            1 => Ok(NodeKind::Directory),
            2 => Ok(NodeKind::File),
            _ => Err(format!("unknown node type {}", v)),
        }
    }
}

impl TryFrom<u8> for Mode {
    type Error = String;

    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        match v {
            0 => Ok(Mode::Short),
            1 => Ok(Mode::Long),
            _ => Err(format!("unknown addressing mode {}", v)),
        }
    }
}

/// Exact on-disk image of a header sector. This structure __must be exactly
/// 512 bytes.__
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes)]
struct RawHeader {
    /// User, owner and group ids. Reserved, always zero.
    ids: [u8; 24],
    /// Pair swapped address of the parent's header.
    parent: [u8; ADDRESS_SIZE],
    size: U32<LittleEndian>,
    block_count: U32<LittleEndian>,
    /// Pair swapped run of 100 addresses.
    block_table: [u8; SHORT_MODE_LIMIT * ADDRESS_SIZE],
    /// Permission flags. Reserved, always zero.
    flags: [u8; 2],
    mode: u8,
    /// Pair swapped, zero padded name.
    name: [u8; NAME_LEN],
    file_type: u8,
    padding: [u8; 40],
}

const _: () = assert!(std::mem::size_of::<RawHeader>() == SECTOR_SIZE);

/// Metadata of one placed node, stored alone in its own sector.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub name: String,
    pub kind: NodeKind,
    /// Payload length in bytes. For directories this is the record count times
    /// 32.
    pub size: u32,
    /// Payload sectors in use, not counting indirect sectors.
    pub block_count: u32,
    /// `None` only for the root.
    pub parent: Option<Address>,
    pub mode: Mode,
    pub block_table: [Option<Address>; SHORT_MODE_LIMIT],
}

impl Header {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            size: 0,
            block_count: 0,
            parent: None,
            mode: Mode::Short,
            block_table: [None; SHORT_MODE_LIMIT],
        }
    }

    /// Fills the block table from `entries`, leaving the rest empty.
    pub fn set_block_table(&mut self, entries: &[Address]) {
        assert!(entries.len() <= SHORT_MODE_LIMIT);
        self.block_table = [None; SHORT_MODE_LIMIT];
        for (slot, &addr) in self.block_table.iter_mut().zip(entries) {
            *slot = Some(addr);
        }
    }

    /// Used entries of the block table, in order.
    pub fn table_entries(&self) -> impl Iterator<Item = Address> + '_ {
        self.block_table.iter().map_while(|a| *a)
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Serializes the header into a full sector.
    ///
    /// # Errors
    ///
    /// Names longer than 32 bytes are rejected with
    /// [`UstarError::NameTooLong`].
    pub fn encode(&self) -> Result<Sector> {
        let name = self.name.as_bytes();
        if name.len() > NAME_LEN {
            return Err(UstarError::NameTooLong {
                path: self.name.clone().into(),
                len: name.len(),
            });
        }

        let mut raw = RawHeader::new_zeroed();
        raw.parent = addr::encode(self.parent);
        addr::swap_pairs(&mut raw.parent);
        raw.size = U32::new(self.size);
        raw.block_count = U32::new(self.block_count);
        addr::write_run(self.block_table.iter().copied(), &mut raw.block_table);
        raw.mode = self.mode as u8;
        raw.name[..name.len()].copy_from_slice(name);
        addr::swap_pairs(&mut raw.name);
        raw.file_type = self.kind as u8;

        let mut sector = [0; SECTOR_SIZE];
        sector.copy_from_slice(raw.as_bytes());
        Ok(sector)
    }

    /// Parses a header sector written by [`Header::encode`]. `at` is only used
    /// to report where a corrupt header was found.
    pub fn decode(buf: &Sector, at: Address) -> Result<Self> {
        let mut raw = RawHeader::read_from(&buf[..])
            .ok_or_else(|| UstarError::corrupt(at, "short sector"))?;

        addr::swap_pairs(&mut raw.parent);
        let parent = Address::decode(raw.parent);

        let mut block_table = [None; SHORT_MODE_LIMIT];
        for (slot, addr) in block_table.iter_mut().zip(addr::read_run(&raw.block_table)) {
            *slot = addr;
        }

        addr::swap_pairs(&mut raw.name);
        let name = decode_name(&raw.name)
            .ok_or_else(|| UstarError::corrupt(at, "name is not UTF-8"))?;

        Ok(Self {
            name,
            kind: NodeKind::try_from(raw.file_type).map_err(|e| UstarError::corrupt(at, e))?,
            size: raw.size.get(),
            block_count: raw.block_count.get(),
            parent,
            mode: Mode::try_from(raw.mode).map_err(|e| UstarError::corrupt(at, e))?,
            block_table,
        })
    }
}

/// One child entry in a directory payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DirRecord {
    /// At most 28 bytes. Longer names are cut when the record is built.
    pub name: String,
    pub address: Address,
}

impl DirRecord {
    pub fn new(name: &str, address: Address) -> Self {
        Self {
            name: truncate_name(name, RECORD_NAME_LEN).to_string(),
            address,
        }
    }

    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0; RECORD_SIZE];
        let name = self.name.as_bytes();
        let len = name.len().min(RECORD_NAME_LEN);
        buf[..len].copy_from_slice(&name[..len]);
        buf[RECORD_NAME_LEN..].copy_from_slice(&self.address.encode());
        addr::swap_pairs(&mut buf);
        buf
    }

    /// Returns `Ok(None)` for an empty slot.
    pub fn decode(buf: &[u8], at: Address) -> Result<Option<Self>> {
        let mut raw = [0; RECORD_SIZE];
        match buf.get(..RECORD_SIZE) {
            Some(record) => raw.copy_from_slice(record),
            None => return Err(UstarError::corrupt(at, "truncated directory record")),
        }
        addr::swap_pairs(&mut raw);

        let mut address = [0; ADDRESS_SIZE];
        address.copy_from_slice(&raw[RECORD_NAME_LEN..]);
        let address = match Address::decode(address) {
            Some(a) => a,
            None if raw.iter().all(|&b| b == 0) => return Ok(None),
            None => return Err(UstarError::corrupt(at, "directory record without address")),
        };
        let name = decode_name(&raw[..RECORD_NAME_LEN])
            .ok_or_else(|| UstarError::corrupt(at, "record name is not UTF-8"))?;
        Ok(Some(Self { name, address }))
    }
}

fn decode_name(field: &[u8]) -> Option<String> {
    let end = field.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    String::from_utf8(field[..end].to_vec()).ok()
}

/// Longest prefix of `name` that fits in `max` bytes without splitting a
/// character.
fn truncate_name(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> Address {
        Address::new(0, 0).unwrap()
    }

    fn sample_header() -> Header {
        let mut header = Header::new("notes.txt", NodeKind::File);
        header.size = 1234;
        header.block_count = 3;
        header.parent = Address::new(2, 17);
        header.set_block_table(&[
            Address::new(0, 5).unwrap(),
            Address::new(0, 6).unwrap(),
            Address::new(1, 0).unwrap(),
        ]);
        header
    }

    #[test]
    fn can_encode_and_decode_headers() {
        let header = sample_header();
        let encoded = header.encode().unwrap();
        assert_eq!(Header::decode(&encoded, at()).unwrap(), header);
    }

    #[test]
    fn can_encode_and_decode_long_mode_directory() {
        let mut header = Header::new("d", NodeKind::Directory);
        header.size = 32 * 2000;
        header.block_count = 125;
        header.mode = Mode::Long;
        let table: Vec<Address> = (0..100)
            .map(|i| Address::new(31, 400 + i).unwrap())
            .collect();
        header.set_block_table(&table);

        let decoded = Header::decode(&header.encode().unwrap(), at()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.table_entries().count(), 100);
    }

    #[test]
    fn fields_sit_at_fixed_offsets() {
        let header = sample_header();
        let buf = header.encode().unwrap();

        // Reserved ids.
        assert!(buf[0..24].iter().all(|&b| b == 0));
        // Parent (2, 17) encodes as 00 02 00 12, stored pair swapped.
        assert_eq!(&buf[24..28], &[0x02, 0x00, 0x12, 0x00]);
        assert_eq!(&buf[28..32], &1234u32.to_le_bytes());
        assert_eq!(&buf[32..36], &3u32.to_le_bytes());
        // First table entry (0, 5) encodes as 00 00 00 06.
        assert_eq!(&buf[36..40], &[0x00, 0x00, 0x06, 0x00]);
        // Unused table slots are zero.
        assert!(buf[48..436].iter().all(|&b| b == 0));
        assert_eq!(&buf[436..438], &[0, 0]);
        assert_eq!(buf[438], Mode::Short as u8);
        assert_eq!(&buf[439..443], b"onet");
        assert_eq!(buf[471], NodeKind::File as u8);
        assert!(buf[472..].iter().all(|&b| b == 0));
    }

    #[test]
    fn root_parent_is_all_zero() {
        let header = Header::new("root", NodeKind::Directory);
        let buf = header.encode().unwrap();
        assert_eq!(&buf[24..28], &[0; 4]);
        assert_eq!(Header::decode(&buf, at()).unwrap().parent, None);
    }

    #[test]
    fn name_of_exactly_32_bytes_fits() {
        let name = "a".repeat(32);
        let header = Header::new(name.clone(), NodeKind::File);
        let decoded = Header::decode(&header.encode().unwrap(), at()).unwrap();
        assert_eq!(decoded.name, name);
    }

    #[test]
    fn name_over_32_bytes_is_rejected() {
        let header = Header::new("a".repeat(33), NodeKind::File);
        match header.encode() {
            Err(UstarError::NameTooLong { len: 33, .. }) => (),
            other => panic!("expected NameTooLong, got {:?}", other),
        }
    }

    #[test]
    fn decoding_unknown_type_fails() {
        let mut buf = sample_header().encode().unwrap();
        buf[471] = 7;
        assert!(matches!(
            Header::decode(&buf, at()),
            Err(UstarError::CorruptSector { .. })
        ));
    }

    #[test]
    fn mode_switches_above_one_hundred_blocks() {
        assert_eq!(Mode::for_blocks(0), Mode::Short);
        assert_eq!(Mode::for_blocks(100), Mode::Short);
        assert_eq!(Mode::for_blocks(101), Mode::Long);
    }

    #[test]
    fn records_round_trip() {
        let record = DirRecord::new("a.txt", Address::new(0, 2).unwrap());
        let buf = record.encode();
        // "a." swapped is ".a".
        assert_eq!(&buf[0..2], b".a");
        assert_eq!(&buf[28..32], &[0x00, 0x00, 0x03, 0x00]);
        assert_eq!(DirRecord::decode(&buf, at()).unwrap(), Some(record));
    }

    #[test]
    fn record_names_are_cut_to_28_bytes() {
        let record = DirRecord::new(&"x".repeat(31), Address::new(0, 1).unwrap());
        assert_eq!(record.name.len(), 28);
        let decoded = DirRecord::decode(&record.encode(), at()).unwrap().unwrap();
        assert_eq!(decoded.name, "x".repeat(28));
    }

    #[test]
    fn empty_record_slot_decodes_to_none() {
        assert_eq!(DirRecord::decode(&[0; 32], at()).unwrap(), None);
    }

    #[test]
    fn short_record_buffer_is_corrupt() {
        assert!(matches!(
            DirRecord::decode(&[1], at()),
            Err(UstarError::CorruptSector { .. })
        ));
    }
}
