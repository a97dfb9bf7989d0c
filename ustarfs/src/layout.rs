//! Fixed geometry of a ustar image.
//!
//! # Layout
//! ===========================================================================
//! | Group 0                                  | Group 1 | ... | Group 31     |
//! | Bitmap | Sector 0 .. Sector 509 | Tail   |         |     |              |
//! ===========================================================================
//!
//! Every group is exactly 512 sectors on disk. Only the 510 sectors between the
//! bitmap and the tail sector are addressable.

/// Smallest unit of storage, every structure on disk is exactly one sector.
pub const SECTOR_SIZE: usize = 512;

/// Addressable data sectors in one LBA group.
pub const GROUP_SECTORS: usize = 510;

/// Number of LBA groups in an image.
pub const GROUP_COUNT: usize = 32;

/// On-disk footprint of a group: bitmap + data sectors + one tail sector.
pub const SECTORS_PER_GROUP: usize = GROUP_SECTORS + 2;

pub const GROUP_SIZE: usize = SECTORS_PER_GROUP * SECTOR_SIZE;

/// Sectors in a whole image, including bitmaps and tail padding.
pub const IMAGE_SECTORS: usize = GROUP_COUNT * SECTORS_PER_GROUP;

/// Size in bytes of every image, used or not.
pub const IMAGE_SIZE: usize = GROUP_COUNT * GROUP_SIZE;

/// Total addressable sectors across the image.
pub const TOTAL_SECTORS: usize = GROUP_COUNT * GROUP_SECTORS;

/// Number of entries in a header's block table. Payloads of up to this many
/// blocks are addressed directly.
pub const SHORT_MODE_LIMIT: usize = 100;

/// Encoded addresses held by one indirect sector.
pub const ADDRESSES_PER_INDIRECT: usize = SECTOR_SIZE / ADDRESS_SIZE;

/// Largest payload in blocks, reached when every table entry points at a full
/// indirect sector.
pub const LONG_MODE_LIMIT: usize = SHORT_MODE_LIMIT * ADDRESSES_PER_INDIRECT;

pub const ADDRESS_SIZE: usize = 4;

/// Bytes reserved for a node name inside its header.
pub const NAME_LEN: usize = 32;

/// A directory record is a 28 byte name followed by a 4 byte address.
pub const RECORD_SIZE: usize = 32;
pub const RECORD_NAME_LEN: usize = RECORD_SIZE - ADDRESS_SIZE;
pub const RECORDS_PER_SECTOR: usize = SECTOR_SIZE / RECORD_SIZE;

pub type Sector = [u8; SECTOR_SIZE];

/// Number of whole sectors needed to hold `len` bytes.
pub fn sectors_for(len: usize) -> usize {
    len.div_ceil(SECTOR_SIZE)
}
