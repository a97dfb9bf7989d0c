use crate::addr::Address;
use crate::error::{Result, UstarError};
use crate::layout::{Sector, GROUP_COUNT, GROUP_SECTORS, SECTOR_SIZE};

use log::trace;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

const FREE: u8 = 1;
const USED: u8 = 0;

#[derive(Debug, PartialEq)]
pub enum State {
    Free,
    Used,
}

/// The first sector of every LBA group.
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Clone, Copy)]
pub struct Bitmap {
    /// Unused index field, always written as zero.
    index: [u8; 2],
    /// One byte per data sector of the group: 1 while the sector is free and 0
    /// once it has been handed out.
    available: [u8; GROUP_SECTORS],
}

const _: () = assert!(std::mem::size_of::<Bitmap>() == SECTOR_SIZE);

impl Bitmap {
    pub fn new() -> Self {
        Self {
            index: [0; 2],
            available: [FREE; GROUP_SECTORS],
        }
    }

    pub fn parse(buf: &Sector) -> Self {
        let mut bmp = Self::new_zeroed();
        bmp.as_bytes_mut().copy_from_slice(buf);
        bmp
    }

    pub fn serialize(&self) -> &[u8] {
        self.as_bytes()
    }

    /// `None` past the last data sector of the group.
    pub fn get(&self, sector: usize) -> Option<State> {
        self.available.get(sector).map(|&b| match b {
            USED => State::Used,
            _ => State::Free,
        })
    }

    /// Only called with an index from `first_free`.
    pub(crate) fn set_reserved(&mut self, sector: usize) {
        self.available[sector] = USED;
    }

    /// Lowest numbered free sector, if any.
    pub fn first_free(&self) -> Option<usize> {
        self.available.iter().position(|&b| b != USED)
    }

    pub fn free_count(&self) -> usize {
        self.available.iter().filter(|&&b| b != USED).count()
    }
}

impl Default for Bitmap {
    fn default() -> Self {
        Self::new()
    }
}

/// A bitmap and the 510 data sectors it tracks.
pub struct LbaGroup {
    bitmap: Bitmap,
    sectors: Vec<Sector>,
}

impl LbaGroup {
    fn new() -> Self {
        Self {
            bitmap: Bitmap::new(),
            sectors: vec![[0; SECTOR_SIZE]; GROUP_SECTORS],
        }
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// Data sectors in index order. Sectors that were never written are zero.
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }
}

/// Hands out sectors for one build.
///
/// Allocation is first fit: groups are scanned in ascending order and within a
/// group sectors are scanned in ascending order. Nothing is ever freed, so two
/// builds of the same tree make the same sequence of calls and end up with the
/// same layout.
pub struct Allocator {
    groups: Vec<LbaGroup>,
    /// Groups before this one are known to be full.
    marker: usize,
}

impl Allocator {
    pub fn new() -> Self {
        Self {
            groups: (0..GROUP_COUNT).map(|_| LbaGroup::new()).collect(),
            marker: 0,
        }
    }

    /// Claims the next free sector.
    ///
    /// # Errors
    ///
    /// Returns [`UstarError::OutOfSpace`] once every group is full.
    pub fn allocate(&mut self) -> Result<Address> {
        while self.marker < GROUP_COUNT {
            let group = &mut self.groups[self.marker];
            if let Some(sector) = group.bitmap.first_free() {
                group.bitmap.set_reserved(sector);
                let addr = Address::at(self.marker, sector);
                trace!("allocated sector {}", addr);
                return Ok(addr);
            }
            self.marker += 1;
        }
        Err(UstarError::OutOfSpace)
    }

    pub fn is_allocated(&self, addr: Address) -> bool {
        self.groups[addr.group()].bitmap.get(addr.sector()) == Some(State::Used)
    }

    /// Replaces the content of an allocated sector.
    ///
    /// # Errors
    ///
    /// Writing to a sector that was never allocated returns
    /// [`UstarError::InvalidAddress`] and leaves the sector untouched.
    pub fn write(&mut self, addr: Address, buf: &Sector) -> Result<()> {
        self.check(addr)?;
        self.groups[addr.group()].sectors[addr.sector()].copy_from_slice(buf);
        Ok(())
    }

    pub fn read(&self, addr: Address) -> Result<&Sector> {
        self.check(addr)?;
        Ok(&self.groups[addr.group()].sectors[addr.sector()])
    }

    pub fn groups(&self) -> &[LbaGroup] {
        &self.groups
    }

    pub fn free_sectors(&self) -> usize {
        self.groups.iter().map(|g| g.bitmap.free_count()).sum()
    }

    fn check(&self, addr: Address) -> Result<()> {
        if self.is_allocated(addr) {
            Ok(())
        } else {
            Err(UstarError::InvalidAddress {
                group: addr.group(),
                sector: addr.sector(),
            })
        }
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}
