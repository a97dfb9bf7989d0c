use std::fmt;

use crate::layout::{ADDRESS_SIZE, GROUP_COUNT, GROUP_SECTORS};

/// Location of one data sector: the LBA group it belongs to and its index
/// within that group.
///
/// On disk an address is 4 bytes: the group index as a big endian `u16`
/// followed by `sector + 1` as a big endian `u16`. Offsetting the sector keeps
/// the all-zero pattern free to mean "no address", which is how empty block
/// table slots and the root's parent are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    group: u16,
    sector: u16,
}

pub type RawAddress = [u8; ADDRESS_SIZE];

/// Encoding of a missing address.
pub const ABSENT: RawAddress = [0; ADDRESS_SIZE];

impl Address {
    /// Returns `None` if the pair falls outside the image geometry.
    pub fn new(group: usize, sector: usize) -> Option<Self> {
        if group < GROUP_COUNT && sector < GROUP_SECTORS {
            Some(Self {
                group: group as u16,
                sector: sector as u16,
            })
        } else {
            None
        }
    }

    /// For callers that already hold an in-range pair, such as the allocator.
    pub(crate) fn at(group: usize, sector: usize) -> Self {
        debug_assert!(group < GROUP_COUNT && sector < GROUP_SECTORS);
        Self {
            group: group as u16,
            sector: sector as u16,
        }
    }

    pub fn group(&self) -> usize {
        self.group as usize
    }

    pub fn sector(&self) -> usize {
        self.sector as usize
    }

    pub fn encode(&self) -> RawAddress {
        let [g_hi, g_lo] = self.group.to_be_bytes();
        let [s_hi, s_lo] = (self.sector + 1).to_be_bytes();
        [g_hi, g_lo, s_hi, s_lo]
    }

    /// Inverse of [`Address::encode`]. The absent sentinel and any pattern
    /// pointing outside the image decode to `None`.
    pub fn decode(raw: RawAddress) -> Option<Self> {
        let group = u16::from_be_bytes([raw[0], raw[1]]) as usize;
        let sector = u16::from_be_bytes([raw[2], raw[3]]) as usize;
        if sector == 0 {
            return None;
        }
        Address::new(group, sector - 1)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.group, self.sector)
    }
}

pub fn encode(addr: Option<Address>) -> RawAddress {
    addr.map_or(ABSENT, |a| a.encode())
}

/// Swaps the two bytes of every 2-byte unit in place.
///
/// Runs of addresses and name bytes inside header, directory and indirect
/// sectors are stored this way. The transform is its own inverse.
pub fn swap_pairs(buf: &mut [u8]) {
    debug_assert!(buf.len() % 2 == 0, "pair swap over odd length run");
    for pair in buf.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

/// Writes `addrs` as a contiguous pair-swapped run at the start of `out`.
/// Slots past the end of `addrs` are left untouched.
pub fn write_run<I>(addrs: I, out: &mut [u8])
where
    I: IntoIterator<Item = Option<Address>>,
{
    let mut written = 0;
    for (slot, addr) in out.chunks_exact_mut(ADDRESS_SIZE).zip(addrs) {
        slot.copy_from_slice(&encode(addr));
        written += ADDRESS_SIZE;
    }
    swap_pairs(&mut out[..written]);
}

/// Reads every 4 byte slot of a pair-swapped run.
pub fn read_run(run: &[u8]) -> Vec<Option<Address>> {
    run.chunks_exact(ADDRESS_SIZE)
        .map(|slot| {
            let mut raw = [slot[0], slot[1], slot[2], slot[3]];
            swap_pairs(&mut raw);
            Address::decode(raw)
        })
        .collect()
}
