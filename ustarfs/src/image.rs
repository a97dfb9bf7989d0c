use crate::alloc::Allocator;
use crate::error::{Result, UstarError};
use crate::io::BlockStorage;
use crate::layout::{IMAGE_SECTORS, IMAGE_SIZE, SECTOR_SIZE};
use crate::reader::ImageReader;

use log::info;

/// A complete, fixed size disk image.
#[derive(Clone, PartialEq)]
pub struct Image {
    bytes: Vec<u8>,
}

impl Image {
    /// Flattens every group in order: its bitmap, its 510 data sectors and a
    /// zeroed tail sector.
    pub fn assemble(alloc: &Allocator) -> Self {
        let mut bytes = Vec::with_capacity(IMAGE_SIZE);
        for group in alloc.groups() {
            bytes.extend_from_slice(group.bitmap().serialize());
            for sector in group.sectors() {
                bytes.extend_from_slice(sector);
            }
            bytes.extend_from_slice(&[0; SECTOR_SIZE]);
        }
        debug_assert_eq!(bytes.len(), IMAGE_SIZE);
        Self { bytes }
    }

    /// Wraps bytes produced elsewhere, for example read back from disk.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != IMAGE_SIZE {
            return Err(UstarError::InvalidImage { len: bytes.len() });
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn reader(&self) -> Result<ImageReader<'_>> {
        ImageReader::new(&self.bytes)
    }

    /// Writes every sector of the image to `dev` and syncs it.
    pub fn write_to<T: BlockStorage>(&self, dev: &mut T) -> Result<()> {
        for (blocknr, sector) in self.bytes.chunks(SECTOR_SIZE).enumerate() {
            dev.write_block(blocknr, sector)?;
        }
        dev.sync_disk()?;
        info!("wrote {} sectors", IMAGE_SECTORS);
        Ok(())
    }

    pub fn read_from<T: BlockStorage>(dev: &mut T) -> Result<Self> {
        let mut bytes = vec![0; IMAGE_SIZE];
        for (blocknr, sector) in bytes.chunks_mut(SECTOR_SIZE).enumerate() {
            dev.read_block(blocknr, sector)?;
        }
        Ok(Self { bytes })
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Address;
    use crate::io::FileDiskBuilder;
    use crate::layout::{GROUP_SIZE, SECTORS_PER_GROUP};

    #[test]
    fn empty_allocator_assembles_to_free_bitmaps_and_zeros() {
        let image = Image::assemble(&Allocator::new());
        let bytes = image.as_bytes();
        assert_eq!(bytes.len(), IMAGE_SIZE);

        for group in bytes.chunks(GROUP_SIZE) {
            assert_eq!(&group[0..2], &[0, 0]);
            assert!(group[2..SECTOR_SIZE].iter().all(|&b| b == 1));
            assert!(group[SECTOR_SIZE..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn data_sector_lands_after_group_bitmap() {
        let mut alloc = Allocator::new();
        let mut at = alloc.allocate().unwrap();
        while at != Address::new(2, 3).unwrap() {
            at = alloc.allocate().unwrap();
        }
        alloc.write(at, &[0x77; SECTOR_SIZE]).unwrap();

        let image = Image::assemble(&alloc);
        let offset = 2 * GROUP_SIZE + (1 + 3) * SECTOR_SIZE;
        assert!(image.as_bytes()[offset..offset + SECTOR_SIZE]
            .iter()
            .all(|&b| b == 0x77));
        // Group 2 bitmap marks sectors 0..=3 used.
        let bitmap = &image.as_bytes()[2 * GROUP_SIZE..2 * GROUP_SIZE + SECTOR_SIZE];
        assert_eq!(&bitmap[2..7], &[0, 0, 0, 0, 1]);
        // The tail sector of the group stays empty.
        let tail = 2 * GROUP_SIZE + (SECTORS_PER_GROUP - 1) * SECTOR_SIZE;
        assert!(image.as_bytes()[tail..tail + SECTOR_SIZE]
            .iter()
            .all(|&b| b == 0));
    }

    #[test]
    fn rejects_wrong_sized_buffers() {
        match Image::from_bytes(vec![0; 512]) {
            Err(UstarError::InvalidImage { len: 512 }) => (),
            other => panic!("expected InvalidImage, got {:?}", other),
        }
    }

    #[test]
    fn image_survives_trip_through_file_disk() {
        let mut alloc = Allocator::new();
        let at = alloc.allocate().unwrap();
        alloc.write(at, &[0x12; SECTOR_SIZE]).unwrap();
        let image = Image::assemble(&alloc);

        let mut disk = FileDiskBuilder::from(tempfile::tempfile().unwrap())
            .with_sector_count(IMAGE_SECTORS)
            .clear_medium(false)
            .build()
            .unwrap();
        image.write_to(&mut disk).unwrap();

        let read = Image::read_from(&mut disk).unwrap();
        assert!(read == image);
    }
}
