use std::path::Path;

/// The sector number to access ranging from 0 (the first sector) to n - 1 (the
/// last sector) where n is number of sectors available.
pub type BlockNumber = usize;

/// Destination for a finished image: a file, a block device or anything else
/// addressable in 512 byte sectors.
pub trait BlockStorage {
    /// Opens an existing disk at the specified path. This method does not
    /// validate the content of the disk.
    fn open_disk<P: AsRef<Path>>(path: P, nblocks: usize) -> std::io::Result<Self>
    where
        Self: std::marker::Sized;
    /// Reads a sector into the provided buffer.
    ///
    /// # Errors
    ///
    /// Attempting to read a sector out of range will return an error.
    fn read_block(&mut self, blocknr: BlockNumber, buf: &mut [u8]) -> std::io::Result<()>;
    /// Writes the provided buffer into the specified sector.
    ///
    /// # Errors
    ///
    /// Attempting to write a sector out of range will return an error.
    fn write_block(&mut self, blocknr: BlockNumber, buf: &[u8]) -> std::io::Result<()>;
    /// Flush any buffered disk IO from memory.
    fn sync_disk(&mut self) -> std::io::Result<()>;
}
