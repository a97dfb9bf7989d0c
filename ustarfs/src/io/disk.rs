use crate::io::{BlockNumber, BlockStorage};
use crate::layout::SECTOR_SIZE;

use std::fs::{File, OpenOptions};
use std::io::prelude::*;
use std::io::{BufWriter, ErrorKind, SeekFrom};
use std::path::Path;

/// Sector storage backed by a regular file or a block device.
pub struct FileDisk {
    /// The file must be a fixed-size file some exact multiple of the sector size.
    fd: File,
    /// The total number of sectors available in the file.
    block_count: usize,
}

impl FileDisk {
    /// Returns ownership of the underlying file descriptor to the caller.
    pub fn into_file(self) -> File {
        self.fd
    }

    fn check_range(&self, blocknr: BlockNumber) -> std::io::Result<()> {
        if blocknr >= self.block_count {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "sector out of range",
            ));
        }
        Ok(())
    }
}

impl BlockStorage for FileDisk {
    fn open_disk<P: AsRef<Path>>(dest: P, nblocks: usize) -> std::io::Result<Self>
    where
        Self: std::marker::Sized,
    {
        // Return error if the file does not exist rather than create one.
        let file = OpenOptions::new().read(true).write(true).open(dest)?;
        Ok(FileDisk {
            fd: file,
            block_count: nblocks,
        })
    }

    fn read_block(&mut self, blocknr: BlockNumber, buf: &mut [u8]) -> std::io::Result<()> {
        self.check_range(blocknr)?;
        if buf.len() < SECTOR_SIZE {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "buffer does not contain enough space to read sector",
            ));
        }
        self.fd
            .seek(SeekFrom::Start((blocknr * SECTOR_SIZE) as u64))?;
        self.fd.read_exact(&mut buf[..SECTOR_SIZE])
    }

    /// Writes at most one sector, longer buffers are truncated.
    fn write_block(&mut self, blocknr: BlockNumber, buf: &[u8]) -> std::io::Result<()> {
        self.check_range(blocknr)?;
        self.fd
            .seek(SeekFrom::Start((blocknr * SECTOR_SIZE) as u64))?;

        let max = buf.len().min(SECTOR_SIZE);
        self.fd.write_all(&buf[..max])
    }

    fn sync_disk(&mut self) -> std::io::Result<()> {
        self.fd.sync_all()
    }
}

pub struct FileDiskBuilder {
    fd: File,
    block_count: usize,
    clear: bool,
}

impl From<File> for FileDiskBuilder {
    fn from(fd: File) -> Self {
        FileDiskBuilder {
            fd,
            block_count: 0,
            clear: true,
        }
    }
}

impl FileDiskBuilder {
    /// Sets the number of sectors in the disk.
    pub fn with_sector_count(mut self, sectors: usize) -> Self {
        self.block_count = sectors;
        self
    }

    /// Whether to zero the whole disk before handing it out. Defaults to true.
    pub fn clear_medium(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    /// This builder takes ownership of the file descriptor and, unless told
    /// otherwise, overwrites it with zeros.
    pub fn build(mut self) -> std::io::Result<FileDisk> {
        debug_assert!(self.block_count > 0);
        if self.clear {
            self.zero_blocks()?;
        }
        Ok(FileDisk {
            fd: self.fd,
            block_count: self.block_count,
        })
    }

    fn zero_blocks(&mut self) -> std::io::Result<()> {
        self.fd.seek(SeekFrom::Start(0))?;
        let mut bfd = BufWriter::new(&self.fd);
        // Buffer each write to prevent excessive syscalls.
        let zeros = [0x00; SECTOR_SIZE];
        for _ in 0..self.block_count {
            bfd.write_all(&zeros)?;
        }
        bfd.flush()
    }
}
