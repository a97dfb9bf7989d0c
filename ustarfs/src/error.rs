use std::path::PathBuf;

use thiserror::Error;

use crate::addr::Address;

#[derive(Error, Debug)]
pub enum UstarError {
    #[error("no free sector left in any group")]
    OutOfSpace,
    #[error("name of {path:?} is {len} bytes, the limit is 32")]
    NameTooLong { path: PathBuf, len: usize },
    #[error("{path:?} is neither a regular file nor a directory")]
    UnrecognizedNodeKind { path: PathBuf },
    #[error("sector {sector} of group {group} was never allocated")]
    InvalidAddress { group: usize, sector: usize },
    #[error("{path:?} needs {blocks} blocks, more than long mode can address")]
    FileTooLarge { path: PathBuf, blocks: usize },
    #[error("name of {path:?} is not a valid single path component")]
    InvalidName { path: PathBuf },
    #[error("corrupt sector at {address}: {reason}")]
    CorruptSector { address: Address, reason: String },
    #[error("image is {len} bytes, expected exactly 8388608")]
    InvalidImage { len: usize },
    #[error("storage error")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, UstarError>;

impl UstarError {
    pub(crate) fn corrupt(address: Address, reason: impl Into<String>) -> Self {
        UstarError::CorruptSector {
            address,
            reason: reason.into(),
        }
    }
}
