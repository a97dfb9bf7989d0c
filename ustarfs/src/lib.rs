//! Builds ustar disk images from a directory tree.
//!
//! An image is 32 LBA groups of 512 sectors each. The first sector of a group
//! is a bitmap of which of the following 510 sectors are in use; the last one is
//! padding. Every file or directory is a header sector followed by its payload,
//! addressed either directly from the header or through indirect sectors.
//!
//! ```no_run
//! use ustarfs::{build, Node};
//!
//! let tree = Node::from_path("./filesystem", "root")?;
//! let image = build(&tree)?;
//! std::fs::write("disk.img", image.as_bytes())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod addr;
pub mod alloc;
mod builder;
mod error;
mod image;
pub mod io;
pub mod layout;
pub mod node;
mod reader;
mod tree;

pub use crate::addr::Address;
pub use crate::builder::{build, Builder};
pub use crate::error::{Result, UstarError};
pub use crate::image::Image;
pub use crate::node::{DirRecord, Header, Mode, NodeKind};
pub use crate::reader::{ImageReader, Stats};
pub use crate::tree::Node;
