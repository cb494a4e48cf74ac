//! OFD package access.
//!
//! An OFD document is a ZIP package of XML parts and resources. Trust
//! operations never edit the package in place: they unpack it into a
//! [`Workspace`], work on plain files, and repack the result.

mod path;
mod workspace;

pub use path::ContainerPath;
pub use workspace::{write_atomic, Workspace};
