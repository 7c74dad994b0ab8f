//! Resource packs and the resource filesystem for Nebula Engine.
//!
//! Packs (native NPCK files, packs embedded in an executable, or zip
//! archives) are mounted into a [`PackOverlay`]. The [`ResourceFs`] composite
//! serves `res://` paths from disk until the first pack is mounted and from
//! the overlay afterwards.

mod error;
mod fs;
mod overlay;
mod pack;
mod zip_pack;

pub use error::{FsError, PackError};
pub use fs::{DiskFs, FileSystem, RESOURCE_SCHEME, ResourceFs};
pub use overlay::{PackFormat, PackMount, PackOverlay};
pub use pack::{PACK_FORMAT_VERSION, PACK_MAGIC, PackBuilder};
