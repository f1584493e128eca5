//! Gallery publishing
//!
//! Moves completed recordings out of the working directory into durable,
//! user-visible shared storage.

pub mod publisher;
pub mod store;

pub use publisher::{display_name, GalleryPublisher};
pub use store::{file_uri, DirectoryMediaStore, EntryRequest, EntryWriter, GalleryEntry, MediaStore};
