//! Object storage client.
//!
//! [`ObjectStorage`] describes a flat-namespace store with B2 semantics:
//! session-based authentication, one-time upload slots with SHA1 integrity
//! checks, cursor-paged listings and delimiter-based folder emulation.
//! [`B2Client`] talks to the Backblaze B2 native API.

mod b2;
mod config;
mod error;
mod traits;
mod types;

pub use b2::B2Client;
pub use config::StorageConfig;
pub use error::StorageError;
pub use traits::ObjectStorage;
pub use types::{
    content_type_for, matches_video_suffix, FileInfo, FileListPage, FolderListing, StorageSession,
    UploadSlot, LIST_PAGE_SIZE, VIDEO_SUFFIXES,
};
