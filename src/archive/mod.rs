//! Lazy access to remote package archives
//!
//! - [`zip`]: fixed-layout ZIP record parsing
//! - [`reader`]: range-read based listing and entry decompression

pub mod reader;
pub mod zip;

pub use reader::{ArchiveDirectory, EntryReader, RemoteArchiveReader};
pub use zip::{CompressionMethod, DirectoryEntry};
