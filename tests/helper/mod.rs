#![allow(dead_code)]

pub mod archive;
pub mod transport;

pub use archive::{NupkgBuilder, build_zip};
pub use transport::{InMemoryTransport, test_source};
