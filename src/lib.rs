pub mod archive;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod resolver;
pub mod source;
pub mod transport;
pub mod version;
