//! Random access to a ZIP archive through HTTP range reads
//!
//! Listing an archive costs three range requests (length probe, end of central
//! directory, central directory) and is cached per URL. Opening an entry costs
//! two more: the local header and the compressed payload.

use std::io::{self, Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use flate2::read::DeflateDecoder;
use tracing::{debug, info};

use crate::archive::zip::{
    CompressionMethod, DirectoryEntry, END_OF_CENTRAL_DIRECTORY_LEN, EndOfCentralDirectory,
    LOCAL_FILE_HEADER_LEN, parse_central_directory, parse_local_header,
};
use crate::cache::MemoizingCache;
use crate::error::ArchiveError;
use crate::transport::Transport;

/// Directory listing of one remote archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDirectory {
    pub url: String,
    pub length: u64,
    pub entries: Vec<DirectoryEntry>,
}

impl ArchiveDirectory {
    pub fn find(&self, full_path: &str) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|e| e.full_path == full_path)
    }
}

/// Decompressed byte stream of one archive entry
pub enum EntryReader {
    Stored(Cursor<Bytes>),
    Deflate(Box<DeflateDecoder<Cursor<Bytes>>>),
}

impl Read for EntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            EntryReader::Stored(inner) => inner.read(buf),
            EntryReader::Deflate(inner) => inner.read(buf),
        }
    }
}

pub struct RemoteArchiveReader {
    transport: Arc<dyn Transport>,
    directories: MemoizingCache<String, Arc<ArchiveDirectory>>,
}

impl RemoteArchiveReader {
    /// Creates a reader that keeps archive listings for `listing_ttl`
    pub fn new(transport: Arc<dyn Transport>, listing_ttl: Duration) -> Self {
        Self {
            transport,
            directories: MemoizingCache::new(listing_ttl),
        }
    }

    /// Forget the cached listing of `url`
    pub fn invalidate(&self, url: &str) {
        self.directories.invalidate(&url.to_string());
    }

    pub fn purge_expired(&self) {
        self.directories.purge_expired();
    }

    /// Range read that fails unless exactly `length` bytes come back
    async fn read_exact(&self, url: &str, offset: u64, length: u64) -> Result<Bytes, ArchiveError> {
        let response = self.transport.get_range(url, offset, length).await?;
        if response.bytes.len() as u64 != length {
            return Err(ArchiveError::Format(format!(
                "expected {} bytes at offset {}, got {}",
                length,
                offset,
                response.bytes.len()
            )));
        }
        Ok(response.bytes)
    }

    /// List the entries of the archive at `url`
    pub async fn list_entries(&self, url: &str) -> Result<Arc<ArchiveDirectory>, ArchiveError> {
        self.directories
            .get_or_try_insert_with(url.to_string(), || async {
                self.fetch_directory(url).await.map(Arc::new)
            })
            .await
    }

    async fn fetch_directory(&self, url: &str) -> Result<ArchiveDirectory, ArchiveError> {
        // The 2-byte probe exists only to learn the total length
        let probe = self.transport.get_range(url, 0, 2).await?;
        let length = probe.total_length;

        if length < END_OF_CENTRAL_DIRECTORY_LEN {
            return Err(ArchiveError::Format(format!(
                "archive of {} bytes is too small",
                length
            )));
        }

        let trailer = self
            .read_exact(
                url,
                length - END_OF_CENTRAL_DIRECTORY_LEN,
                END_OF_CENTRAL_DIRECTORY_LEN,
            )
            .await?;
        let eocd = EndOfCentralDirectory::parse(&trailer)?;

        let directory_offset = eocd.central_directory_offset as u64;
        let directory_size = eocd.central_directory_size as u64;
        if directory_offset + directory_size > length - END_OF_CENTRAL_DIRECTORY_LEN {
            return Err(ArchiveError::Format(format!(
                "central directory at {}+{} lies outside an archive of {} bytes",
                directory_offset, directory_size, length
            )));
        }

        let entries = if eocd.entry_count == 0 {
            Vec::new()
        } else {
            let directory = self
                .read_exact(url, directory_offset, directory_size)
                .await?;
            parse_central_directory(&directory, eocd.entry_count)?
        };

        info!("Listed {} entries in {} ({} bytes)", entries.len(), url, length);

        Ok(ArchiveDirectory {
            url: url.to_string(),
            length,
            entries,
        })
    }

    /// Open one entry as a decompressed stream
    pub async fn open_entry(
        &self,
        url: &str,
        entry: &DirectoryEntry,
    ) -> Result<EntryReader, ArchiveError> {
        let method = entry.compression_method;
        if let CompressionMethod::Unsupported(code) = method {
            return Err(ArchiveError::UnsupportedCompression {
                method: code,
                path: entry.full_path.clone(),
            });
        }

        let header_offset = entry.local_header_offset as u64;
        let header = self
            .read_exact(url, header_offset, LOCAL_FILE_HEADER_LEN)
            .await?;
        // Local name/extra lengths may differ from the central directory copy
        let (name_len, extra_len) = parse_local_header(&header)?;
        let data_start = header_offset + LOCAL_FILE_HEADER_LEN + name_len as u64 + extra_len as u64;

        debug!(
            "Opening {} ({} compressed bytes at {})",
            entry.full_path, entry.compressed_size, data_start
        );

        let data = if entry.compressed_size == 0 {
            Bytes::new()
        } else {
            self.read_exact(url, data_start, entry.compressed_size as u64)
                .await?
        };

        Ok(match method {
            CompressionMethod::Deflate => {
                EntryReader::Deflate(Box::new(DeflateDecoder::new(Cursor::new(data))))
            }
            _ => EntryReader::Stored(Cursor::new(data)),
        })
    }

    /// Open an entry and read it fully
    pub async fn read_entry(
        &self,
        url: &str,
        entry: &DirectoryEntry,
    ) -> Result<Vec<u8>, ArchiveError> {
        let mut reader = self.open_entry(url, entry).await?;
        let mut buf = Vec::with_capacity(entry.uncompressed_size as usize);
        reader.read_to_end(&mut buf).map_err(|e| {
            ArchiveError::Format(format!("failed to inflate {}: {}", entry.full_path, e))
        })?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::zip::{
        CENTRAL_DIRECTORY_SIGNATURE, END_OF_CENTRAL_DIRECTORY_SIGNATURE,
        LOCAL_FILE_HEADER_SIGNATURE,
    };
    use crate::error::TransportError;
    use crate::transport::{MockTransport, RangeResponse};

    /// Serves a fixed byte buffer with range semantics
    fn serving(archive: Vec<u8>) -> MockTransport {
        let archive = Bytes::from(archive);
        let mut transport = MockTransport::new();
        transport
            .expect_get_range()
            .returning(move |_, offset, length| {
                let total = archive.len() as u64;
                let start = offset.min(total) as usize;
                let stop = (offset + length).min(total) as usize;
                Ok(RangeResponse {
                    bytes: archive.slice(start..stop),
                    total_length: total,
                })
            });
        transport
    }

    /// Stored entry whose local header carries a longer extra field than the
    /// central directory copy
    fn archive_with_local_extra(payload: &[u8]) -> Vec<u8> {
        let name = b"content/readme.txt";
        let local_extra = [0xAAu8; 9];
        let mut buf = Vec::new();

        buf.extend_from_slice(&LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes());
        buf.extend_from_slice(&[20, 0, 0, 0, 0, 0]); // version, flags, method
        buf.extend_from_slice(&[0u8; 8]); // time, date, crc
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(local_extra.len() as u16).to_le_bytes());
        buf.extend_from_slice(name);
        buf.extend_from_slice(&local_extra);
        buf.extend_from_slice(payload);

        let directory_offset = buf.len() as u32;
        buf.extend_from_slice(&CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
        buf.extend_from_slice(&[20, 0, 20, 0, 0, 0, 0, 0]); // made by, needed, flags, method
        buf.extend_from_slice(&[0u8; 8]); // time, date, crc
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes()); // no extra here
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&[0u8; 8]); // disk, internal, external attrs
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(name);
        let directory_size = buf.len() as u32 - directory_offset;

        buf.extend_from_slice(&END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
        buf.extend_from_slice(&[0, 0, 0, 0, 1, 0, 1, 0]);
        buf.extend_from_slice(&directory_size.to_le_bytes());
        buf.extend_from_slice(&directory_offset.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf
    }

    #[tokio::test]
    async fn open_entry_uses_local_header_field_lengths() {
        let archive = archive_with_local_extra(b"hello from the archive");
        let reader = RemoteArchiveReader::new(Arc::new(serving(archive)), Duration::from_secs(60));

        let directory = reader.list_entries("mem://a.nupkg").await.unwrap();
        assert_eq!(directory.entries.len(), 1);

        let bytes = reader
            .read_entry("mem://a.nupkg", &directory.entries[0])
            .await
            .unwrap();

        assert_eq!(bytes, b"hello from the archive");
    }

    #[tokio::test]
    async fn list_entries_rejects_archive_with_trailing_comment() {
        let mut archive = archive_with_local_extra(b"x");
        let len = archive.len();
        archive[len - 2..].copy_from_slice(&4u16.to_le_bytes());
        archive.extend_from_slice(b"note");

        let reader = RemoteArchiveReader::new(Arc::new(serving(archive)), Duration::from_secs(60));

        assert!(matches!(
            reader.list_entries("mem://c.nupkg").await,
            Err(ArchiveError::Format(_))
        ));
    }

    #[tokio::test]
    async fn list_entries_rejects_tiny_archive() {
        let transport = Arc::new(serving(vec![b'P', b'K', 3, 4]));
        let reader = RemoteArchiveReader::new(transport, Duration::from_secs(60));

        assert!(matches!(
            reader.list_entries("mem://tiny").await,
            Err(ArchiveError::Format(_))
        ));
    }

    #[tokio::test]
    async fn open_entry_rejects_unsupported_compression_without_network() {
        let mut transport = MockTransport::new();
        transport.expect_get_range().times(0);
        let reader = RemoteArchiveReader::new(Arc::new(transport), Duration::from_secs(60));

        let entry = DirectoryEntry {
            full_path: "lib/net45/A.dll".to_string(),
            compression_method: CompressionMethod::Unsupported(14),
            compressed_size: 10,
            uncompressed_size: 10,
            local_header_offset: 0,
        };

        assert!(matches!(
            reader.open_entry("mem://a", &entry).await,
            Err(ArchiveError::UnsupportedCompression { method: 14, .. })
        ));
    }

    #[tokio::test]
    async fn transport_failures_surface_without_retry() {
        let mut transport = MockTransport::new();
        transport.expect_get_range().times(1).returning(|url, _, _| {
            Err(TransportError::Status {
                status: 503,
                url: url.to_string(),
            })
        });
        let reader = RemoteArchiveReader::new(Arc::new(transport), Duration::from_secs(60));

        assert!(matches!(
            reader.list_entries("mem://down").await,
            Err(ArchiveError::Transport(TransportError::Status { status: 503, .. }))
        ));
    }

    #[tokio::test]
    async fn list_entries_is_cached_per_url() {
        let archive = Bytes::from(archive_with_local_extra(b"cached"));
        let mut transport = MockTransport::new();
        // probe + trailer + central directory, once
        transport
            .expect_get_range()
            .times(3)
            .returning(move |_, offset, length| {
                let total = archive.len() as u64;
                let stop = (offset + length).min(total) as usize;
                Ok(RangeResponse {
                    bytes: archive.slice(offset as usize..stop),
                    total_length: total,
                })
            });
        let reader = RemoteArchiveReader::new(Arc::new(transport), Duration::from_secs(60));

        let first = reader.list_entries("mem://a").await.unwrap();
        let second = reader.list_entries("mem://a").await.unwrap();

        assert_eq!(first, second);
    }
}
