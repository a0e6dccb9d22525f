//! Fixed-layout ZIP records
//!
//! Only the subset needed for single-disk archives without a trailing comment
//! is understood. ZIP64 markers are rejected.

use crate::error::ArchiveError;

pub const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;
pub const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0201_4b50;
pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;

pub const END_OF_CENTRAL_DIRECTORY_LEN: u64 = 22;
pub const CENTRAL_DIRECTORY_HEADER_LEN: usize = 46;
pub const LOCAL_FILE_HEADER_LEN: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unsupported(u16),
}

impl From<u16> for CompressionMethod {
    fn from(code: u16) -> Self {
        match code {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            other => CompressionMethod::Unsupported(other),
        }
    }
}

impl CompressionMethod {
    pub fn code(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unsupported(code) => code,
        }
    }
}

/// One record of the central directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub full_path: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub local_header_offset: u32,
}

impl DirectoryEntry {
    /// Last path segment
    pub fn file_name(&self) -> &str {
        self.full_path
            .rsplit('/')
            .next()
            .unwrap_or(self.full_path.as_str())
    }

    pub fn is_directory(&self) -> bool {
        self.full_path.ends_with('/')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub entry_count: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Entry names use a single narrow encoding (Latin-1)
fn decode_name(raw: &[u8]) -> String {
    raw.iter().map(|&b| b as char).collect()
}

impl EndOfCentralDirectory {
    pub fn parse(buf: &[u8]) -> Result<Self, ArchiveError> {
        if buf.len() < END_OF_CENTRAL_DIRECTORY_LEN as usize {
            return Err(ArchiveError::Format(format!(
                "end of central directory truncated to {} bytes",
                buf.len()
            )));
        }

        if read_u32(buf, 0) != END_OF_CENTRAL_DIRECTORY_SIGNATURE {
            // Most likely the archive carries a trailing comment
            return Err(ArchiveError::Format(
                "end of central directory signature not found; \
                 archives with comments are not supported"
                    .to_string(),
            ));
        }

        let disk_number = read_u16(buf, 4);
        let directory_disk = read_u16(buf, 6);
        let entries_on_disk = read_u16(buf, 8);
        let entry_count = read_u16(buf, 10);
        let central_directory_size = read_u32(buf, 12);
        let central_directory_offset = read_u32(buf, 16);

        if disk_number != 0 || directory_disk != 0 || entries_on_disk != entry_count {
            return Err(ArchiveError::Format(
                "multi-disk archives are not supported".to_string(),
            ));
        }

        if entry_count == u16::MAX
            || central_directory_size == u32::MAX
            || central_directory_offset == u32::MAX
        {
            return Err(ArchiveError::Format(
                "ZIP64 archives are not supported".to_string(),
            ));
        }

        Ok(Self {
            entry_count,
            central_directory_size,
            central_directory_offset,
        })
    }
}

/// Walk exactly `entry_count` central directory records
pub fn parse_central_directory(
    buf: &[u8],
    entry_count: u16,
) -> Result<Vec<DirectoryEntry>, ArchiveError> {
    let mut entries = Vec::with_capacity(entry_count as usize);
    let mut cursor = 0usize;

    for index in 0..entry_count {
        let header_end = cursor + CENTRAL_DIRECTORY_HEADER_LEN;
        if header_end > buf.len() {
            return Err(ArchiveError::Format(format!(
                "central directory truncated at entry {}",
                index
            )));
        }

        if read_u32(buf, cursor) != CENTRAL_DIRECTORY_SIGNATURE {
            return Err(ArchiveError::Format(format!(
                "bad central directory signature at offset {}",
                cursor
            )));
        }

        let method = read_u16(buf, cursor + 10);
        let compressed_size = read_u32(buf, cursor + 20);
        let uncompressed_size = read_u32(buf, cursor + 24);
        let name_len = read_u16(buf, cursor + 28) as usize;
        let extra_len = read_u16(buf, cursor + 30) as usize;
        let comment_len = read_u16(buf, cursor + 32) as usize;
        let local_header_offset = read_u32(buf, cursor + 42);

        let name_end = header_end + name_len;
        if name_end > buf.len() {
            return Err(ArchiveError::Format(format!(
                "entry name truncated at entry {}",
                index
            )));
        }

        entries.push(DirectoryEntry {
            full_path: decode_name(&buf[header_end..name_end]),
            compression_method: CompressionMethod::from(method),
            compressed_size,
            uncompressed_size,
            local_header_offset,
        });

        cursor = header_end + name_len + extra_len + comment_len;
    }

    Ok(entries)
}

/// Returns the name and extra field lengths stored in a local file header
pub fn parse_local_header(buf: &[u8]) -> Result<(u16, u16), ArchiveError> {
    if buf.len() < LOCAL_FILE_HEADER_LEN as usize {
        return Err(ArchiveError::Format(format!(
            "local file header truncated to {} bytes",
            buf.len()
        )));
    }

    if read_u32(buf, 0) != LOCAL_FILE_HEADER_SIGNATURE {
        return Err(ArchiveError::Format(
            "bad local file header signature".to_string(),
        ));
    }

    Ok((read_u16(buf, 26), read_u16(buf, 28)))
}
