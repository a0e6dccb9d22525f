mod helper;

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use zip::CompressionMethod as ZipMethod;

use helper::{InMemoryTransport, build_zip};
use package_lens::archive::{CompressionMethod, RemoteArchiveReader};
use package_lens::error::ArchiveError;

const URL: &str = "mem://archives/sample.zip";

fn reader_for(archive: Vec<u8>) -> (Arc<InMemoryTransport>, RemoteArchiveReader) {
    let transport = Arc::new(InMemoryTransport::new().with_file(URL, archive));
    let reader = RemoteArchiveReader::new(transport.clone(), Duration::from_secs(60));
    (transport, reader)
}

fn sample() -> Vec<u8> {
    let repeated = "widgets ".repeat(200);
    build_zip(&[
        ("Sample.nuspec", b"<package />".as_slice(), ZipMethod::Stored),
        ("lib/net45/Sample.dll", repeated.as_bytes(), ZipMethod::Deflated),
        ("content/empty.txt", b"".as_slice(), ZipMethod::Stored),
    ])
}

#[tokio::test]
async fn list_entries_returns_exact_names_and_sizes() {
    let (transport, reader) = reader_for(sample());

    let directory = reader.list_entries(URL).await.unwrap();

    let listed: Vec<_> = directory
        .entries
        .iter()
        .map(|e| (e.full_path.as_str(), e.compression_method, e.uncompressed_size))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("Sample.nuspec", CompressionMethod::Stored, 11),
            ("lib/net45/Sample.dll", CompressionMethod::Deflate, 1600),
            ("content/empty.txt", CompressionMethod::Stored, 0),
        ]
    );
    assert!(directory.entries[1].compressed_size < 1600);
    assert_eq!(directory.length, sample().len() as u64);
    // length probe, end of central directory, central directory
    assert_eq!(transport.range_requests(), 3);
}

#[tokio::test]
async fn open_entry_round_trips_stored_and_deflated_content() {
    let (transport, reader) = reader_for(sample());
    let directory = reader.list_entries(URL).await.unwrap();
    let before = transport.range_requests();

    let mut nuspec = String::new();
    reader
        .open_entry(URL, directory.find("Sample.nuspec").unwrap())
        .await
        .unwrap()
        .read_to_string(&mut nuspec)
        .unwrap();
    let assembly = reader
        .read_entry(URL, directory.find("lib/net45/Sample.dll").unwrap())
        .await
        .unwrap();

    assert_eq!(nuspec, "<package />");
    assert_eq!(assembly, "widgets ".repeat(200).into_bytes());
    // local header + payload per entry
    assert_eq!(transport.range_requests() - before, 4);
}

#[tokio::test]
async fn open_entry_reads_empty_entries() {
    let (_, reader) = reader_for(sample());
    let directory = reader.list_entries(URL).await.unwrap();

    let contents = reader
        .read_entry(URL, directory.find("content/empty.txt").unwrap())
        .await
        .unwrap();

    assert!(contents.is_empty());
}

#[tokio::test]
async fn list_entries_is_cached_until_invalidated() {
    let (transport, reader) = reader_for(sample());

    reader.list_entries(URL).await.unwrap();
    reader.list_entries(URL).await.unwrap();
    assert_eq!(transport.range_requests(), 3);

    reader.invalidate(URL);
    reader.list_entries(URL).await.unwrap();
    assert_eq!(transport.range_requests(), 6);
}

#[tokio::test]
async fn list_entries_rejects_bad_end_of_central_directory_magic() {
    let mut archive = sample();
    let eocd = archive.len() - 22;
    archive[eocd] = b'X';
    let (_, reader) = reader_for(archive);

    let result = reader.list_entries(URL).await;

    assert!(matches!(result, Err(ArchiveError::Format(_))));
}

#[tokio::test]
async fn list_entries_rejects_archive_with_comment() {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer.set_comment("signed by tests");
    writer
        .start_file("a.txt", zip::write::SimpleFileOptions::default())
        .unwrap();
    let archive = writer.finish().unwrap().into_inner();
    let (_, reader) = reader_for(archive);

    assert!(matches!(
        reader.list_entries(URL).await,
        Err(ArchiveError::Format(_))
    ));
}

#[tokio::test]
async fn list_entries_surfaces_transport_errors() {
    let transport = Arc::new(InMemoryTransport::new());
    let reader = RemoteArchiveReader::new(transport, Duration::from_secs(60));

    let result = reader.list_entries("mem://archives/missing.zip").await;

    assert!(matches!(result, Err(ArchiveError::Transport(_))));
}
