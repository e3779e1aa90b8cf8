//! Streaming gzip decompression into a file.
//!
//! A scoped producer thread decodes the source into a [`bridge`] while the
//! calling thread copies from the bridge into the destination, so decoding
//! and disk writes overlap and memory stays bounded by the bridge capacity.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::thread;

use flate2::read::MultiGzDecoder;

use crate::bridge::{bridge, DEFAULT_CAPACITY};
use crate::error::{Error, Result};

#[cfg(unix)]
const DESTINATION_MODE: u32 = 0o660;

/// Decompress the gzip file at `source`, appending the decoded bytes to
/// `destination` (created if missing). Returns the number of bytes written.
/// Concatenated gzip members are decoded one after another.
///
/// Fails before any decoding starts when either file cannot be opened; a
/// missing source therefore never creates the destination.
pub fn gunzip_file(source: &Path, destination: &Path) -> Result<u64> {
    let src = File::open(source).map_err(|e| {
        Error::internal_io(
            format!("failed to open file {} for unpack: {}", source.display(), e),
            Some("open source".to_string()),
        )
    })?;

    let mut dst = open_append(destination).map_err(|e| {
        Error::internal_io(
            format!(
                "failed to create destination file {} for unpack: {}",
                destination.display(),
                e
            ),
            Some("create destination".to_string()),
        )
    })?;

    log::info!(
        "Unpacking {} into {}",
        source.display(),
        destination.display()
    );

    let (mut writer, reader) = bridge(DEFAULT_CAPACITY);

    thread::scope(|scope| {
        let producer = scope.spawn(move || {
            let mut decoder = MultiGzDecoder::new(src);
            // `writer` drops when this closure returns, closing the bridge.
            io::copy(&mut decoder, &mut writer)
        });

        let mut reader = reader;
        let copied = io::copy(&mut reader, &mut dst);
        // Unblocks the producer if we stopped reading early.
        drop(reader);

        let produced = producer.join();

        match (copied, produced) {
            (Err(e), _) => Err(Error::internal_io(
                format!("failed to write {}: {}", destination.display(), e),
                Some("copy".to_string()),
            )),
            (Ok(_), Err(_)) => Err(Error::internal_unexpected("gzip decoder thread panicked")),
            (Ok(_), Ok(Err(e))) => Err(Error::archive_failed(
                "gzip decode",
                source.display().to_string(),
                e.to_string(),
            )),
            (Ok(written), Ok(Ok(_))) => {
                log::info!("Unpacked {} bytes into {}", written, destination.display());
                Ok(written)
            }
        }
    })
}

fn open_append(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(DESTINATION_MODE);
    }

    options.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_gzip(path: &Path, data: &[u8]) {
        let file = File::create(path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn decompressed_file_matches_original() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("dump.sql.gz");
        let destination = dir.path().join("dump.sql");

        let original: Vec<u8> = (0..200_000u32)
            .flat_map(|i| format!("INSERT INTO t VALUES ({});\n", i).into_bytes())
            .collect();
        write_gzip(&source, &original);

        let written = gunzip_file(&source, &destination).unwrap();

        assert_eq!(written, original.len() as u64);
        assert_eq!(std::fs::read(&destination).unwrap(), original);
    }

    #[test]
    fn concatenated_members_are_all_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("multi.sql.gz");
        let destination = dir.path().join("multi.sql");

        let mut bytes = Vec::new();
        for part in ["CREATE TABLE a;\n", "INSERT INTO a VALUES (1);\n"] {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(part.as_bytes()).unwrap();
            bytes.extend(encoder.finish().unwrap());
        }
        std::fs::write(&source, &bytes).unwrap();

        let written = gunzip_file(&source, &destination).unwrap();

        let expected = "CREATE TABLE a;\nINSERT INTO a VALUES (1);\n";
        assert_eq!(written, expected.len() as u64);
        assert_eq!(std::fs::read_to_string(&destination).unwrap(), expected);
    }

    #[test]
    fn destination_is_appended_to() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("part.gz");
        let destination = dir.path().join("out.sql");

        std::fs::write(&destination, b"-- header\n").unwrap();
        write_gzip(&source, b"SELECT 1;\n");

        gunzip_file(&source, &destination).unwrap();

        assert_eq!(
            std::fs::read_to_string(&destination).unwrap(),
            "-- header\nSELECT 1;\n"
        );
    }

    #[test]
    fn missing_source_names_path_and_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("absent.sql.gz");
        let destination = dir.path().join("out.sql");

        let err = gunzip_file(&source, &destination).unwrap_err();

        assert_eq!(err.code.as_str(), "internal.io_error");
        assert!(err.details["error"]
            .as_str()
            .unwrap()
            .contains(&source.display().to_string()));
        assert!(!destination.exists());
    }

    #[test]
    fn corrupt_source_reports_decoder_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.gz");
        let destination = dir.path().join("out.sql");
        std::fs::write(&source, b"this is not gzip data").unwrap();

        let err = gunzip_file(&source, &destination).unwrap_err();

        assert_eq!(err.code.as_str(), "archive.failed");
    }

    #[test]
    fn unwritable_destination_fails_before_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("dump.gz");
        write_gzip(&source, b"data");

        let destination = dir.path().join("missing-dir").join("out.sql");
        let err = gunzip_file(&source, &destination).unwrap_err();

        assert_eq!(err.details["context"], "create destination");
    }
}
