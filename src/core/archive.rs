//! `.tar.gz` extraction to a single destination file.
//!
//! Every entry in the archive is written to the same `destination`, which is
//! truncated per entry: only the content of the last entry survives. Dump
//! archives carry exactly one `.sql` file, which is what this is used for.

use std::fs::File;
use std::io;
use std::path::Path;

use flate2::read::MultiGzDecoder;
use serde::Serialize;
use tar::Archive;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Extracted {
    /// Number of archive entries written to the destination.
    pub entries: usize,
    /// Size of the destination after the last entry.
    pub bytes: u64,
}

pub fn extract_tar_gz(archive: &Path, destination: &Path) -> Result<Extracted> {
    let archive_name = archive.display().to_string();
    let destination_name = destination.display().to_string();

    let file = File::open(archive)
        .map_err(|e| Error::archive_failed("open", &archive_name, e.to_string()))?;

    let decoder = MultiGzDecoder::new(file);
    if decoder.header().is_none() {
        return Err(Error::archive_failed(
            "gzip header",
            &archive_name,
            "not a gzip stream",
        ));
    }

    let mut tar = Archive::new(decoder);
    let entries = tar
        .entries()
        .map_err(|e| Error::archive_failed("tar read", &archive_name, e.to_string()))?;

    let mut summary = Extracted {
        entries: 0,
        bytes: 0,
    };

    for entry in entries {
        let mut entry =
            entry.map_err(|e| Error::archive_failed("tar read", &archive_name, e.to_string()))?;

        let mut out = File::create(destination)
            .map_err(|e| Error::archive_failed("create", &destination_name, e.to_string()))?;
        log::info!("Create file {}", destination_name);

        summary.bytes = io::copy(&mut entry, &mut out)
            .map_err(|e| Error::archive_failed("copy", &destination_name, e.to_string()))?;
        summary.entries += 1;
    }

    log::info!(
        "Extracted {} entries from {} into {}",
        summary.entries,
        archive_name,
        destination_name
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn write_tar_gz(path: &Path, files: &[(&str, &[u8])]) {
        let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn single_entry_is_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("dump.tar.gz");
        let destination = dir.path().join("dump.sql");
        write_tar_gz(&archive, &[("intranet.sql", b"CREATE TABLE t (id INT);\n".as_slice())]);

        let extracted = extract_tar_gz(&archive, &destination).unwrap();

        assert_eq!(extracted.entries, 1);
        assert_eq!(
            std::fs::read_to_string(&destination).unwrap(),
            "CREATE TABLE t (id INT);\n"
        );
    }

    #[test]
    fn last_entry_overwrites_earlier_ones() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("multi.tar.gz");
        let destination = dir.path().join("dump.sql");
        write_tar_gz(
            &archive,
            &[
                ("first.sql", b"first entry, longer content".as_slice()),
                ("second.sql", b"second".as_slice()),
            ],
        );

        let extracted = extract_tar_gz(&archive, &destination).unwrap();

        assert_eq!(extracted.entries, 2);
        assert_eq!(extracted.bytes, 6);
        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "second");
    }

    #[test]
    fn tar_split_across_gzip_members_is_read() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("split.tar.gz");
        let destination = dir.path().join("dump.sql");

        let mut builder = tar::Builder::new(Vec::new());
        let data = b"SELECT 1;\n".as_slice();
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "dump.sql", data).unwrap();
        let tar_bytes = builder.into_inner().unwrap();

        // Header block in the first member, body and trailer in the second.
        let mut bytes = Vec::new();
        for part in [&tar_bytes[..512], &tar_bytes[512..]] {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(part).unwrap();
            bytes.extend(encoder.finish().unwrap());
        }
        std::fs::write(&archive, &bytes).unwrap();

        let extracted = extract_tar_gz(&archive, &destination).unwrap();

        assert_eq!(extracted.entries, 1);
        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "SELECT 1;\n");
    }

    #[test]
    fn missing_archive_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_tar_gz(&dir.path().join("none.tar.gz"), &dir.path().join("out"))
            .unwrap_err();

        assert_eq!(err.code.as_str(), "archive.failed");
        assert_eq!(err.details["operation"], "open");
    }

    #[test]
    fn non_gzip_archive_fails_on_header() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("plain.tar.gz");
        std::fs::write(&archive, b"plain text, no gzip magic").unwrap();

        let err = extract_tar_gz(&archive, &dir.path().join("out")).unwrap_err();

        assert_eq!(err.details["operation"], "gzip header");
    }
}
