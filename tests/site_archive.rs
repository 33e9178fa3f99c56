//! End-to-end checks against a fixture web site archive.

mod common;

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::sync::Arc;
use tempfile::TempDir;

use tarindex::{ArchiveIndex, EntryReader, Error, FileType, IndexOptions};

use common::{GL_UTILS_JS, TOP_JPG_OFFSET, TOP_JPG_SIZE};

#[test]
fn locates_known_entries() -> Result<()> {
    let dir = TempDir::new()?;
    let archive = common::site_archive(dir.path());

    let index = ArchiveIndex::build(&archive).context("Failed to index fixture")?;

    assert_eq!(index.size(), common::FILES.len());
    let top = index.get("images/top.jpg").context("top.jpg not indexed")?;
    assert_eq!(top.name(), "images/top.jpg");
    assert_eq!(top.size(), TOP_JPG_SIZE);
    assert_eq!(top.data_offset(), TOP_JPG_OFFSET);
    assert_eq!(top.file_type(), FileType::Normal);
    assert!(index.get("scripts/glUtils.js").is_some());
    Ok(())
}

#[test]
fn reads_text_entry() -> Result<()> {
    let dir = TempDir::new()?;
    let archive = common::site_archive(dir.path());
    let index = ArchiveIndex::build(&archive)?;

    let header = index
        .get("scripts/glUtils.js")
        .context("glUtils.js not indexed")?;
    let mut reader = EntryReader::open(header, &archive)?;
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    reader.close();

    assert_eq!(text, GL_UTILS_JS);
    Ok(())
}

#[test]
fn reads_binary_entry() -> Result<()> {
    let dir = TempDir::new()?;
    let archive = common::site_archive(dir.path());
    let index = ArchiveIndex::build(&archive)?;

    let mut reader = index
        .open_entry("images/top.jpg")?
        .context("top.jpg not indexed")?;
    assert_eq!(reader.read_to_vec()?, common::top_jpg());
    Ok(())
}

#[test]
fn links_and_directories_are_not_indexed() -> Result<()> {
    let dir = TempDir::new()?;
    let index = ArchiveIndex::build(common::site_archive(dir.path()))?;

    for path in ["scripts/", "images/", "css/", "images/logo.jpg", "images/copy.jpg"] {
        assert!(index.get(path).is_none(), "{path} should not be indexed");
    }
    assert!(index.get("does/not/exist.txt").is_none());
    Ok(())
}

#[test]
fn snapshot_roundtrip() -> Result<()> {
    let dir = TempDir::new()?;
    let archive = common::site_archive(dir.path());
    let index = ArchiveIndex::build(&archive)?;

    let snapshot = dir.path().join("test.tar.idx");
    index.save(&snapshot)?;
    let restored = ArchiveIndex::load(&snapshot)?;

    assert_eq!(restored.size(), index.size());
    assert_eq!(restored.last_modified(), index.last_modified());
    assert_eq!(restored.archive_path(), index.archive_path());
    for name in common::FILES {
        assert_eq!(restored.get(name), index.get(name), "{name}");
    }

    // The restored index reads content without rescanning
    let mut reader = restored
        .open_entry("scripts/glUtils.js")?
        .context("glUtils.js missing after load")?;
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    assert_eq!(text, GL_UTILS_JS);
    Ok(())
}

#[test]
fn truncated_archive_lenient_and_strict() -> Result<()> {
    let dir = TempDir::new()?;
    let archive = common::site_archive(dir.path());

    // Cut the archive off in the middle of top.jpg
    OpenOptions::new()
        .write(true)
        .open(&archive)?
        .set_len(TOP_JPG_OFFSET + 1000)?;

    let partial = ArchiveIndex::build(&archive)?;
    assert_eq!(partial.size(), 3);
    assert!(partial.get("images/top.jpg").is_none());
    assert!(partial.get("images/background.png").is_some());
    for record in partial.entries() {
        assert!(record.end_offset() <= TOP_JPG_OFFSET + 1000);
    }

    let err = ArchiveIndex::build_with(&archive, IndexOptions::strict()).unwrap_err();
    assert!(
        matches!(err, Error::Truncated { ref name, .. } if name == "images/top.jpg"),
        "{err:?}"
    );
    Ok(())
}

#[test]
fn strict_mode_accepts_well_formed_archive() -> Result<()> {
    let dir = TempDir::new()?;
    let archive = common::site_archive(dir.path());

    let lenient = ArchiveIndex::build(&archive)?;
    let strict = ArchiveIndex::build_with(&archive, IndexOptions::strict())?;
    assert_eq!(lenient, strict);
    Ok(())
}

#[test]
fn concurrent_readers_share_index() -> Result<()> {
    let dir = TempDir::new()?;
    let archive = common::site_archive(dir.path());
    let index = Arc::new(ArchiveIndex::build(&archive)?);
    let expected = common::top_jpg();

    std::thread::scope(|scope| {
        for worker in 0..4u64 {
            let index = Arc::clone(&index);
            let expected = &expected;
            scope.spawn(move || {
                let mut reader = index
                    .open_entry("images/top.jpg")
                    .unwrap()
                    .unwrap();
                let skip = worker * 10_000;
                assert_eq!(reader.skip(skip as i64).unwrap(), skip);
                let rest = reader.read_to_vec().unwrap();
                assert_eq!(rest, &expected[skip as usize..]);
            });
        }
    });
    Ok(())
}

#[test]
fn missing_archive_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = ArchiveIndex::build(dir.path().join("absent.tar")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn reader_ignores_bytes_after_entry() -> Result<()> {
    let dir = TempDir::new()?;
    let archive = common::site_archive(dir.path());
    let index = ArchiveIndex::build(&archive)?;
    let record = index.get("index.html").context("index.html missing")?;

    // The padding after index.html and the next header are in the file, but
    // not in the entry
    let mut raw = Vec::new();
    File::open(&archive)?.read_to_end(&mut raw)?;
    assert!(raw.len() as u64 > record.end_offset() + 512);

    let mut reader = EntryReader::open(record, &archive)?;
    let mut buf = vec![0u8; 4096];
    let mut total = 0;
    loop {
        let n = reader.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    assert_eq!(total as u64, record.size());
    assert_eq!(&buf[..total], common::INDEX_HTML.as_bytes());
    Ok(())
}
