//! Fixture archives shared by the integration tests.
//!
//! Archives are written with the `tar` crate so the code under test never
//! reads data produced by its own encoder.

#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};

pub const GL_UTILS_JS: &str = r#"// augment Sylvester some
Matrix.Translation = function (v)
{
  if (v.elements.length == 2) {
    var r = Matrix.I(3);
    r.elements[2][0] = v.elements[0];
    r.elements[2][1] = v.elements[1];
    return r;
  }

  if (v.elements.length == 3) {
    var r = Matrix.I(4);
    r.elements[0][3] = v.elements[0];
    r.elements[1][3] = v.elements[1];
    r.elements[2][3] = v.elements[2];
    return r;
  }

  throw "Invalid length for Translation";
}

Matrix.prototype.flatten = function ()
{
    var result = [];
    if (this.elements.length == 0)
        return [];

    for (var j = 0; j < this.elements[0].length; j++)
        for (var i = 0; i < this.elements.length; i++)
            result.push(this.elements[i][j]);
    return result;
}

function makePerspective(fovy, aspect, znear, zfar)
{
    var ymax = znear * Math.tan(fovy * Math.PI / 360.0);
    var ymin = -ymax;
    var xmin = ymin * aspect;
    var xmax = ymax * aspect;

    return makeFrustum(xmin, xmax, ymin, ymax, znear, zfar);
}
"#;

pub const INDEX_HTML: &str = "<!DOCTYPE html>\n<html>\n<head><script src=\"scripts/glUtils.js\"></script></head>\n<body><img src=\"images/top.jpg\"></body>\n</html>\n";

pub const STYLE_CSS: &str = "body { margin: 0; background: url(../images/background.png); }\n";

pub const TOP_JPG_SIZE: u64 = 69202;
pub const TOP_JPG_OFFSET: u64 = 565760;

/// Names of the regular files in [`site_archive`], in archive order
pub const FILES: [&str; 5] = [
    "index.html",
    "scripts/glUtils.js",
    "images/background.png",
    "images/top.jpg",
    "css/style.css",
];

/// Deterministic binary content
pub fn pattern(len: u64, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

pub fn top_jpg() -> Vec<u8> {
    pattern(TOP_JPG_SIZE, 7)
}

fn padded(len: u64) -> u64 {
    len.div_ceil(512) * 512
}

fn append(builder: &mut tar::Builder<File>, path: &str, kind: tar::EntryType, data: &[u8]) {
    let mut header = tar::Header::new_ustar();
    header.set_path(path).unwrap();
    header.set_entry_type(kind);
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(1_350_000_000);
    header.set_cksum();
    builder.append(&header, data).unwrap();
}

fn append_link(builder: &mut tar::Builder<File>, path: &str, kind: tar::EntryType, target: &str) {
    let mut header = tar::Header::new_ustar();
    header.set_path(path).unwrap();
    header.set_link_name(target).unwrap();
    header.set_entry_type(kind);
    header.set_size(0);
    header.set_mode(0o777);
    header.set_cksum();
    builder.append(&header, std::io::empty()).unwrap();
}

/// Size of `images/background.png`, chosen so `images/top.jpg` starts at
/// [`TOP_JPG_OFFSET`]
pub fn background_size() -> u64 {
    // index.html, scripts/, scripts/glUtils.js, images/, images/background.png
    let before = 512 + padded(INDEX_HTML.len() as u64)
        + 512
        + 512 + padded(GL_UTILS_JS.len() as u64)
        + 512
        + 512;
    TOP_JPG_OFFSET - 512 - before
}

/// A small web site: a few text files, directories, links, a large image
/// at a known offset
pub fn site_archive(dir: &Path) -> PathBuf {
    let path = dir.join("test.tar");
    let mut builder = tar::Builder::new(File::create(&path).unwrap());

    append(&mut builder, "index.html", tar::EntryType::Regular, INDEX_HTML.as_bytes());
    append(&mut builder, "scripts/", tar::EntryType::Directory, b"");
    append(&mut builder, "scripts/glUtils.js", tar::EntryType::Regular, GL_UTILS_JS.as_bytes());
    append(&mut builder, "images/", tar::EntryType::Directory, b"");
    append(
        &mut builder,
        "images/background.png",
        tar::EntryType::Regular,
        &pattern(background_size(), 3),
    );
    append(&mut builder, "images/top.jpg", tar::EntryType::Regular, &top_jpg());
    append_link(&mut builder, "images/logo.jpg", tar::EntryType::Symlink, "top.jpg");
    append_link(&mut builder, "images/copy.jpg", tar::EntryType::Link, "images/top.jpg");
    append(&mut builder, "css/", tar::EntryType::Directory, b"");
    append(&mut builder, "css/style.css", tar::EntryType::Regular, STYLE_CSS.as_bytes());

    builder.into_inner().unwrap().sync_all().unwrap();
    path
}
