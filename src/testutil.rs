//! Fixtures shared by the unit tests.

use crate::extract::Codec;
use sha2::{Digest, Sha512_256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};

pub(crate) enum Kind {
    File(Vec<u8>),
    Dir,
    Symlink(String),
    HardLink(String),
    Fifo,
}

pub(crate) struct TarEntry {
    name: String,
    kind: Kind,
}

impl TarEntry {
    pub(crate) fn file(name: &str, data: &[u8]) -> Self {
        Self::new(name, Kind::File(data.to_vec()))
    }

    pub(crate) fn dir(name: &str) -> Self {
        Self::new(name, Kind::Dir)
    }

    pub(crate) fn symlink(name: &str, target: &str) -> Self {
        Self::new(name, Kind::Symlink(target.to_string()))
    }

    pub(crate) fn hard_link(name: &str, target: &str) -> Self {
        Self::new(name, Kind::HardLink(target.to_string()))
    }

    pub(crate) fn fifo(name: &str) -> Self {
        Self::new(name, Kind::Fifo)
    }

    fn new(name: &str, kind: Kind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// Build an uncompressed tarball. Names are written into the header as-is so
/// that hostile names like `a/../b` can be produced.
pub(crate) fn tarball(entries: &[TarEntry]) -> Vec<u8> {
    let mut builder = Builder::new(Vec::new());

    for entry in entries {
        let mut header = Header::new_gnu();
        let empty: &[u8] = &[];
        let (entry_type, data, link) = match &entry.kind {
            Kind::File(data) => (EntryType::Regular, data.as_slice(), None),
            Kind::Dir => (EntryType::Directory, empty, None),
            Kind::Symlink(target) => (EntryType::Symlink, empty, Some(target.as_str())),
            Kind::HardLink(target) => (EntryType::Link, empty, Some(target.as_str())),
            Kind::Fifo => (EntryType::Fifo, empty, None),
        };

        {
            let gnu = header.as_gnu_mut().unwrap();
            gnu.name[..entry.name.len()].copy_from_slice(entry.name.as_bytes());
            if let Some(link) = link {
                gnu.linkname[..link.len()].copy_from_slice(link.as_bytes());
            }
        }
        header.set_entry_type(entry_type);
        header.set_size(data.len() as u64);
        header.set_mode(if entry_type == EntryType::Directory { 0o755 } else { 0o644 });
        header.set_mtime(0);
        header.set_cksum();

        builder.append(&header, data).unwrap();
    }

    builder.into_inner().unwrap()
}

/// Write a compressed tarball to `dir/file_name`; the codec follows the suffix.
pub(crate) fn write_archive(dir: &Path, file_name: &str, entries: &[TarEntry]) -> PathBuf {
    let path = dir.join(file_name);
    fs::write(&path, compress(&path, &tarball(entries))).unwrap();
    path
}

pub(crate) fn compress(path: &Path, tar: &[u8]) -> Vec<u8> {
    match Codec::from_path(path).expect("test archive needs a known suffix") {
        Codec::Gzip => {
            let mut enc =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(tar).unwrap();
            enc.finish().unwrap()
        }
        Codec::Bzip2 => {
            let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            enc.write_all(tar).unwrap();
            enc.finish().unwrap()
        }
        Codec::Xz => {
            let mut enc = xz2::write::XzEncoder::new(Vec::new(), 6);
            enc.write_all(tar).unwrap();
            enc.finish().unwrap()
        }
    }
}

/// Hex SHA-512/256 of `data`, as found in `install:` lines.
pub(crate) fn digest(data: &[u8]) -> String {
    hex::encode(Sha512_256::digest(data))
}

/// Point `target/bin/bash.exe` at the host's bash so post-install scripts run.
#[cfg(unix)]
pub(crate) fn install_host_bash(target: &Path) {
    let bin = target.join("bin");
    fs::create_dir_all(&bin).unwrap();
    std::os::unix::fs::symlink("/bin/bash", bin.join("bash.exe")).unwrap();
}
