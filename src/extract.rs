//! Package archive extraction
//!
//! Cygwin ships packages as compressed tarballs. Entries are unpacked one by
//! one, in archive order, into the target root. The `usr/bin` and `usr/lib`
//! trees are folded into `bin` and `lib`, which is where Cygwin's mount table
//! expects them.
//!
//! Anything that looks unsafe (absolute names, `.`/`..` segments, unknown entry types, unknown
//! codecs) yields [`Error::Fatal`]; the caller is expected to stop the run.

use crate::{symlink, Error, Result};
use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path};
use tar::{Archive, EntryType};
use xz2::read::XzDecoder;

/// Compression applied on top of the tarball.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Bzip2,
    Xz,
}

impl Codec {
    /// Detect the codec from the file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.to_string_lossy();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Codec::Gzip)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz") {
            Some(Codec::Bzip2)
        } else if name.ends_with(".tar.xz") {
            Some(Codec::Xz)
        } else {
            None
        }
    }

    fn decoder<'a, R: Read + 'a>(self, reader: R) -> Box<dyn Read + 'a> {
        match self {
            Codec::Gzip => Box::new(MultiGzDecoder::new(reader)),
            Codec::Bzip2 => Box::new(BzDecoder::new(reader)),
            Codec::Xz => Box::new(XzDecoder::new(reader)),
        }
    }
}

/// Path prefixes rewritten during extraction.
const REMAPS: [(&str, &str); 2] = [("usr/bin", "bin"), ("usr/lib", "lib")];

/// Apply the `usr/bin` → `bin` and `usr/lib` → `lib` rewrites.
pub fn remap(name: &str) -> Cow<'_, str> {
    for (from, to) in REMAPS {
        if let Some(rest) = name.strip_prefix(from) {
            return Cow::Owned(format!("{}{}", to, rest));
        }
    }
    Cow::Borrowed(name)
}

/// Whether `name` stays below the directory it is joined onto: relative, free
/// of backslashes and drive prefixes, with no `.` or `..` segment.
pub fn is_safe_name(name: &str) -> bool {
    !name.contains('\\')
        && name.split('/').all(|segment| segment != "." && segment != "..")
        && Path::new(name)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

fn checked(name: &str) -> Result<()> {
    if is_safe_name(name) {
        Ok(())
    } else {
        Err(Error::Fatal(format!("bad fn in tarball: {}", name)))
    }
}

/// Extract `archive_path` into `target_dir`.
pub fn extract<P: AsRef<Path>, Q: AsRef<Path>>(archive_path: P, target_dir: Q) -> Result<()> {
    let archive_path = archive_path.as_ref();
    let target_dir = target_dir.as_ref();

    let codec = Codec::from_path(archive_path).ok_or_else(|| {
        Error::Fatal(format!(
            "unhandled file extension: {}",
            archive_path.display()
        ))
    })?;

    log::debug!("extracting {} ({:?})", archive_path.display(), codec);

    let file = File::open(archive_path)?;
    let mut archive = Archive::new(codec.decoder(io::BufReader::new(file)));

    for entry in archive.entries()? {
        let mut entry = entry?;

        let raw_name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        checked(&raw_name)?;
        let name = remap(&raw_name).into_owned();
        let path = target_dir.join(&name);

        let entry_type = entry.header().entry_type();
        match entry_type {
            EntryType::Regular | EntryType::Continuous => {
                ensure_parent_dir(&path)?;
                let mut out = File::create(&path)?;
                io::copy(&mut entry, &mut out)?;
            }
            EntryType::Directory => {
                fs::create_dir_all(&path)?;
            }
            EntryType::Link => {
                let link = link_name(&entry, &raw_name)?;
                checked(&link)?;
                ensure_parent_dir(&path)?;
                fs::hard_link(target_dir.join(&*remap(&link)), &path)?;
            }
            EntryType::Symlink => {
                let link = link_name(&entry, &raw_name)?;
                ensure_parent_dir(&path)?;
                symlink::write_symlink(&path, &remap(&link))?;
            }
            other => {
                return Err(Error::Fatal(format!(
                    "unhandled entry type {:?} for {}",
                    other, raw_name
                )));
            }
        }
    }

    Ok(())
}

fn link_name<R: Read>(entry: &tar::Entry<'_, R>, name: &str) -> Result<String> {
    entry
        .link_name_bytes()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .ok_or_else(|| Error::Fatal(format!("link entry without target: {}", name)))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
