//! Cygwin-style symbolic links
//!
//! Cygwin's default symlinks are plain files holding a magic cookie followed by
//! the UTF-16 link target. They carry the DOS SYSTEM attribute so the runtime
//! only has to open files with that attribute to find links.

use crate::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Cookie at the start of every symlink file.
pub const MAGIC: &[u8; 10] = b"!<symlink>";

/// UTF-16 little-endian byte-order mark.
const BOM: [u8; 2] = [0xff, 0xfe];

/// Content of a symlink file pointing at `target`.
pub fn encode(target: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(MAGIC.len() + BOM.len() + target.len() * 2 + 2);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&BOM);
    for unit in target.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes.extend_from_slice(&[0, 0]);
    bytes
}

/// Write a symlink file at `path` and mark it with the SYSTEM attribute.
pub fn write_symlink<P: AsRef<Path>>(path: P, target: &str) -> Result<()> {
    let path = path.as_ref();

    {
        let mut file = File::create(path)?;
        file.write_all(&encode(target))?;
        file.sync_all()?;
    }

    // The handle is closed above; the attribute is set by path.
    set_system_attribute(path)?;
    Ok(())
}

#[cfg(windows)]
fn set_system_attribute(path: &Path) -> std::io::Result<()> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::{SetFileAttributesW, FILE_ATTRIBUTE_SYSTEM};

    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    // SAFETY: `wide` is a NUL-terminated UTF-16 string that outlives the call.
    let ok = unsafe { SetFileAttributesW(wide.as_ptr(), FILE_ATTRIBUTE_SYSTEM) };
    if ok == 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(windows))]
fn set_system_attribute(path: &Path) -> std::io::Result<()> {
    log::trace!("no SYSTEM attribute on this host: {}", path.display());
    Ok(())
}
