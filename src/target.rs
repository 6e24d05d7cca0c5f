//! Preparing the target root and tweaking it after installation

use crate::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Directories every Cygwin root needs before the first package lands.
const SKELETON: &[&str] = &["usr", "tmp", "dev"];

/// Create a fresh target root. An existing path, even an empty directory, is refused.
pub fn prepare<P: AsRef<Path>>(target_dir: P) -> Result<()> {
    let target_dir = target_dir.as_ref();

    if fs::symlink_metadata(target_dir).is_ok() {
        return Err(Error::TargetExists(target_dir.to_path_buf()));
    }

    fs::create_dir_all(target_dir)?;
    for dir in SKELETON {
        fs::create_dir_all(target_dir.join(dir))?;
    }

    Ok(())
}

/// Make Cygwin take home directories from the Windows profile path.
///
/// Appends `db_home: /%H` to `etc/nsswitch.conf`. Returns `false` when the
/// file isn't there (base-files wasn't installed).
pub fn configure_nsswitch<P: AsRef<Path>>(target_dir: P) -> Result<bool> {
    let nsswitch = target_dir.as_ref().join("etc").join("nsswitch.conf");

    if !nsswitch.is_file() {
        log::warn!(
            "{} not found, home directories not configured",
            nsswitch.display()
        );
        return Ok(false);
    }

    let mut file = OpenOptions::new().append(true).open(&nsswitch)?;
    file.write_all(b"\ndb_home: /%H\n")?;
    file.sync_all()?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_creates_skeleton() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("cygwin");

        prepare(&target).unwrap();

        for dir in ["usr", "tmp", "dev"] {
            assert!(target.join(dir).is_dir(), "{} missing", dir);
        }
    }

    #[test]
    fn test_prepare_refuses_existing_target() {
        let temp_dir = TempDir::new().unwrap();

        let err = prepare(temp_dir.path()).unwrap_err();
        assert!(matches!(err, Error::TargetExists(_)));
        assert!(err.to_string().contains("already exists. Aborting."));
    }

    #[test]
    fn test_prepare_refuses_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("cygwin");
        fs::write(&target, "").unwrap();

        assert!(matches!(prepare(&target), Err(Error::TargetExists(_))));
    }

    #[test]
    fn test_configure_nsswitch_appends() {
        let temp_dir = TempDir::new().unwrap();
        let etc = temp_dir.path().join("etc");
        fs::create_dir_all(&etc).unwrap();
        fs::write(etc.join("nsswitch.conf"), "# defaults\npasswd: files db").unwrap();

        assert!(configure_nsswitch(temp_dir.path()).unwrap());
        assert_eq!(
            fs::read_to_string(etc.join("nsswitch.conf")).unwrap(),
            "# defaults\npasswd: files db\ndb_home: /%H\n"
        );
    }

    #[test]
    fn test_configure_nsswitch_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!configure_nsswitch(temp_dir.path()).unwrap());
        assert!(!temp_dir.path().join("etc/nsswitch.conf").exists());
    }
}
