//! Downloading distfiles from Cygwin mirrors
//!
//! Every artifact is addressed by its path relative to the mirror root (the
//! `install:` path of a package, or `<arch>/setup.ini`). It is stored under the
//! same relative path below the distfiles directory. Files are always
//! re-downloaded; the distfiles directory is scratch space, not a cache.
//!
//! # Examples
//!
//! ```no_run
//! use cygstrap::Fetcher;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher::new(
//!     vec!["http://mirrors.dotsrc.org/cygwin".to_string()],
//!     "/tmp/cygwin/distfiles",
//! )?;
//!
//! let setup_ini = fetcher.ensure_fetched("x86_64/setup.ini", None, "")?;
//! println!("Catalog at {:?}", setup_ini);
//! # Ok(())
//! # }
//! ```

use crate::{extract, Error, Result};
use sha2::{Digest, Sha512_256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Progress callback for downloads and verification
///
/// Called with:
/// - `message`: Description of current operation (e.g., "Downloading bash-4.4.12-3.tar.xz")
/// - `current`: Bytes processed so far
/// - `total`: Total bytes, or 0 when the server didn't say
pub type ProgressCallback = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

const DIGEST_WITHOUT_SIZE: &str =
    "If ensure_fetched is passed a digest, it must also be passed a file size.";

/// Downloads artifacts from an ordered list of mirrors.
pub struct Fetcher {
    client: reqwest::blocking::Client,
    mirrors: Vec<String>,
    distfiles: PathBuf,
    progress: Option<ProgressCallback>,
}

impl Fetcher {
    pub fn new<P: Into<PathBuf>>(mirrors: Vec<String>, distfiles: P) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("cygstrap/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<std::time::Duration>)
            .build()?;

        Ok(Self {
            client,
            mirrors: mirrors
                .into_iter()
                .map(|m| m.trim_end_matches('/').to_string())
                .collect(),
            distfiles: distfiles.into(),
            progress: None,
        })
    }

    /// Report download progress through `progress`.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }

    pub fn distfiles_dir(&self) -> &Path {
        &self.distfiles
    }

    /// Local path for an artifact's mirror-relative path.
    pub fn distfile_path(&self, relative_path: &str) -> PathBuf {
        relative_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.distfiles.clone(), |path, segment| path.join(segment))
    }

    /// Download `relative_path` into the distfiles directory and verify it.
    ///
    /// With an empty `expected_digest` the file is accepted as soon as it is
    /// written (the catalog and its signature are covered by the signature
    /// check instead). Otherwise both size and SHA-512/256 digest must match.
    ///
    /// Mirrors are tried in order. Network failures and mismatches move on to
    /// the next mirror; local I/O errors abort straight away.
    pub fn ensure_fetched(
        &self,
        relative_path: &str,
        expected_size: Option<u64>,
        expected_digest: &str,
    ) -> Result<PathBuf> {
        if !expected_digest.is_empty() && expected_size.is_none() {
            return Err(Error::Validation(DIGEST_WITHOUT_SIZE.to_string()));
        }
        if relative_path.is_empty() || !extract::is_safe_name(relative_path) {
            return Err(Error::Validation(format!(
                "refusing to fetch unsafe path '{}'",
                relative_path
            )));
        }

        let destination = self.distfile_path(relative_path);
        let mut last_error = None;

        for mirror in &self.mirrors {
            let url = format!("{}/{}", mirror, relative_path);
            log::debug!("fetching {}", url);

            match self.fetch_one(&url, &destination, expected_size, expected_digest) {
                Ok(()) => return Ok(destination),
                Err(e) if e.is_retryable() => {
                    log::warn!("{} failed: {}", url, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::Other(format!("no mirrors left to fetch '{}' from", relative_path))
        }))
    }

    fn fetch_one(
        &self,
        url: &str,
        destination: &Path,
        expected_size: Option<u64>,
        expected_digest: &str,
    ) -> Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        self.download(url, destination)?;

        match expected_size {
            Some(size) if !expected_digest.is_empty() => {
                verify_digest(destination, size, expected_digest)
            }
            _ => Ok(()),
        }
    }

    fn download(&self, url: &str, destination: &Path) -> Result<u64> {
        let mut response = self.client.get(url).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Download {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let total = response.content_length().unwrap_or(0);
        let label = format!(
            "Downloading {}",
            destination
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );

        let mut file = File::create(destination)?;
        let mut buffer = vec![0; 64 * 1024];
        let mut written: u64 = 0;

        loop {
            let n = response.read(&mut buffer).map_err(|e| Error::Download {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n])?;
            written += n as u64;

            if let Some(ref cb) = self.progress {
                cb(&label, written, total);
            }
        }
        file.flush()?;

        if let Some(ref cb) = self.progress {
            cb(&label, written, written);
        }

        Ok(written)
    }
}

/// Check a file's length and hex SHA-512/256 digest.
///
/// The length is checked first; either mismatch names its dimension.
pub fn verify_digest<P: AsRef<Path>>(
    path: P,
    expected_size: u64,
    expected_digest: &str,
) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let mut hasher = Sha512_256::new();
    let mut buffer = vec![0; 8192];
    let mut length: u64 = 0;

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        length += n as u64;
    }

    if length != expected_size {
        return Err(Error::LengthMismatch {
            path: path.to_path_buf(),
            actual: length,
            expected: expected_size,
        });
    }

    let actual = hex::encode(hasher.finalize());
    if !actual.eq_ignore_ascii_case(expected_digest) {
        return Err(Error::DigestMismatch {
            path: path.to_path_buf(),
            actual,
            expected: expected_digest.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    fn kilobyte() -> Vec<u8> {
        (0..1024u32).map(|i| (i % 251) as u8).collect()
    }

    // ========================================================================
    // verify_digest tests
    // ========================================================================

    #[test]
    fn test_verify_digest_valid() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("blob");
        let data = kilobyte();
        fs::write(&file, &data).unwrap();

        let digest = testutil::digest(&data);
        assert!(verify_digest(&file, 1024, &digest).is_ok());
        assert!(verify_digest(&file, 1024, &digest.to_uppercase()).is_ok());
    }

    #[test]
    fn test_verify_digest_length_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("blob");
        let data = kilobyte();
        fs::write(&file, &data).unwrap();

        let err = verify_digest(&file, 1023, &testutil::digest(&data)).unwrap_err();
        assert!(matches!(
            err,
            Error::LengthMismatch {
                actual: 1024,
                expected: 1023,
                ..
            }
        ));
    }

    #[test]
    fn test_verify_digest_digest_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("blob");
        fs::write(&file, kilobyte()).unwrap();

        let wrong = "0".repeat(64);
        let err = verify_digest(&file, 1024, &wrong).unwrap_err();
        assert!(matches!(err, Error::DigestMismatch { .. }));
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn test_verify_digest_file_not_found() {
        let result = verify_digest("/nonexistent/blob", 1, "ab");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    // ========================================================================
    // Fetcher tests
    // ========================================================================

    #[test]
    fn test_distfile_path() {
        let fetcher = Fetcher::new(vec![], "/tmp/distfiles").unwrap();
        assert_eq!(
            fetcher.distfile_path("x86_64/release/tar/tar-1.29-1.tar.xz"),
            PathBuf::from("/tmp/distfiles")
                .join("x86_64")
                .join("release")
                .join("tar")
                .join("tar-1.29-1.tar.xz")
        );
    }

    #[test]
    fn test_mirror_trailing_slash_trimmed() {
        let fetcher = Fetcher::new(vec!["http://m/cygwin/".to_string()], "/tmp/d").unwrap();
        assert_eq!(fetcher.mirrors(), &["http://m/cygwin".to_string()]);
    }

    #[test]
    fn test_fetch_without_digest() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/x86_64/setup.ini")
            .with_status(200)
            .with_body("release: cygwin\n")
            .expect(1)
            .create();

        let temp_dir = TempDir::new().unwrap();
        let fetcher = Fetcher::new(vec![server.url()], temp_dir.path()).unwrap();

        let path = fetcher.ensure_fetched("x86_64/setup.ini", None, "").unwrap();
        assert_eq!(path, temp_dir.path().join("x86_64").join("setup.ini"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "release: cygwin\n");
        mock.assert();
    }

    #[test]
    fn test_fetch_with_digest() {
        let data = kilobyte();
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/x86_64/release/a/a-1.tar.xz")
            .with_status(200)
            .with_body(&data)
            .create();

        let temp_dir = TempDir::new().unwrap();
        let fetcher = Fetcher::new(vec![server.url()], temp_dir.path()).unwrap();

        let path = fetcher
            .ensure_fetched(
                "x86_64/release/a/a-1.tar.xz",
                Some(1024),
                &testutil::digest(&data),
            )
            .unwrap();
        assert_eq!(fs::read(path).unwrap(), data);
    }

    #[test]
    fn test_fetch_overwrites_existing_file() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/x86_64/setup.ini")
            .with_status(200)
            .with_body("fresh")
            .create();

        let temp_dir = TempDir::new().unwrap();
        let existing = temp_dir.path().join("x86_64").join("setup.ini");
        fs::create_dir_all(existing.parent().unwrap()).unwrap();
        fs::write(&existing, "stale and much longer").unwrap();

        let fetcher = Fetcher::new(vec![server.url()], temp_dir.path()).unwrap();
        fetcher.ensure_fetched("x86_64/setup.ini", None, "").unwrap();
        assert_eq!(fs::read_to_string(&existing).unwrap(), "fresh");
    }

    #[test]
    fn test_fetch_digest_mismatch() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/a.tar.xz")
            .with_status(200)
            .with_body("tampered")
            .create();

        let temp_dir = TempDir::new().unwrap();
        let fetcher = Fetcher::new(vec![server.url()], temp_dir.path()).unwrap();

        let err = fetcher
            .ensure_fetched("a.tar.xz", Some(8), &"0".repeat(64))
            .unwrap_err();
        assert!(matches!(err, Error::DigestMismatch { .. }));
    }

    #[test]
    fn test_fetch_digest_without_size() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = Fetcher::new(vec!["http://127.0.0.1:9".to_string()], temp_dir.path())
            .unwrap();

        let err = fetcher.ensure_fetched("a.tar.xz", None, "abcd").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("must also be passed a file size"));
    }

    #[test]
    fn test_fetch_rejects_unsafe_paths() {
        let mut server = mockito::Server::new();
        let mock = server.mock("GET", mockito::Matcher::Any).expect(0).create();

        let temp_dir = TempDir::new().unwrap();
        let distfiles = temp_dir.path().join("distfiles");
        let fetcher = Fetcher::new(vec![server.url()], distfiles.clone()).unwrap();

        for path in ["../escape.tar.xz", "x86_64/../../escape", "/etc/passwd", "a\\b", ""] {
            let err = fetcher.ensure_fetched(path, Some(1), "ab").unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{:?}: {:?}", path, err);
        }

        mock.assert();
        assert!(!temp_dir.path().join("escape.tar.xz").exists());
        assert!(!distfiles.exists());
    }

    #[test]
    fn test_fetch_falls_back_to_next_mirror() {
        let data = b"package bytes".to_vec();

        let mut broken = mockito::Server::new();
        let broken_mock = broken
            .mock("GET", "/a.tar.xz")
            .with_status(404)
            .expect(1)
            .create();

        let mut corrupt = mockito::Server::new();
        let corrupt_mock = corrupt
            .mock("GET", "/a.tar.xz")
            .with_status(200)
            .with_body("package bytez")
            .expect(1)
            .create();

        let mut good = mockito::Server::new();
        let good_mock = good
            .mock("GET", "/a.tar.xz")
            .with_status(200)
            .with_body(&data)
            .expect(1)
            .create();

        let temp_dir = TempDir::new().unwrap();
        let fetcher = Fetcher::new(
            vec![broken.url(), corrupt.url(), good.url()],
            temp_dir.path(),
        )
        .unwrap();

        let path = fetcher
            .ensure_fetched("a.tar.xz", Some(data.len() as u64), &testutil::digest(&data))
            .unwrap();
        assert_eq!(fs::read(path).unwrap(), data);

        broken_mock.assert();
        corrupt_mock.assert();
        good_mock.assert();
    }

    #[test]
    fn test_fetch_all_mirrors_fail() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/a.tar.xz").with_status(500).create();

        let temp_dir = TempDir::new().unwrap();
        let fetcher = Fetcher::new(vec![server.url()], temp_dir.path()).unwrap();

        let err = fetcher.ensure_fetched("a.tar.xz", None, "").unwrap_err();
        assert!(matches!(err, Error::Download { .. }));
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[test]
    fn test_fetch_no_mirrors() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = Fetcher::new(vec![], temp_dir.path()).unwrap();

        let err = fetcher.ensure_fetched("a.tar.xz", None, "").unwrap_err();
        assert!(err.to_string().contains("no mirrors left"));
    }

    #[test]
    fn test_fetch_reports_progress() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/big.tar.xz")
            .with_status(200)
            .with_body(vec![7u8; 200 * 1024])
            .create();

        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let progress: ProgressCallback = Arc::new(move |_msg, _current, _total| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let temp_dir = TempDir::new().unwrap();
        let fetcher = Fetcher::new(vec![server.url()], temp_dir.path())
            .unwrap()
            .with_progress(progress);

        fetcher.ensure_fetched("big.tar.xz", None, "").unwrap();
        assert!(calls.load(Ordering::SeqCst) > 1);
    }
}
