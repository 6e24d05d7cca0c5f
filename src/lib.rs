//! cygstrap - bootstrap a Cygwin root from a mirror, without setup.exe
//!
//! cygstrap provisions a fresh Cygwin environment in one shot:
//!
//! - Fetches the architecture's `setup.ini` catalog and checks its OpenPGP signature
//! - Installs the requested packages and their requirements, depth first, exactly once
//! - Verifies every archive against the size and SHA-512/256 digest in the catalog
//! - Unpacks `.tar.gz`, `.tar.bz2` and `.tar.xz` archives, refusing unsafe member names
//! - Writes Cygwin-native symlink files so links work without Windows privileges
//! - Runs package post-install scripts once `bash` is available in the target
//!
//! # Examples
//!
//! ```no_run
//! use cygstrap::{signing, Catalog, Fetcher, Installer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher::new(
//!     vec!["http://mirrors.dotsrc.org/cygwin".to_string()],
//!     "/tmp/cygwin/distfiles",
//! )?;
//!
//! let setup_ini = fetcher.ensure_fetched("x86_64/setup.ini", None, "")?;
//! let signature = fetcher.ensure_fetched("x86_64/setup.ini.sig", None, "")?;
//! signing::verify_detached(&setup_ini, &signature)?;
//!
//! let catalog = Catalog::load(&setup_ini)?;
//! let mut installer = Installer::new(&catalog, &fetcher, "/tmp/cygwin");
//! installer.install("bash", &[])?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`catalog`] - Parse `setup.ini` into package records
//! - [`installer`] - Install packages with their requirements
//! - [`fetcher`] - Download from mirrors and verify digests
//! - [`extract`] - Unpack package archives into the target
//! - [`symlink`] - Write Cygwin-style symlink files
//! - [`signing`] - Verify the catalog's detached OpenPGP signature
//! - [`postinstall`] - Run package post-install scripts
//! - [`target`] - Prepare the target root and post-setup tweaks
//! - [`config`] - Command-line, file and default settings
//! - [`error`] - Error types and result handling

pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod installer;
pub mod postinstall;
pub mod signing;
pub mod symlink;
pub mod target;

#[cfg(test)]
mod testutil;

pub use catalog::{Catalog, InstallInfo, PackageRecord, Value};
pub use config::{Arch, Config, Settings};
pub use error::{Error, Result};
pub use extract::extract;
pub use fetcher::{verify_digest, Fetcher, ProgressCallback};
pub use installer::{InstallOutcome, Installer};
pub use signing::verify_detached;
pub use symlink::write_symlink;
