//! Installing packages and their requirements into the target
//!
//! An [`Installer`] lives for one run. It remembers which packages it has
//! installed so shared requirements are fetched and extracted only once.
//!
//! # Examples
//!
//! ```no_run
//! use cygstrap::{Catalog, Fetcher, InstallOutcome, Installer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Catalog::load("/tmp/cygwin/distfiles/x86_64/setup.ini")?;
//! let fetcher = Fetcher::new(
//!     vec!["http://mirrors.dotsrc.org/cygwin".to_string()],
//!     "/tmp/cygwin/distfiles",
//! )?;
//!
//! let mut installer = Installer::new(&catalog, &fetcher, "/tmp/cygwin");
//! for name in ["cygwin", "bash"] {
//!     if installer.install(name, &[])? == InstallOutcome::AlreadyInstalled {
//!         println!("{} came in as a requirement", name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::catalog::{Catalog, HINT_MARKER};
use crate::fetcher::Fetcher;
use crate::{extract, postinstall, Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// What [`Installer::install`] did with a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    /// Installed earlier in this run, nothing done.
    AlreadyInstalled,
}

/// Run-scoped dependency installer.
pub struct Installer<'a> {
    catalog: &'a Catalog,
    fetcher: &'a Fetcher,
    target_dir: PathBuf,
    fetch_only: bool,
    installed: HashSet<String>,
    install_order: Vec<String>,
    in_progress: HashSet<String>,
}

impl<'a> Installer<'a> {
    pub fn new<P: Into<PathBuf>>(catalog: &'a Catalog, fetcher: &'a Fetcher, target_dir: P) -> Self {
        Self {
            catalog,
            fetcher,
            target_dir: target_dir.into(),
            fetch_only: false,
            installed: HashSet::new(),
            install_order: Vec::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Only download and verify archives; leave the target untouched.
    pub fn fetch_only(mut self, fetch_only: bool) -> Self {
        self.fetch_only = fetch_only;
        self
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.installed.contains(name)
    }

    /// Treat `name` as present without fetching anything.
    pub fn mark_installed(&mut self, name: &str) {
        if self.installed.insert(name.to_string()) {
            self.install_order.push(name.to_string());
        }
    }

    /// Installed package names, in the order they completed.
    pub fn installed(&self) -> &[String] {
        &self.install_order
    }

    /// Install `name` after its requirements, depth first.
    ///
    /// Requirements starting with `_` are hints and are skipped, as are names
    /// in `exclusions` and packages whose install is already under way further
    /// up the recursion (which breaks dependency cycles). The first failure,
    /// in a requirement or in the package itself, is returned as-is.
    pub fn install(&mut self, name: &str, exclusions: &[&str]) -> Result<InstallOutcome> {
        if self.is_installed(name) {
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        self.in_progress.insert(name.to_string());
        let result = self.install_with_requirements(name, exclusions);
        self.in_progress.remove(name);
        result?;

        self.mark_installed(name);
        Ok(InstallOutcome::Installed)
    }

    fn install_with_requirements(&mut self, name: &str, exclusions: &[&str]) -> Result<()> {
        let catalog = self.catalog;
        let record = catalog
            .get(name)
            .ok_or_else(|| Error::PackageNotFound(name.to_string()))?;

        let mut nested_exclusions: Vec<&str> = exclusions.iter().copied().collect();
        nested_exclusions.push(name);

        for requirement in record.requirements() {
            if requirement.starts_with(HINT_MARKER)
                || exclusions.iter().any(|excluded| *excluded == requirement)
                || self.in_progress.contains(requirement)
                || self.is_installed(requirement)
            {
                continue;
            }

            log::debug!("{} requires {}", name, requirement);
            self.install(requirement, &nested_exclusions)?;
        }

        log::info!("installing package '{}'", name);
        let info = record.install_info()?;
        let archive = self
            .fetcher
            .ensure_fetched(&info.path, info.size, &info.digest)?;

        if self.fetch_only {
            return Ok(());
        }

        extract::extract(&archive, &self.target_dir)?;
        let scripts = postinstall::run_pending(&self.target_dir)?;
        if scripts > 0 {
            log::debug!("ran {} post-install script(s) after {}", scripts, name);
        }

        Ok(())
    }
}
