//! Run configuration
//!
//! Settings come from three layers, highest precedence first: command-line
//! flags, an optional TOML file passed with `--config`, and built-in defaults.
//!
//! ```toml
//! target = "C:\\cygwin"
//! arch = "x86_64"
//! mirrors = ["http://mirrors.dotsrc.org/cygwin", "https://mirrors.kernel.org/sourceware/cygwin"]
//! packages = ["base-cygwin", "cygwin", "bash"]
//! keep-distfiles = true
//! ```
//!
//! # Examples
//!
//! ```
//! use cygstrap::config::{Arch, Config, Settings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cli = Settings {
//!     target: Some("/tmp/cygwin".into()),
//!     ..Settings::default()
//! };
//! let config = Config::resolve(cli, None)?;
//!
//! assert_eq!(config.arch, Arch::X86_64);
//! assert_eq!(config.distfiles(), std::path::PathBuf::from("/tmp/cygwin/distfiles"));
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_MIRROR: &str = "http://mirrors.dotsrc.org/cygwin";

/// `${target}` (or `$target`) is replaced with the target directory.
pub const DEFAULT_DISTFILES: &str = "${target}/distfiles";

pub const DEFAULT_PACKAGES: &[&str] = &[
    "base-cygwin",
    "cygwin",
    "base-files",
    "bash",
    "patch",
    "tar",
    "xz",
    "gzip",
    "bzip2",
    "hostname",
    "curl",
    "which",
    "unzip",
    "grep",
    "gawk",
    "vim",
    "diffutils",
    "diffstat",
    "autoconf",
];

/// Cygwin architecture; selects the catalog namespace on the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Arch {
    #[serde(rename = "x86")]
    X86,
    #[default]
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X86_64 => "x86_64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "x86" => Ok(Arch::X86),
            "x86_64" => Ok(Arch::X86_64),
            other => Err(Error::Config(format!(
                "arch is '{}' -- unknown arch! Expected x86 or x86_64",
                other
            ))),
        }
    }
}

/// One layer of settings. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
    pub target: Option<PathBuf>,
    pub distfiles: Option<String>,
    pub arch: Option<Arch>,
    pub mirrors: Option<Vec<String>>,
    pub packages: Option<Vec<String>>,
    pub fetch_only: Option<bool>,
    pub keep_distfiles: Option<bool>,
}

impl Settings {
    /// Read a TOML settings file.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Fill unset fields from `fallback`.
    pub fn or(self, fallback: Settings) -> Settings {
        Settings {
            target: self.target.or(fallback.target),
            distfiles: self.distfiles.or(fallback.distfiles),
            arch: self.arch.or(fallback.arch),
            mirrors: self.mirrors.or(fallback.mirrors),
            packages: self.packages.or(fallback.packages),
            fetch_only: self.fetch_only.or(fallback.fetch_only),
            keep_distfiles: self.keep_distfiles.or(fallback.keep_distfiles),
        }
    }
}

/// Fully resolved and validated settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root of the Cygwin environment. Only optional in fetch-only mode.
    pub target: Option<PathBuf>,
    /// Distfiles location before `${target}` substitution.
    pub distfiles_template: String,
    pub arch: Arch,
    pub mirrors: Vec<String>,
    pub packages: Vec<String>,
    pub fetch_only: bool,
    pub keep_distfiles: bool,
}

impl Config {
    /// Merge the command line over the config file over the defaults, then validate.
    pub fn resolve(cli: Settings, file: Option<Settings>) -> Result<Self> {
        let merged = match file {
            Some(file) => cli.or(file),
            None => cli,
        };

        let fetch_only = merged.fetch_only.unwrap_or(false);
        let target = merged.target.filter(|t| !t.as_os_str().is_empty());
        if target.is_none() && !fetch_only {
            return Err(Error::Config("missing argument: target".to_string()));
        }

        let mirrors = clean_list(
            merged
                .mirrors
                .unwrap_or_else(|| vec![DEFAULT_MIRROR.to_string()]),
        );
        if mirrors.is_empty() {
            return Err(Error::Config("at least one mirror is required".to_string()));
        }

        let packages = clean_list(
            merged
                .packages
                .unwrap_or_else(|| DEFAULT_PACKAGES.iter().map(|p| p.to_string()).collect()),
        );
        if packages.is_empty() {
            return Err(Error::Config("no packages to install".to_string()));
        }

        Ok(Config {
            target,
            distfiles_template: merged
                .distfiles
                .unwrap_or_else(|| DEFAULT_DISTFILES.to_string()),
            arch: merged.arch.unwrap_or_default(),
            mirrors,
            packages,
            fetch_only,
            // Fetched archives are the whole point of a fetch-only run.
            keep_distfiles: fetch_only || merged.keep_distfiles.unwrap_or(false),
        })
    }

    /// Distfiles directory with `${target}` expanded. Without a target it
    /// expands to `.`.
    pub fn distfiles(&self) -> PathBuf {
        let target = self
            .target
            .as_ref()
            .map(|t| t.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string());

        let expanded = shellexpand::env_with_context_no_errors(&self.distfiles_template, |var| {
            match var {
                "target" => Some(target.clone()),
                _ => None,
            }
        });
        PathBuf::from(expanded.as_ref())
    }

    /// Mirror-relative path of the catalog for the configured architecture.
    pub fn setup_ini(&self) -> String {
        format!("{}/setup.ini", self.arch)
    }
}

/// Trim entries and drop empty ones, so `"a,,b, "` style lists behave.
/// Split comma separated items, trim them and drop empty ones.
fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .iter()
        .flat_map(|item| item.split(','))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
