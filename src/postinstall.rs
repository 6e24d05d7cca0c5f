//! Running package post-install scripts inside the target
//!
//! Packages drop scripts into `etc/postinstall`. A script that ran successfully
//! is renamed with a `.done` suffix so later packages don't run it again.
//! Scripts need the target's own `bin/bash.exe`; until `bash` is installed they
//! are left pending.

use crate::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const DONE_SUFFIX: &str = ".done";

/// Run every pending script under `target_dir/etc/postinstall`, in name order.
///
/// Returns how many scripts ran. The first failing script aborts; scripts that
/// already ran keep their `.done` name.
pub fn run_pending<P: AsRef<Path>>(target_dir: P) -> Result<usize> {
    let target_dir = target_dir.as_ref();
    let script_dir = target_dir.join("etc").join("postinstall");
    let bash = target_dir.join("bin").join("bash.exe");

    if !script_dir.is_dir() {
        return Ok(0);
    }
    if !bash.is_file() {
        log::debug!("no bash.exe in target yet, leaving post-install scripts pending");
        return Ok(0);
    }

    let scripts = pending_scripts(&script_dir)?;
    let path = search_path(target_dir)?;

    for script in &scripts {
        log::info!("running post-install script {}", script.display());
        run_script(&bash, script, &path, target_dir)?;

        let mut done = script.clone().into_os_string();
        done.push(DONE_SUFFIX);
        fs::rename(script, &done)?;
    }

    Ok(scripts.len())
}

fn pending_scripts(script_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut scripts = Vec::new();

    for entry in fs::read_dir(script_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(DONE_SUFFIX) {
            continue;
        }
        scripts.push(entry.path());
    }

    scripts.sort();
    Ok(scripts)
}

/// `PATH` with the target's `bin` in front of the inherited one.
fn search_path(target_dir: &Path) -> Result<std::ffi::OsString> {
    let mut dirs = vec![target_dir.join("bin")];
    if let Some(inherited) = env::var_os("PATH") {
        dirs.extend(env::split_paths(&inherited));
    }

    env::join_paths(dirs).map_err(|e| Error::Other(format!("Cannot build PATH: {}", e)))
}

fn run_script(bash: &Path, script: &Path, path: &std::ffi::OsStr, cwd: &Path) -> Result<()> {
    let output = Command::new(bash)
        .arg("--norc")
        .arg("--noprofile")
        .arg(script)
        .env("PATH", path)
        .current_dir(cwd)
        .output()
        .map_err(|e| Error::PostInstall {
            script: script.to_path_buf(),
            message: format!("cannot start {}: {}", bash.display(), e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::PostInstall {
            script: script.to_path_buf(),
            message: format!("{} {}", output.status, stderr.trim()),
        });
    }

    Ok(())
}
