use anyhow::{anyhow, Context, Result};
use cygstrap::{signing, target, Catalog, Config, Fetcher, InstallOutcome, Installer, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Create an indicatif byte counter per download
fn create_download_callback() -> ProgressCallback {
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    let current_bar: Arc<Mutex<Option<(String, ProgressBar)>>> = Arc::new(Mutex::new(None));

    Arc::new(move |msg: &str, current: u64, total: u64| {
        let Ok(mut slot) = current_bar.lock() else {
            return;
        };

        let is_new = slot.as_ref().map_or(true, |(label, _)| label != msg);
        if is_new {
            if let Some((_, old)) = slot.take() {
                old.finish_and_clear();
            }
            let bar = ProgressBar::new(total);
            bar.set_style(style.clone());
            bar.set_message(msg.to_string());
            *slot = Some((msg.to_string(), bar));
        }

        if let Some((_, bar)) = slot.as_ref() {
            if total > 0 {
                bar.set_length(total);
            }
            bar.set_position(current);
            if total > 0 && current >= total {
                bar.finish_and_clear();
            }
        }
    })
}

pub fn run(config: &Config) -> Result<()> {
    if !config.fetch_only {
        let target_dir = config
            .target
            .as_ref()
            .ok_or_else(|| anyhow!("missing argument: target"))?;
        log::info!("preparing target '{}'", target_dir.display());
        target::prepare(target_dir).context("unable to prepare target")?;
    }

    let distfiles = config.distfiles();
    log::info!("preparing distfiles '{}'", distfiles.display());
    fs::create_dir_all(&distfiles).with_context(|| {
        format!("unable to prepare distfiles '{}'", distfiles.display())
    })?;

    let mut fetcher = Fetcher::new(config.mirrors.clone(), &distfiles)?;
    if log::log_enabled!(log::Level::Info) {
        fetcher = fetcher.with_progress(create_download_callback());
    }

    let setup_ini = config.setup_ini();
    let setup_ini_sig = format!("{}.sig", setup_ini);

    log::info!("fetching {}", setup_ini);
    let catalog_path = fetcher
        .ensure_fetched(&setup_ini, None, "")
        .context("unable to download setup.ini")?;

    log::info!("fetching {}", setup_ini_sig);
    let signature_path = fetcher
        .ensure_fetched(&setup_ini_sig, None, "")
        .context("unable to download setup.ini.sig")?;

    log::info!("verifying setup.ini signature");
    signing::verify_detached(&catalog_path, &signature_path)
        .context("unable to verify setup.ini signature")?;

    log::info!("reading setup.ini");
    let catalog = Catalog::load(&catalog_path).context("unable to parse setup.ini")?;
    log::debug!("catalog lists {} records", catalog.len());

    let target_dir = config.target.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut installer =
        Installer::new(&catalog, &fetcher, target_dir).fetch_only(config.fetch_only);

    for package in &config.packages {
        let outcome = installer
            .install(package, &[])
            .with_context(|| format!("package install failed: {}", package))?;

        if outcome == InstallOutcome::AlreadyInstalled {
            log::debug!("'{}' was already installed as a requirement", package);
        }
    }

    if !config.fetch_only {
        target::configure_nsswitch(installer.target_dir())
            .context("unable to configure etc/nsswitch.conf")?;
    }

    if !config.keep_distfiles {
        log::info!("removing distfiles directory");
        fs::remove_dir_all(&distfiles).with_context(|| {
            format!("unable to remove distfiles '{}'", distfiles.display())
        })?;
    }

    log::info!("done, {} packages installed", installer.installed().len());
    Ok(())
}
