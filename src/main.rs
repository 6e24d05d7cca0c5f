use clap::Parser;
use cygstrap::{Arch, Config, Settings};
use std::path::PathBuf;

mod commands;

/// cygstrap - bootstrap a Cygwin installation from a mirror
#[derive(Parser)]
#[command(name = "cygstrap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Target directory for the Cygwin installation (e.g. C:\cygwin); must not exist
    #[arg(long)]
    target: Option<PathBuf>,

    /// Where downloaded artifacts are stored; ${target} expands to the target directory
    #[arg(long, value_name = "TEMPLATE")]
    distfiles: Option<String>,

    /// Cygwin architecture (x86 or x86_64) [default: x86_64]
    #[arg(long)]
    arch: Option<String>,

    /// Mirrors to download from, tried in order (comma separated) [default: http://mirrors.dotsrc.org/cygwin]
    #[arg(long, value_delimiter = ',')]
    mirrors: Vec<String>,

    /// Packages to install (comma separated) [default: a minimal base system]
    #[arg(long, value_delimiter = ',')]
    packages: Vec<String>,

    /// Only fetch distfiles, don't install anything (implies --keep-distfiles)
    #[arg(long)]
    fetch_only: bool,

    /// Keep the distfiles directory after installing
    #[arg(long)]
    keep_distfiles: bool,

    /// TOML file with default values for any of the options above
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Warn;
        }
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    fn settings(&self) -> cygstrap::Result<Settings> {
        Ok(Settings {
            target: self.target.clone(),
            distfiles: self.distfiles.clone(),
            arch: self.arch.as_deref().map(str::parse::<Arch>).transpose()?,
            mirrors: non_empty(&self.mirrors),
            packages: non_empty(&self.packages),
            fetch_only: self.fetch_only.then_some(true),
            keep_distfiles: self.keep_distfiles.then_some(true),
        })
    }
}

fn non_empty(items: &[String]) -> Option<Vec<String>> {
    (!items.is_empty()).then(|| items.to_vec())
}

fn load_config(cli: &Cli) -> cygstrap::Result<Config> {
    let file = cli
        .config
        .as_ref()
        .map(Settings::load_file)
        .transpose()?;
    Config::resolve(cli.settings()?, file)
}

/// Exit code for a failed run: 2 when a fatal error sits anywhere in the
/// context chain, 1 otherwise.
fn exit_code(error: &anyhow::Error) -> i32 {
    let fatal = error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<cygstrap::Error>())
        .any(cygstrap::Error::is_fatal);
    if fatal {
        2
    } else {
        1
    }
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();

    let result = load_config(&cli)
        .map_err(anyhow::Error::from)
        .and_then(|config| commands::bootstrap::run(&config));

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}
