use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use clap::ArgMatches;

use super::{
    cli::cli_model,
    filter::FilterConfig,
    utils::{init_log, with_suffix},
};

#[derive(Debug, Clone)]
pub struct Config {
    // Input files - coverage from all is combined
    input_files: Vec<PathBuf>,
    // First input without its extension.  Intermediate files are named from this
    prefix: PathBuf,
    bigwig_file: PathBuf,
    // Intermediate file handling
    use_tempfile: bool,
    keep_tempfile: bool,
    force: bool,
    // Record selection
    filter: FilterConfig,
    strict: bool,
    // External wig -> bigWig converter
    converter: String,
    // General options:
    threads: usize,
}

impl Config {
    pub fn input_files(&self) -> &[PathBuf] {
        &self.input_files
    }
    pub fn bigwig_file(&self) -> &Path {
        &self.bigwig_file
    }
    pub fn use_tempfile(&self) -> bool {
        self.use_tempfile
    }
    pub fn keep_tempfile(&self) -> bool {
        self.keep_tempfile
    }
    pub fn force(&self) -> bool {
        self.force
    }
    pub fn filter(&self) -> &FilterConfig {
        &self.filter
    }
    pub fn strict(&self) -> bool {
        self.strict
    }
    pub fn converter(&self) -> &str {
        &self.converter
    }
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Deterministic name for the intermediate coverage (wig) file
    pub fn wig_file(&self) -> PathBuf {
        with_suffix(&self.prefix, ".wig")
    }

    /// Deterministic name for the intermediate chromosome sizes file
    pub fn sizes_file(&self) -> PathBuf {
        with_suffix(&self.prefix, ".sizes")
    }
}

pub fn handle_cli() -> anyhow::Result<Config> {
    // Get matches from command line
    let m = cli_model().get_matches();

    // Setup logging
    init_log(&m)?;

    debug!("Processing command line options");
    config_from_matches(&m)
}

fn config_from_matches(m: &ArgMatches) -> anyhow::Result<Config> {
    let input_files: Vec<PathBuf> = m
        .get_many::<PathBuf>("input")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();

    let first = input_files
        .first()
        .ok_or_else(|| anyhow!("No input files given"))?;

    // <prefix>.bigwig, <prefix>.wig and <prefix>.sizes where prefix is the first input
    // minus its (last) extension
    let prefix = first.with_extension("");
    let bigwig_file = m
        .get_one::<PathBuf>("bigwig")
        .cloned()
        .unwrap_or_else(|| with_suffix(&prefix, ".bigwig"));

    let filter = FilterConfig {
        ignore_secondary: m.get_flag("ignore_secondary"),
        ignore_qc_fail: m.get_flag("ignore_qc_fail"),
        ignore_duplicate: m.get_flag("ignore_duplicate"),
        ignore_supplementary: m.get_flag("ignore_supplementary"),
    };

    // Threads option should be non-zero.  If not set, set to number of available CPUs
    let threads = m
        .get_one::<NonZeroUsize>("threads")
        .map(|i| usize::from(*i))
        .unwrap_or_else(num_cpus::get);

    let converter = m
        .get_one::<String>("converter")
        .cloned()
        .ok_or_else(|| anyhow!("Missing default converter option"))?;

    Ok(Config {
        input_files,
        prefix,
        bigwig_file,
        use_tempfile: m.get_flag("tempfile"),
        keep_tempfile: m.get_flag("keep_tempfile"),
        force: m.get_flag("force"),
        filter,
        strict: m.get_flag("strict"),
        converter,
        threads,
    })
}
