use std::{
    ffi::{CString, OsString},
    io,
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

use clap::{builder::PossibleValue, ArgMatches, ValueEnum};

use crate::error::{PipelineError, Stage};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogLevel {
    None,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn verbosity(&self) -> usize {
        match self {
            Self::None | Self::Error => 0,
            Self::Warn => 1,
            Self::Info => 2,
            Self::Debug => 3,
            Self::Trace => 4,
        }
    }
}

impl ValueEnum for LogLevel {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            Self::None,
            Self::Error,
            Self::Warn,
            Self::Info,
            Self::Debug,
            Self::Trace,
        ]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(PossibleValue::new(match self {
            Self::None => "none",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }))
    }
}

pub fn init_log(m: &ArgMatches) -> anyhow::Result<()> {
    let level = m
        .get_one::<LogLevel>("loglevel")
        .copied()
        .unwrap_or(LogLevel::Info);
    let quiet = m.get_flag("quiet") || level == LogLevel::None;
    let ts = m
        .get_one::<stderrlog::Timestamp>("timestamp")
        .copied()
        .unwrap_or(stderrlog::Timestamp::Off);

    stderrlog::new()
        .quiet(quiet)
        .verbosity(level.verbosity())
        .timestamp(ts)
        .init()?;
    Ok(())
}

/// Append a suffix to a path without replacing any existing extension
pub fn with_suffix<P: AsRef<Path>>(p: P, suffix: &str) -> PathBuf {
    let mut s = OsString::from(p.as_ref().as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// Check that `p` can be written: if it exists it must be writable, otherwise its directory
/// must be.
pub fn check_writable(p: &Path, stage: Stage) -> Result<(), PipelineError> {
    let target = if p.exists() {
        p.to_owned()
    } else {
        match p.parent() {
            Some(d) if !d.as_os_str().is_empty() => d.to_owned(),
            _ => PathBuf::from("."),
        }
    };
    let c = CString::new(target.as_os_str().as_bytes())
        .map_err(|e| PipelineError::output_write(stage, p, e))?;

    // SAFETY: c is a valid nul terminated string that outlives the call
    if unsafe { libc::access(c.as_ptr(), libc::W_OK) } == 0 {
        Ok(())
    } else {
        let e = io::Error::last_os_error();
        Err(PipelineError::output_write(
            stage,
            p,
            format!("write permission denied for {} ({})", target.display(), e),
        ))
    }
}
