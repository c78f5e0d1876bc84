use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Pipeline stages, in the order they are entered.  A run only ever moves forward
/// through these.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Init,
    Reading,
    Emitting,
    Converting,
    Cleanup,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Reading => "reading",
            Self::Emitting => "emitting",
            Self::Converting => "converting",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
        };
        write!(f, "{}", s)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("[{stage}] input not found or unreadable: {}: {reason}", .path.display())]
    InputNotFound {
        stage: Stage,
        path: PathBuf,
        reason: String,
    },
    #[error("[{stage}] malformed record: {0}", stage = Stage::Reading)]
    MalformedRecord(#[from] MalformedRecord),
    #[error("[{stage}] external tool {program} failed: {reason}")]
    ExternalToolFailure {
        stage: Stage,
        program: String,
        reason: String,
    },
    #[error("[{stage}] could not write {}: {reason}", .path.display())]
    OutputWriteFailure {
        stage: Stage,
        path: PathBuf,
        reason: String,
    },
    #[error("[{stage}] interrupted")]
    Interrupted { stage: Stage },
}

impl PipelineError {
    pub fn input_not_found<P: Into<PathBuf>, E: fmt::Display>(path: P, e: E) -> Self {
        Self::InputNotFound {
            stage: Stage::Reading,
            path: path.into(),
            reason: e.to_string(),
        }
    }

    pub fn output_write<P: Into<PathBuf>, E: fmt::Display>(stage: Stage, path: P, e: E) -> Self {
        Self::OutputWriteFailure {
            stage,
            path: path.into(),
            reason: e.to_string(),
        }
    }

    pub fn external_tool<S: AsRef<str>, E: fmt::Display>(stage: Stage, program: S, e: E) -> Self {
        Self::ExternalToolFailure {
            stage,
            program: program.as_ref().to_owned(),
            reason: e.to_string(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InputNotFound { .. } => 2,
            Self::MalformedRecord(_) => 3,
            Self::ExternalToolFailure { .. } => 4,
            Self::OutputWriteFailure { .. } => 5,
            Self::Interrupted { .. } => 130,
        }
    }
}

/// Why a single alignment record could not be turned into a footprint.  By default these are
/// logged and the record is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("reference id {tid} not in reference table of {n_refs} sequences")]
    BadRefId { tid: i64, n_refs: usize },
    #[error("negative position {0} for mapped record")]
    BadPosition(i64),
    #[error("unknown CIGAR operation code {0}")]
    BadCigarOp(u32),
    #[error("alignment ends at {end}, past the end of {ctg} (length {len})")]
    PastEnd { ctg: String, end: u64, len: u64 },
}

/// Exit code for an error coming out of main().  Typed pipeline errors get their own codes,
/// anything else is a usage or configuration problem.
pub fn exit_code(e: &anyhow::Error) -> i32 {
    e.chain()
        .find_map(|c| c.downcast_ref::<PipelineError>())
        .map_or(1, |p| p.exit_code())
}

/// Report a fatal error and return the exit code.  If logging is switched off (`--quiet` or
/// `-l none`) the message goes straight to `w` so that the failing stage is still shown.
pub fn report<W: std::io::Write>(e: &anyhow::Error, logged: bool, w: &mut W) -> i32 {
    if logged {
        error!("{:#}", e)
    } else {
        let _ = writeln!(w, "Error: {:#}", e);
    }
    exit_code(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_kinds() {
        let input = PipelineError::input_not_found("a.bam", "No such file");
        let tool = PipelineError::external_tool(Stage::Converting, "wigToBigWig", "exit status 255");
        let out = PipelineError::output_write(Stage::Emitting, "a.wig", "Permission denied");
        let codes = [input.exit_code(), tool.exit_code(), out.exit_code()];
        assert_eq!(codes, [2, 4, 5]);
    }

    #[test]
    fn exit_code_found_through_context() {
        let e = anyhow::Error::new(PipelineError::Interrupted {
            stage: Stage::Reading,
        })
        .context("Error processing input");
        assert_eq!(exit_code(&e), 130);
        assert_eq!(exit_code(&anyhow!("bad option")), 1);
    }

    #[test]
    fn report_without_logging() {
        let e = anyhow::Error::new(PipelineError::external_tool(
            Stage::Converting,
            "wigToBigWig",
            "returned exit status 255",
        ));
        let mut w = Vec::new();
        assert_eq!(report(&e, false, &mut w), 4);
        let s = String::from_utf8(w).unwrap();
        assert!(s.starts_with("Error: [converting] external tool wigToBigWig failed"), "{}", s);

        let mut w = Vec::new();
        assert_eq!(report(&e, true, &mut w), 4);
        assert!(w.is_empty());
    }

    #[test]
    fn message_names_stage() {
        let e = PipelineError::external_tool(Stage::Converting, "wigToBigWig", "exit status 1");
        assert!(e.to_string().starts_with("[converting]"));
        let m = PipelineError::from(MalformedRecord::BadCigarOp(12));
        assert!(m.to_string().starts_with("[reading]"));
    }
}
