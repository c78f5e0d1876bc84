//! Running the external wig -> bigWig converter (wigToBigWig from UCSC by default)

use std::{
    ffi::CStr,
    io::ErrorKind,
    os::unix::process::ExitStatusExt,
    path::Path,
    process::{Command, ExitStatus, Stdio},
};

use crate::error::{PipelineError, Stage};

pub struct Converter {
    program: String,
}

impl Converter {
    pub fn new<S: AsRef<str>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
        }
    }

    /// Check that the converter can be launched.  The program is run with no arguments, and
    /// only a failure to start it counts; wigToBigWig exits with an error after printing its
    /// usage message in that case.
    pub fn check_available(&self) -> Result<(), PipelineError> {
        debug!("Checking for {}", self.program);
        let res = Command::new(&self.program)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match res {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PipelineError::external_tool(
                Stage::Init,
                &self.program,
                "missing dependency: not found in PATH (wigToBigWig is available from http://hgdownload.cse.ucsc.edu/admin/exe/)",
            )),
            Err(e) => Err(PipelineError::external_tool(Stage::Init, &self.program, e)),
        }
    }

    /// Run `<program> wig sizes out` and wait for it to finish
    pub fn run(&self, wig: &Path, sizes: &Path, out: &Path) -> Result<(), PipelineError> {
        let fail = |e: String| PipelineError::external_tool(Stage::Converting, &self.program, e);
        let cmd_line = format!(
            "{} {} {} {}",
            self.program,
            wig.display(),
            sizes.display(),
            out.display()
        );
        debug!("Running \"{}\"", cmd_line);

        let output = Command::new(&self.program)
            .arg(wig)
            .arg(sizes)
            .arg(out)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| fail(format!("could not run \"{}\": {}", cmd_line, e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() {
            for l in stderr.lines() {
                debug!("{}: {}", self.program, l)
            }
            // A zero exit status without output is still a failure
            if out.is_file() {
                Ok(())
            } else {
                Err(fail(format!("{} was not created", out.display())))
            }
        } else {
            for l in stderr.lines() {
                error!("{}: {}", self.program, l)
            }
            Err(fail(format!(
                "\"{}\" {}",
                cmd_line,
                describe_status(&output.status)
            )))
        }
    }
}

fn signal_name(sig: i32) -> Option<String> {
    // SAFETY: strsignal returns a pointer to a static or thread local string, which is copied
    // before any other call can modify it
    unsafe {
        let p = libc::strsignal(sig);
        if p.is_null() {
            None
        } else {
            Some(CStr::from_ptr(p).to_string_lossy().into_owned())
        }
    }
}

/// Human readable form of a failed exit status
pub fn describe_status(st: &ExitStatus) -> String {
    match (st.code(), st.signal()) {
        (Some(c), _) => format!("returned exit status {}", c),
        (None, Some(s)) => match signal_name(s) {
            Some(name) => format!("was terminated by signal {}: {}", s, name),
            None => format!("was terminated by signal {}", s),
        },
        _ => format!("failed ({})", st),
    }
}
