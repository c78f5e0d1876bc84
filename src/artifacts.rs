use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::{
    config::Config,
    error::{PipelineError, Stage},
};

/// The intermediate coverage and sizes files.  Unless they are to be kept, they are removed
/// when the run finishes, whether or not it succeeded.
pub struct Artifacts {
    wig: PathBuf,
    sizes: PathBuf,
    keep: bool,
    done: bool,
}

fn make_tempfile(suffix: &str) -> Result<PathBuf, PipelineError> {
    let dir = std::env::temp_dir();
    let werr = |e: std::io::Error| PipelineError::output_write(Stage::Init, &dir, e);
    tempfile::Builder::new()
        .prefix("bam2bigwig.")
        .suffix(suffix)
        .tempfile()
        .map_err(werr)?
        .into_temp_path()
        .keep()
        .map_err(|e| werr(e.error))
}

impl Artifacts {
    /// Choose names for the intermediate files.  With `--tempfile` these are created (empty)
    /// in the system temporary directory, otherwise they are derived from the input prefix.
    pub fn new(cfg: &Config) -> Result<Self, PipelineError> {
        let keep = cfg.keep_tempfile();
        let (wig, sizes) = if cfg.use_tempfile() {
            let wig = make_tempfile(".wig")?;
            // Do not leave the first file behind if the second can not be made
            let sizes = match make_tempfile(".sizes") {
                Ok(p) => p,
                Err(e) => {
                    let _ = fs::remove_file(&wig);
                    return Err(e);
                }
            };
            (wig, sizes)
        } else {
            (cfg.wig_file(), cfg.sizes_file())
        };
        debug!(
            "Intermediate files: {} and {}",
            wig.display(),
            sizes.display()
        );
        Ok(Self {
            wig,
            sizes,
            keep,
            done: false,
        })
    }

    pub fn wig(&self) -> &Path {
        &self.wig
    }

    pub fn sizes(&self) -> &Path {
        &self.sizes
    }

    /// Remove the intermediate files unless they are to be kept.  Files that were never
    /// created are ignored.  Calling this more than once has no further effect.
    pub fn cleanup(&mut self) -> Result<(), PipelineError> {
        if self.done {
            return Ok(());
        }
        self.done = true;
        if self.keep {
            info!(
                "Keeping intermediate files {} and {}",
                self.wig.display(),
                self.sizes.display()
            );
            return Ok(());
        }
        let mut res = Ok(());
        for p in [&self.sizes, &self.wig] {
            match fs::remove_file(p) {
                Ok(()) => debug!("Removed {}", p.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => (),
                Err(e) => {
                    warn!("Could not remove {}: {}", p.display(), e);
                    if res.is_ok() {
                        res = Err(PipelineError::output_write(Stage::Cleanup, p, e))
                    }
                }
            }
        }
        res
    }
}

impl Drop for Artifacts {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
