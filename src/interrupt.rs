//! SIGINT / SIGTERM handling.  The handlers only set a flag; long running loops poll it so
//! that the run stops cleanly and intermediate files are still removed.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{PipelineError, Stage};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_sig: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst)
}

pub fn install_handlers() {
    let h = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    // SAFETY: the handler only performs an atomic store
    unsafe {
        libc::signal(libc::SIGINT, h);
        libc::signal(libc::SIGTERM, h);
    }
}

#[inline]
pub fn requested() -> bool {
    #[cfg(test)]
    if tests::THREAD_INTERRUPTED.with(|c| c.get()) {
        return true;
    }
    INTERRUPTED.load(Ordering::Relaxed)
}

/// Error out if an interrupt has been received
#[inline]
pub fn check(stage: Stage) -> Result<(), PipelineError> {
    if requested() {
        Err(PipelineError::Interrupted { stage })
    } else {
        Ok(())
    }
}
