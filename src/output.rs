use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    thread,
};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use super::{
    config::Config,
    coverage::CoverageProfile,
    emit::{emit, write_intervals, CoverageInterval},
    error::{PipelineError, Stage},
    interrupt,
    reference::RefTable,
};

type Emitted = (usize, Vec<CoverageInterval>);

fn emit_thread(ix: usize, r: Receiver<(usize, CoverageProfile)>, s: Sender<Emitted>) {
    debug!("emit thread {} starting up", ix);
    for (tid, profile) in r.iter() {
        if interrupt::requested() {
            break;
        }
        trace!(
            "emit thread {} received reference {} ({} intervals, {} breakpoints)",
            ix,
            tid,
            profile.n_intervals(),
            profile.n_breakpoints()
        );
        let ivs = emit(tid, profile);
        // Only fails if the writer has given up
        if s.send((tid, ivs)).is_err() {
            break;
        }
    }
    debug!("emit thread {} shutting down", ix);
}

/// Write coverage for all references to `path` in bedGraph form.  References are processed in
/// parallel but written in reference table order.  Returns the number of intervals written.
pub fn write_coverage(
    cfg: &Config,
    refs: &RefTable,
    profiles: Vec<CoverageProfile>,
    path: &Path,
) -> Result<u64, PipelineError> {
    assert_eq!(refs.len(), profiles.len());
    let werr = |e: std::io::Error| PipelineError::output_write(Stage::Emitting, path, e);

    let mut wrt = BufWriter::new(File::create(path).map_err(werr)?);

    let n_refs = profiles.len();
    let n_workers = cfg.threads().min(n_refs).max(1);
    debug!(
        "Emitting coverage for {} references ({} with coverage) using {} threads",
        n_refs,
        profiles.iter().filter(|p| !p.is_empty()).count(),
        n_workers
    );

    let (job_send, job_recv) = unbounded();
    let (res_send, res_recv) = bounded(n_workers * 2);
    for job in profiles.into_iter().enumerate() {
        // Can not fail as we still hold job_recv
        let _ = job_send.send(job);
    }
    drop(job_send);

    let n = thread::scope(|s| {
        for ix in 0..n_workers {
            let r = job_recv.clone();
            let sc = res_send.clone();
            s.spawn(move || emit_thread(ix, r, sc));
        }
        drop(res_send);

        // Results can arrive in any order, so hold them here until their turn comes
        let mut pending = BTreeMap::new();
        let mut next = 0;
        let mut n_ivs = 0;
        let res = 'out: {
            for (tid, ivs) in res_recv.iter() {
                if let Err(e) = interrupt::check(Stage::Emitting) {
                    break 'out Err(e);
                }
                pending.insert(tid, ivs);
                while let Some(ivs) = pending.remove(&next) {
                    debug_assert!(ivs.iter().all(|iv| iv.tid == next));
                    if let Some(ctg) = refs.get(next) {
                        if let Err(e) = write_intervals(&mut wrt, ctg, &ivs) {
                            break 'out Err(werr(e));
                        }
                        trace!("Wrote {} intervals for {}", ivs.len(), ctg.name());
                    }
                    n_ivs += ivs.len() as u64;
                    next += 1;
                }
            }
            // Emit threads stop early on interrupt, leaving references unwritten
            if let Err(e) = interrupt::check(Stage::Emitting) {
                break 'out Err(e);
            }
            if next < n_refs {
                break 'out Err(PipelineError::output_write(
                    Stage::Emitting,
                    path,
                    format!("coverage missing for {} reference(s)", n_refs - next),
                ));
            }
            Ok(n_ivs)
        };
        // Make any remaining emit threads exit
        drop(res_recv);
        res
    })?;

    wrt.flush().map_err(werr)?;
    Ok(n)
}

/// Write the chromosome sizes table to `path`
pub fn write_sizes(refs: &RefTable, path: &Path) -> Result<(), PipelineError> {
    let werr = |e: std::io::Error| PipelineError::output_write(Stage::Emitting, path, e);
    let mut wrt = BufWriter::new(File::create(path).map_err(werr)?);
    refs.write_sizes(&mut wrt).map_err(werr)?;
    wrt.flush().map_err(werr)
}
