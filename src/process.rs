pub mod profile_block;

use std::{
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
};

use crossbeam_channel::{Receiver, Sender};

use super::{
    config::Config,
    error::{MalformedRecord, PipelineError},
    filter::{FilterConfig, BAM_FUNMAP},
    footprint::{record_footprint, RefInterval},
    read::{rec_block::RecBlock, record::AlnRecord},
    reference::{RefTable, TidMap},
};

use profile_block::ProfileBlock;

// Malformed records beyond this number are only reported at debug level
const MAX_MALFORMED_WARNINGS: usize = 10;

/// Block of records sent from the reader to the process threads
pub(crate) struct ProcessBlock {
    pub(crate) idx: usize,
    pub(crate) rblock: RecBlock,
}

/// Everything the process threads need to know about the run.  Shared between all threads.
pub(crate) struct ProcessCtx<'a> {
    filter: FilterConfig,
    strict: bool,
    refs: &'a RefTable,
    inputs: &'a [PathBuf],
    tid_maps: &'a [TidMap],
    warned: AtomicUsize,
}

impl<'a> ProcessCtx<'a> {
    pub(crate) fn new(cfg: &'a Config, refs: &'a RefTable, tid_maps: &'a [TidMap]) -> Self {
        Self::with_filter(
            *cfg.filter(),
            cfg.strict(),
            refs,
            cfg.input_files(),
            tid_maps,
        )
    }

    pub(crate) fn with_filter(
        filter: FilterConfig,
        strict: bool,
        refs: &'a RefTable,
        inputs: &'a [PathBuf],
        tid_maps: &'a [TidMap],
    ) -> Self {
        assert_eq!(inputs.len(), tid_maps.len());
        Self {
            filter,
            strict,
            refs,
            inputs,
            tid_maps,
            warned: AtomicUsize::new(0),
        }
    }

    fn report_malformed(&self, input_ix: usize, e: &MalformedRecord) {
        let n = self.warned.fetch_add(1, Ordering::Relaxed);
        let path = self.inputs[input_ix].display();
        if n < MAX_MALFORMED_WARNINGS {
            warn!("Skipping malformed record in {}: {}", path, e)
        } else {
            if n == MAX_MALFORMED_WARNINGS {
                warn!("Further malformed records will be reported at debug level")
            }
            debug!("Skipping malformed record in {}: {}", path, e)
        }
    }
}

/// Filter -> expand -> accumulate for one record.  Unmapped and filtered records are
/// tallied and otherwise ignored.
fn process_record<R: AlnRecord + ?Sized>(
    ctx: &ProcessCtx,
    tid_map: &TidMap,
    rec: &R,
    pb: &mut ProfileBlock,
    buf: &mut Vec<RefInterval>,
) -> Result<(), MalformedRecord> {
    let flags = rec.flags();
    let stats = pb.stats_mut();
    stats.records += 1;

    if flags & BAM_FUNMAP != 0 {
        stats.unmapped += 1;
        return Ok(());
    }

    if !ctx.filter.accept(flags) {
        if let Some(r) = ctx.filter.rejected_by(flags) {
            stats.reject(r)
        }
        return Ok(());
    }

    let tid = tid_map.get(rec.tid()).ok_or(MalformedRecord::BadRefId {
        tid: rec.tid(),
        n_refs: tid_map.len(),
    })?;
    let ctg = ctx
        .refs
        .get(tid)
        .ok_or(MalformedRecord::BadRefId {
            tid: tid as i64,
            n_refs: ctx.refs.len(),
        })?;

    let end = record_footprint(rec, buf)?;
    if end > ctg.len() {
        return Err(MalformedRecord::PastEnd {
            ctg: ctg.name().to_owned(),
            end,
            len: ctg.len(),
        });
    }

    let stats = pb.stats_mut();
    stats.accepted += 1;
    stats.intervals += buf.len() as u64;
    stats.bases += buf.iter().map(|iv| iv.len()).sum::<u64>();
    pb.apply(tid, buf);
    Ok(())
}

/// Process records from input `input_ix` into a new [`ProfileBlock`].  Malformed records are
/// skipped unless strict mode is on.
pub(crate) fn process_records<I, R>(
    ctx: &ProcessCtx,
    input_ix: usize,
    idx: usize,
    recs: I,
) -> Result<ProfileBlock, PipelineError>
where
    I: IntoIterator<Item = R>,
    R: AlnRecord,
{
    let tid_map = &ctx.tid_maps[input_ix];
    let mut pb = ProfileBlock::new(idx);
    let mut buf = Vec::new();
    for rec in recs {
        if let Err(e) = process_record(ctx, tid_map, &rec, &mut pb, &mut buf) {
            if ctx.strict {
                error!(
                    "Malformed record in {}: {}",
                    ctx.inputs[input_ix].display(),
                    e
                );
                return Err(e.into());
            }
            pb.stats_mut().malformed += 1;
            ctx.report_malformed(input_ix, &e)
        }
    }
    Ok(pb)
}

pub(crate) fn process_thread(
    ctx: &ProcessCtx,
    ix: usize,
    out_send: Sender<ProfileBlock>,
    block_recv: Receiver<ProcessBlock>,
    block_send: Sender<RecBlock>,
) -> anyhow::Result<()> {
    debug!("process thread {} starting up", ix);

    for proc_blk in block_recv.iter() {
        let ProcessBlock { idx, rblock } = proc_blk;
        trace!("process thread {} received block {}", ix, idx);

        let profile_block = process_records(ctx, rblock.input_ix(), idx, rblock.iter())?;

        // Send partial coverage to the collector thread
        out_send.send(profile_block)?;
        // Send completed block back to main thread
        block_send.send(rblock)?
    }
    debug!("process thread {} shutting down", ix);
    Ok(())
}
