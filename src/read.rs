use std::{
    path::{Path, PathBuf},
    thread::{self, ScopedJoinHandle},
};

use crossbeam_channel::{bounded, unbounded, Receiver, TryRecvError};
use rust_htslib::{
    bam::{self, Read},
    tpool::ThreadPool,
};

use super::{
    accumulate::{accumulate_thread, Accumulated},
    config::Config,
    error::{PipelineError, Stage},
    interrupt,
    process::{process_thread, ProcessBlock, ProcessCtx},
    reference::{RefTable, TidMap},
};

pub mod rec_block;
pub mod record;

use rec_block::RecBlock;

/// An opened input file with the mapping from its reference ids to the combined table
pub struct Input {
    path: PathBuf,
    rdr: bam::Reader,
    tid_map: TidMap,
}

/// Open all inputs and read their headers, building the combined reference table.  Fails
/// with [`PipelineError::InputNotFound`] before any records are read if an input cannot be
/// opened.
pub fn open_inputs(cfg: &Config) -> anyhow::Result<(RefTable, Vec<Input>)> {
    let mut refs = RefTable::new();
    let mut inputs = Vec::with_capacity(cfg.input_files().len());
    for path in cfg.input_files() {
        let rdr = open_input(path)?;
        trace!("Opened {} successfully", path.display());
        let tid_map = refs.add_header(rdr.header(), path)?;
        inputs.push(Input {
            path: path.to_owned(),
            rdr,
            tid_map,
        })
    }
    if refs.is_empty() {
        warn!("No reference sequences found in input headers")
    }
    info!(
        "Opened {} input file(s) with {} reference sequences",
        inputs.len(),
        refs.len()
    );
    Ok((refs, inputs))
}

fn open_input(path: &Path) -> Result<bam::Reader, PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::input_not_found(path, "no such file"));
    }
    bam::Reader::from_path(path).map_err(|e| PipelineError::input_not_found(path, e))
}

/// Read all records from all inputs and accumulate coverage per reference.
///
/// Threading model
///
/// We have a pool of hts threads for decompression, the main thread, a collector thread
/// and a number of process threads.
///
/// The main thread reads records from each input in turn and stores them in blocks of
/// REC_BLOCK_SIZE, which are sent to the process threads.  These apply the flag filter, expand
/// each record to its footprint and build partial coverage profiles for the block.  Partial
/// profiles are sent to the collector thread, which merges them into one profile per reference.
/// Used record blocks are sent back to the main thread so that they can be reused.  As merging
/// is commutative, blocks can be handled in any order and the input does not need to be sorted.
pub fn read_input(cfg: &Config, refs: &RefTable, inputs: Vec<Input>) -> anyhow::Result<Accumulated> {
    debug!("Processing input");

    // Set number of process threads, so we have 1-2 hts threads per proc thread
    let n_proc = cfg.threads().div_ceil(2);

    // If multiple treads requested, set up a shared htslib thread pool
    let tpool = if cfg.threads() > 1 {
        Some(ThreadPool::new(cfg.threads() as u32)?)
    } else {
        None
    };

    let tid_maps: Vec<TidMap> = inputs.iter().map(|i| i.tid_map.clone()).collect();
    let ctx = ProcessCtx::new(cfg, refs, &tid_maps);

    // Create list of blocks to hold records
    // We create enough so that each process thread can have 1 block being
    // worked on and one in reserve
    let nb = (n_proc + 1) << 1;
    let mut rec_blocks: Vec<_> = (0..nb).map(|_| RecBlock::new()).collect();

    // Channels for communication between the main thread and the process threads
    // These are for sending blocks to the process threads
    let (block_send, block_recv) = unbounded();
    // and these are for sending used blocks back to the main thread
    let (used_send, used_recv) = unbounded();
    // These channels are for sending partial coverage from the process threads to the collector
    let (out_send, out_recv) = bounded(n_proc * 8);

    let mut err: Option<anyhow::Error> = None;
    let mut acc = None;

    thread::scope(|s| {
        // Spawn collector thread
        let n_refs = refs.len();
        let collector = s.spawn(move || accumulate_thread(n_refs, out_recv));

        // Spawn process threads
        let mut process: Vec<_> = (0..n_proc)
            .map(|ix| {
                let sc = out_send.clone();
                let rc = block_recv.clone();
                let uc = used_send.clone();
                let ctx = &ctx;
                s.spawn(move || process_thread(ctx, ix, sc, rc, uc))
            })
            .collect();

        // We do this so that when the process threads exit the channel will be disconnected so the
        // collector thread will exit, and so that the main thread does not wait forever for used
        // blocks if all process threads have gone
        drop(out_send);
        drop(used_send);

        // Consecutive index for ProcessBlock structs
        let mut output_idx = 0;
        let mut rec = bam::Record::new();

        // Main process loop
        let res = 'inputs: {
            for (input_ix, mut input) in inputs.into_iter().enumerate() {
                info!("Reading {}", input.path.display());
                if let Some(tp) = tpool.as_ref() {
                    if let Err(e) = input.rdr.set_thread_pool(tp) {
                        break 'inputs Err(anyhow!("Could not attach thread pool: {}", e));
                    }
                }
                loop {
                    // Check if any of the process threads are finished.  If they have at this
                    // stage this must be because they hit an error condition, so we stop here
                    if process.iter_mut().any(|jh| jh.is_finished()) {
                        break 'inputs Ok(());
                    }
                    if let Err(e) = interrupt::check(Stage::Reading) {
                        break 'inputs Err(e.into());
                    }

                    // Get an empty RecBlock to fill
                    let mut blk = match get_rec_block(&mut rec_blocks, &used_recv) {
                        Ok(b) => b,
                        Err(e) => break 'inputs Err(e),
                    };

                    // Fill RecBlock with records from input stream
                    let eof = match fill_rec_block(&mut input, input_ix, &mut rec, &mut blk) {
                        Ok(x) => x,
                        Err(e) => break 'inputs Err(e.into()),
                    };

                    if !blk.is_empty() {
                        trace!(
                            "Sending block {} ({} records) to process threads",
                            output_idx,
                            blk.len()
                        );
                        let pb = ProcessBlock {
                            idx: output_idx,
                            rblock: blk,
                        };
                        output_idx += 1;
                        if let Err(e) = block_send.send(pb) {
                            break 'inputs Err(anyhow!(
                                "Error sending block to process threads: {}",
                                e
                            ));
                        }
                    } else {
                        rec_blocks.push(blk)
                    }

                    if eof {
                        debug!("Finished reading {}", input.path.display());
                        break;
                    }
                }
            }
            Ok(())
        };

        // Drop block_send to signal to process threads that input is finished
        drop(block_send);

        // Wait until process threads have finished and recover any errors.  If a process thread
        // failed then the main loop may also have failed, but only because the thread's channels
        // were disconnected, so the thread's error is the one to report
        for (ix, jh) in process.drain(..).enumerate() {
            if let Some(e) = join_thread(jh, || format!("Process thread {}", ix)) {
                err.get_or_insert(e);
            }
        }
        if let Err(e) = res {
            match err.as_ref() {
                Some(_) => debug!("Main loop stopped after process thread failure: {}", e),
                None => err = Some(e),
            }
        }
        // Once the process threads have gone the collector will see a disconnected channel
        match collector.join() {
            Ok(a) => acc = Some(a),
            Err(_) => {
                err.get_or_insert(anyhow!("Collector thread panicked"));
            }
        }
    });

    match (err, acc) {
        (Some(e), _) => Err(e),
        (None, Some(a)) => {
            info!("Finished processing input");
            Ok(a)
        }
        (None, None) => Err(anyhow!("Error - reading of input unsuccessful")),
    }
}

/// Fill RecBlock blk with records read from input. Returns true at end of file.
fn fill_rec_block(
    input: &mut Input,
    input_ix: usize,
    rec: &mut bam::Record,
    blk: &mut RecBlock,
) -> Result<bool, PipelineError> {
    // Reset block to empty state
    blk.clear(input_ix);

    while !blk.is_full() {
        match input.rdr.read(rec) {
            None => return Ok(true),
            Some(Ok(())) => blk.push(&*rec),
            Some(Err(e)) => {
                return Err(PipelineError::input_not_found(
                    &input.path,
                    format!("error reading record: {}", e),
                ))
            }
        }
    }
    Ok(false)
}

/// Returns an empty RecBlock from rec_blocks and recovers used blocks from the process threads.
/// Will block if no RecBlock is available, and will return an error if the channel is
/// disconnected.
fn get_rec_block(
    rec_blocks: &mut Vec<RecBlock>,
    r: &Receiver<RecBlock>,
) -> anyhow::Result<RecBlock> {
    // Non-blocking recovery of used RecBlocks from r
    try_recover_used_blocks(rec_blocks, r)?;

    loop {
        // Return RecBlock if available
        if let Some(b) = rec_blocks.pop() {
            return Ok(b);
        }

        // Blocking recovery of used RecBlocks from r
        let b = r.recv().map_err(|e| anyhow!("Error receiving used blocks: {}", e))?;
        rec_blocks.push(b);
    }
}

/// If any used RecBlocks have been sent back, recover from r and add to rec_blocks.  Will
/// recover all RecBlocks that are available in the channel, but will not block.
/// Returns an error if the channel is disconnected.
fn try_recover_used_blocks(
    rec_blocks: &mut Vec<RecBlock>,
    r: &Receiver<RecBlock>,
) -> anyhow::Result<()> {
    loop {
        match r.try_recv() {
            Ok(b) => rec_blocks.push(b),
            Err(TryRecvError::Empty) => break,
            Err(_) => return Err(anyhow!("Error - used block channel disconnected")),
        }
    }
    Ok(())
}

fn join_thread<F>(h: ScopedJoinHandle<anyhow::Result<()>>, f: F) -> Option<anyhow::Error>
where
    F: Fn() -> String,
{
    match h.join() {
        Ok(Ok(())) => None,
        Ok(Err(e)) => {
            error!("{} returned an error: {}", f(), e);
            Some(e)
        }
        Err(_) => {
            error!("{} panicked", f());
            Some(anyhow!("{} panicked", f()))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{fs, io::Write};

    use super::*;
    use crate::{config::tests::config_from_args, emit::emit};

    /// Write a small SAM file.  htslib reads SAM through the same interface as BAM.
    pub(crate) fn write_sam(dir: &Path, name: &str, sq: &[(&str, u64)], recs: &[&str]) -> PathBuf {
        let p = dir.join(name);
        let mut f = fs::File::create(&p).unwrap();
        writeln!(f, "@HD\tVN:1.6\tSO:unsorted").unwrap();
        for (n, l) in sq {
            writeln!(f, "@SQ\tSN:{}\tLN:{}", n, l).unwrap();
        }
        for r in recs {
            writeln!(f, "{}", r).unwrap();
        }
        p
    }

    /// SAM line with a sequence and qualities of the right length for the CIGAR
    pub(crate) fn sam_rec(name: &str, flag: u16, ctg: &str, pos1: u64, cigar: &str, qlen: usize) -> String {
        let seq = "A".repeat(qlen);
        let qual = "I".repeat(qlen);
        format!(
            "{}\t{}\t{}\t{}\t60\t{}\t*\t0\t0\t{}\t{}",
            name, flag, ctg, pos1, cigar, seq, qual
        )
    }

    fn runs(acc: Accumulated) -> Vec<Vec<(u64, u64, u64)>> {
        acc.profiles
            .into_iter()
            .enumerate()
            .map(|(tid, p)| {
                emit(tid, p)
                    .into_iter()
                    .map(|c| (c.start, c.end, c.depth))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn two_inputs_are_combined() {
        let dir = tempfile::tempdir().unwrap();
        let sq = [("chr1", 1000)];
        let a = write_sam(dir.path(), "a.sam", &sq, &[&sam_rec("r1", 0, "chr1", 1, "10M", 10)]);
        let b = write_sam(dir.path(), "b.sam", &sq, &[&sam_rec("r2", 16, "chr1", 1, "10M", 10)]);
        let cfg = config_from_args(&["-j", "2", a.to_str().unwrap(), b.to_str().unwrap()]);

        let (refs, inputs) = open_inputs(&cfg).unwrap();
        assert_eq!(refs.len(), 1);
        let acc = read_input(&cfg, &refs, inputs).unwrap();
        assert_eq!(acc.stats.accepted, 2);
        assert_eq!(runs(acc), vec![vec![(0, 10, 2)]]);
    }

    #[test]
    fn spliced_and_filtered_records() {
        let dir = tempfile::tempdir().unwrap();
        let sq = [("chr1", 1000), ("chr2", 500)];
        let recs = [
            sam_rec("r1", 0, "chr2", 101, "5S10M2I5M20N10M", 32),
            sam_rec("r2", 0x400, "chr2", 101, "10M", 10),
            sam_rec("r3", 0x100, "chr2", 106, "10M", 10),
            "r4\t4\t*\t0\t0\t*\t*\t0\t0\tAAAA\tIIII".to_string(),
        ];
        let recs: Vec<&str> = recs.iter().map(|s| s.as_str()).collect();
        let a = write_sam(dir.path(), "a.sam", &sq, &recs);
        let cfg = config_from_args(&["-d", "-j", "1", a.to_str().unwrap()]);

        let (refs, inputs) = open_inputs(&cfg).unwrap();
        let acc = read_input(&cfg, &refs, inputs).unwrap();
        assert_eq!(acc.stats.records, 4);
        assert_eq!(acc.stats.unmapped, 1);
        assert_eq!(acc.stats.rejected[2], 1);
        assert_eq!(
            runs(acc),
            vec![
                vec![],
                vec![(100, 105, 1), (105, 115, 2), (135, 145, 1)]
            ]
        );
    }

    #[test]
    fn missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nothing.bam");
        let cfg = config_from_args(&[p.to_str().unwrap()]);
        let e = open_inputs(&cfg).err().expect("open should fail");
        assert!(matches!(
            e.downcast_ref::<PipelineError>(),
            Some(PipelineError::InputNotFound { .. })
        ));
    }
}
