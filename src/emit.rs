//! Conversion of a finished [`CoverageProfile`] into run-length intervals.
//!
//! Runs are produced by one sweep over the sorted breakpoints.  Zero depth runs are never
//! emitted, and neighbouring runs with the same depth are merged so that output intervals are
//! maximal.

use std::io::{self, Write};

use crate::{coverage::CoverageProfile, reference::RefSeq};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CoverageInterval {
    pub tid: usize,
    pub start: u64,
    pub end: u64,
    pub depth: u64,
}

impl CoverageInterval {
    pub fn new(tid: usize, start: u64, end: u64, depth: u64) -> Self {
        Self {
            tid,
            start,
            end,
            depth,
        }
    }
}

/// Run-length intervals for reference `tid`.  The profile is consumed.
pub fn emit(tid: usize, profile: CoverageProfile) -> Vec<CoverageInterval> {
    let bkpts = profile.into_breakpoints();
    let mut out: Vec<CoverageInterval> = Vec::new();

    let mut depth: i64 = 0;
    let mut x0 = 0;
    let mut i = 0;
    while i < bkpts.len() {
        let x = bkpts[i].0;
        if depth > 0 && x > x0 {
            let d = depth as u64;
            match out.last_mut() {
                Some(c) if c.end == x0 && c.depth == d => c.end = x,
                _ => out.push(CoverageInterval::new(tid, x0, x, d)),
            }
        }
        // Apply all changes at this position before starting the next run
        while i < bkpts.len() && bkpts[i].0 == x {
            depth += bkpts[i].1;
            i += 1;
        }
        assert!(depth >= 0, "Negative depth at {}", x);
        x0 = x;
    }
    assert_eq!(depth, 0, "Unbalanced breakpoints");
    out
}

/// Write intervals in bedGraph form: `name<TAB>start<TAB>end<TAB>depth`
pub fn write_intervals<W: Write>(
    w: &mut W,
    ctg: &RefSeq,
    ivs: &[CoverageInterval],
) -> io::Result<()> {
    let name = ctg.name();
    for iv in ivs {
        writeln!(w, "{}\t{}\t{}\t{}", name, iv.start, iv.end, iv.depth)?
    }
    Ok(())
}
