//! Sparse per-reference coverage.
//!
//! Depth is stored as a list of breakpoints: +1 where a footprint interval starts and -1
//! where it ends.  Nothing is allocated per base, and records can arrive in any order since
//! adding breakpoints commutes.  The list is compacted (sorted, equal positions summed,
//! zeros dropped) each time it doubles in size so that the memory used tracks the number of
//! distinct boundaries rather than the number of reads.

use crate::footprint::RefInterval;

const COMPACT_MIN: usize = 1 << 16;

#[derive(Debug, Default, Clone)]
pub struct CoverageProfile {
    bkpts: Vec<(u64, i64)>,
    // Number of breakpoints after the last compaction
    compacted: usize,
    n_intervals: u64,
}

impl CoverageProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add 1 to the depth over each interval
    pub fn apply(&mut self, ivs: &[RefInterval]) {
        for iv in ivs.iter().filter(|iv| !iv.is_empty()) {
            self.bkpts.push((iv.start, 1));
            self.bkpts.push((iv.end, -1));
            self.n_intervals += 1;
        }
        self.maybe_compact()
    }

    /// Fold the contributions of `other` into self
    pub fn merge(&mut self, mut other: Self) {
        if other.bkpts.len() > self.bkpts.len() {
            std::mem::swap(self, &mut other)
        }
        self.bkpts.append(&mut other.bkpts);
        self.n_intervals += other.n_intervals;
        self.maybe_compact()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bkpts.is_empty()
    }

    #[inline]
    pub fn n_breakpoints(&self) -> usize {
        self.bkpts.len()
    }

    /// Number of footprint intervals applied so far
    #[inline]
    pub fn n_intervals(&self) -> u64 {
        self.n_intervals
    }

    fn maybe_compact(&mut self) {
        if self.bkpts.len() >= COMPACT_MIN.max(self.compacted << 1) {
            self.compact()
        }
    }

    pub fn compact(&mut self) {
        let v = &mut self.bkpts;
        v.sort_unstable_by_key(|(x, _)| *x);
        let mut k = 0;
        for i in 0..v.len() {
            let (x, d) = v[i];
            if k > 0 && v[k - 1].0 == x {
                v[k - 1].1 += d
            } else {
                v[k] = (x, d);
                k += 1;
            }
        }
        v.truncate(k);
        v.retain(|(_, d)| *d != 0);
        self.compacted = v.len();
        trace!("Compacted coverage profile to {} breakpoints", self.compacted);
    }

    /// Sorted, compacted breakpoints.  Consumes the profile.
    pub fn into_breakpoints(mut self) -> Vec<(u64, i64)> {
        self.compact();
        self.bkpts
    }

    /// Depth at position x.  Linear in the number of breakpoints.
    #[cfg(test)]
    pub fn depth_at(&self, x: u64) -> u64 {
        let d: i64 = self
            .bkpts
            .iter()
            .filter(|(p, _)| *p <= x)
            .map(|(_, d)| *d)
            .sum();
        assert!(d >= 0, "Negative depth");
        d as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(start: u64, end: u64) -> RefInterval {
        RefInterval::new(start, end)
    }

    #[test]
    fn depth_counts_overlapping_intervals() {
        let mut p = CoverageProfile::new();
        p.apply(&[iv(0, 5)]);
        p.apply(&[iv(3, 8)]);
        let d: Vec<_> = (0..9).map(|x| p.depth_at(x)).collect();
        assert_eq!(d, vec![1, 1, 1, 2, 2, 1, 1, 1, 0]);
        assert_eq!(p.n_intervals(), 2);
    }

    #[test]
    fn compaction_sums_and_drops_zeros() {
        let mut p = CoverageProfile::new();
        // [0,3) and [3,6) meet at 3 so the breakpoint there cancels out
        p.apply(&[iv(0, 3), iv(3, 6), iv(0, 6), iv(2, 2)]);
        assert_eq!(p.n_breakpoints(), 6);
        let b = p.into_breakpoints();
        assert_eq!(b, vec![(0, 2), (6, -2)]);
    }

    #[test]
    fn merge_is_order_independent() {
        let mut a = CoverageProfile::new();
        a.apply(&[iv(10, 20)]);
        let mut b = CoverageProfile::new();
        b.apply(&[iv(15, 25), iv(30, 31)]);

        let mut ab = a.clone();
        ab.merge(b.clone());
        let mut ba = b;
        ba.merge(a);
        assert_eq!(ab.n_intervals(), 3);
        assert_eq!(ab.into_breakpoints(), ba.into_breakpoints());
    }

    #[test]
    fn large_profiles_stay_bounded() {
        let mut p = CoverageProfile::new();
        for _ in 0..(COMPACT_MIN * 2) {
            p.apply(&[iv(100, 200)]);
        }
        assert!(p.n_breakpoints() < COMPACT_MIN);
        assert_eq!(p.depth_at(150), (COMPACT_MIN * 2) as u64);
    }
}
