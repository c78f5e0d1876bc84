use crate::{
    coverage::CoverageProfile,
    filter::Rule,
    footprint::RefInterval,
};

/// Record tallies for one block (and, once summed, for the whole run)
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReadStats {
    pub records: u64,
    pub unmapped: u64,
    pub rejected: [u64; 4],
    pub malformed: u64,
    pub accepted: u64,
    pub intervals: u64,
    pub bases: u64,
}

impl ReadStats {
    pub fn add(&mut self, other: &Self) {
        self.records += other.records;
        self.unmapped += other.unmapped;
        for (a, b) in self.rejected.iter_mut().zip(other.rejected.iter()) {
            *a += *b
        }
        self.malformed += other.malformed;
        self.accepted += other.accepted;
        self.intervals += other.intervals;
        self.bases += other.bases;
    }

    #[inline]
    pub fn reject(&mut self, r: Rule) {
        self.rejected[r as usize] += 1
    }

    pub fn log(&self) {
        info!(
            "Records read: {}, unmapped: {}, malformed (skipped): {}, used: {} ({} footprint intervals, {} bases)",
            self.records, self.unmapped, self.malformed, self.accepted, self.intervals, self.bases
        );
        for r in Rule::ALL {
            let n = self.rejected[r as usize];
            if n > 0 {
                info!("Records ignored as {}: {}", r.name(), n)
            }
        }
    }
}

/// Partial coverage from one block of records, with one profile for each reference
/// seen in the block
#[derive(Debug, Default)]
pub struct ProfileBlock {
    idx: usize,
    profiles: Vec<(usize, CoverageProfile)>,
    stats: ReadStats,
}

impl ProfileBlock {
    pub fn new(idx: usize) -> Self {
        Self {
            idx,
            ..Default::default()
        }
    }

    #[inline]
    pub fn idx(&self) -> usize {
        self.idx
    }

    #[cfg(test)]
    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    #[inline]
    pub fn stats_mut(&mut self) -> &mut ReadStats {
        &mut self.stats
    }

    /// Add a footprint on reference `tid`
    pub fn apply(&mut self, tid: usize, ivs: &[RefInterval]) {
        // Blocks from sorted input nearly always hit the last reference used
        let ix = match self.profiles.last() {
            Some((t, _)) if *t == tid => self.profiles.len() - 1,
            _ => match self.profiles.iter().position(|(t, _)| *t == tid) {
                Some(i) => i,
                None => {
                    self.profiles.push((tid, CoverageProfile::new()));
                    self.profiles.len() - 1
                }
            },
        };
        self.profiles[ix].1.apply(ivs)
    }

    pub fn into_parts(self) -> (Vec<(usize, CoverageProfile)>, ReadStats) {
        (self.profiles, self.stats)
    }
}
