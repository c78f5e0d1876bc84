use crossbeam_channel::Receiver;

use super::{
    coverage::CoverageProfile,
    process::profile_block::{ProfileBlock, ReadStats},
};

/// Coverage for every reference after all inputs have been read
pub struct Accumulated {
    pub profiles: Vec<CoverageProfile>,
    pub stats: ReadStats,
}

impl Accumulated {
    pub fn new(n_refs: usize) -> Self {
        let mut profiles = Vec::with_capacity(n_refs);
        profiles.resize_with(n_refs, CoverageProfile::new);
        Self {
            profiles,
            stats: ReadStats::default(),
        }
    }

    /// Merge a block of partial coverage.  Blocks can arrive in any order.
    pub fn add_block(&mut self, blk: ProfileBlock) {
        let (profiles, stats) = blk.into_parts();
        for (tid, p) in profiles {
            self.profiles[tid].merge(p)
        }
        self.stats.add(&stats)
    }
}

pub(super) fn accumulate_thread(n_refs: usize, r: Receiver<ProfileBlock>) -> Accumulated {
    debug!("Collector thread starting up");
    let mut acc = Accumulated::new(n_refs);
    for blk in r.iter() {
        trace!("Collector received block {}", blk.idx());
        acc.add_block(blk)
    }
    debug!("Collector thread shutting down");
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::footprint::RefInterval;

    #[test]
    fn blocks_merge_per_reference() {
        let (s, r) = crossbeam_channel::unbounded();
        for idx in 0..3 {
            let mut pb = ProfileBlock::new(idx);
            pb.apply(idx % 2, &[RefInterval::new(0, 10)]);
            pb.stats_mut().records = 1;
            pb.stats_mut().accepted = 1;
            s.send(pb).unwrap()
        }
        drop(s);
        let acc = accumulate_thread(3, r);
        assert_eq!(acc.profiles.len(), 3);
        assert_eq!(acc.profiles[0].n_intervals(), 2);
        assert_eq!(acc.profiles[1].n_intervals(), 1);
        assert!(acc.profiles[2].is_empty());
        assert_eq!(acc.stats.records, 3);
    }
}
