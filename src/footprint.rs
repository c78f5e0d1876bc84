//! Reference footprint of an alignment.
//!
//! The footprint is the list of half-open reference intervals that a record actually covers.
//! Match operations extend the current interval, deletions and reference skips close it,
//! and operations that do not move along the reference (insertions, clips, padding) are
//! invisible.

use crate::{error::MalformedRecord, read::record::AlnRecord};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CigarOp {
    Match,
    Ins,
    Del,
    RefSkip,
    SoftClip,
    HardClip,
    Pad,
    Equal,
    Diff,
}

const CIGAR_OPS: [CigarOp; 9] = [
    CigarOp::Match,
    CigarOp::Ins,
    CigarOp::Del,
    CigarOp::RefSkip,
    CigarOp::SoftClip,
    CigarOp::HardClip,
    CigarOp::Pad,
    CigarOp::Equal,
    CigarOp::Diff,
];

// Bit 0 - consumes query, bit 1 - consumes reference (as in htslib's BAM_CIGAR_TYPE)
const CIGAR_TYPE: [u8; 9] = [3, 1, 2, 2, 1, 0, 0, 3, 3];

impl CigarOp {
    /// Op from the 4 bit code used in BAM records
    #[inline]
    pub fn from_code(c: u32) -> Option<Self> {
        CIGAR_OPS.get(c as usize).copied()
    }

    #[inline]
    pub fn op_type(&self) -> u8 {
        CIGAR_TYPE[*self as usize]
    }

    #[inline]
    pub fn consumes_ref(&self) -> bool {
        self.op_type() & 2 == 2
    }

    /// Consumes both query and reference, so the aligned bases add depth
    #[inline]
    pub fn covers_ref(&self) -> bool {
        self.op_type() == 3
    }
}

/// Split a raw BAM CIGAR element into (op, length)
#[inline]
pub fn decode_cigar(c: u32) -> Result<(CigarOp, u32), MalformedRecord> {
    CigarOp::from_code(c & 0xf)
        .map(|op| (op, c >> 4))
        .ok_or(MalformedRecord::BadCigarOp(c & 0xf))
}

/// Reference interval [start, end), 0 based
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefInterval {
    pub start: u64,
    pub end: u64,
}

impl RefInterval {
    #[inline]
    pub fn new(start: u64, end: u64) -> Self {
        assert!(start <= end, "Illegal interval");
        Self { start, end }
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Expand an alignment starting at `pos` into its covered intervals, appending to `out`.
/// Returns the reference position just after the last reference consuming operation.
pub fn expand_into<I>(pos: u64, ops: I, out: &mut Vec<RefInterval>) -> u64
where
    I: IntoIterator<Item = (CigarOp, u32)>,
{
    let mut x = pos;
    let mut open: Option<u64> = None;

    for (op, l) in ops {
        // Zero length ops neither split nor extend a run
        if l == 0 {
            continue;
        }
        if op.covers_ref() {
            open.get_or_insert(x);
            x += l as u64;
        } else if op.consumes_ref() {
            if let Some(s) = open.take() {
                out.push(RefInterval::new(s, x))
            }
            x += l as u64;
        }
    }
    if let Some(s) = open {
        out.push(RefInterval::new(s, x))
    }
    x
}

pub fn expand<I>(pos: u64, ops: I) -> Vec<RefInterval>
where
    I: IntoIterator<Item = (CigarOp, u32)>,
{
    let mut v = Vec::new();
    expand_into(pos, ops, &mut v);
    v
}

/// Footprint of a mapped record.  `out` is cleared first.  Returns the end position of the
/// alignment on the reference.
pub fn record_footprint<R: AlnRecord + ?Sized>(
    rec: &R,
    out: &mut Vec<RefInterval>,
) -> Result<u64, MalformedRecord> {
    out.clear();
    let pos = rec.pos();
    if pos < 0 {
        return Err(MalformedRecord::BadPosition(pos));
    }
    let cigar = rec.raw_cigar();

    // Check all ops before touching the output
    if let Some(c) = cigar.iter().find(|c| CigarOp::from_code(*c & 0xf).is_none()) {
        return Err(MalformedRecord::BadCigarOp(c & 0xf));
    }
    let ops = cigar.iter().filter_map(|c| decode_cigar(*c).ok());
    Ok(expand_into(pos as u64, ops, out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::record::SimpleRecord;
    use CigarOp::*;

    fn iv(start: u64, end: u64) -> RefInterval {
        RefInterval::new(start, end)
    }

    #[test]
    fn simple_match() {
        assert_eq!(expand(10, [(Match, 5)]), vec![iv(10, 15)]);
    }

    #[test]
    fn insertion_does_not_split() {
        assert_eq!(expand(0, [(Match, 3), (Ins, 2), (Match, 4)]), vec![iv(0, 7)]);
    }

    #[test]
    fn skip_and_deletion_split() {
        assert_eq!(
            expand(0, [(Match, 3), (RefSkip, 10), (Match, 4)]),
            vec![iv(0, 3), iv(13, 17)]
        );
        assert_eq!(
            expand(100, [(Equal, 2), (Del, 1), (Diff, 1), (Match, 6)]),
            vec![iv(100, 102), iv(103, 110)]
        );
    }

    #[test]
    fn clips_do_not_shift() {
        assert_eq!(expand(20, [(SoftClip, 5), (Match, 10)]), vec![iv(20, 30)]);
        assert_eq!(
            expand(20, [(HardClip, 3), (SoftClip, 5), (Match, 10), (SoftClip, 2)]),
            vec![iv(20, 30)]
        );
    }

    #[test]
    fn empty_and_clip_only() {
        assert!(expand(5, std::iter::empty::<(CigarOp, u32)>()).is_empty());
        assert!(expand(5, [(SoftClip, 10), (Ins, 3), (HardClip, 2)]).is_empty());
        // Leading deletion moves the cursor but covers nothing
        assert_eq!(expand(5, [(Del, 2), (Match, 1)]), vec![iv(7, 8)]);
    }

    #[test]
    fn zero_length_ops_ignored() {
        assert_eq!(expand(0, [(Match, 3), (Del, 0), (Match, 2)]), vec![iv(0, 5)]);
        assert!(expand(0, [(Match, 0)]).is_empty());
    }

    #[test]
    fn end_position_returned() {
        let mut v = Vec::new();
        let y = expand_into(0, [(Match, 3), (RefSkip, 10), (Match, 4), (SoftClip, 3)], &mut v);
        assert_eq!(y, 17);
    }

    #[test]
    fn raw_cigar_decoding() {
        assert_eq!(decode_cigar((5 << 4) | 3), Ok((RefSkip, 5)));
        assert_eq!(decode_cigar((5 << 4) | 9), Err(MalformedRecord::BadCigarOp(9)));
        assert_eq!(format!("{}", Equal), "=");
    }

    #[test]
    fn record_footprint_checks() {
        let mut out = vec![iv(0, 1)];
        let r = SimpleRecord::new(0, 0, 50, &[(Match, 3), (RefSkip, 10), (Match, 4)]);
        assert_eq!(record_footprint(&r, &mut out), Ok(67));
        assert_eq!(out, vec![iv(50, 53), iv(63, 67)]);

        let mut bad = SimpleRecord::new(0, 0, 50, &[(Match, 3)]);
        bad.cigar.push((4 << 4) | 15);
        assert_eq!(
            record_footprint(&bad, &mut out),
            Err(MalformedRecord::BadCigarOp(15))
        );

        let neg = SimpleRecord::new(0, 0, -1, &[(Match, 3)]);
        assert_eq!(
            record_footprint(&neg, &mut out),
            Err(MalformedRecord::BadPosition(-1))
        );
    }
}
