use super::record::AlnRecord;

const REC_BLOCK_SIZE: usize = 256;

#[derive(Debug, Copy, Clone)]
struct RecInfo {
    flags: u16,
    tid: i64,
    pos: i64,
    cigar_start: usize,
    cigar_end: usize,
}

/// Storage for consecutive alignment records read from one input file.
///
/// Only the fields needed for coverage are kept.  CIGARs of all records are packed into a
/// single buffer, and the vectors are kept between uses so that a recycled block does not
/// allocate.
#[derive(Debug)]
pub struct RecBlock {
    input_ix: usize,
    recs: Vec<RecInfo>,
    cigar: Vec<u32>,
}

impl Default for RecBlock {
    fn default() -> Self {
        Self {
            input_ix: 0,
            recs: Vec::with_capacity(REC_BLOCK_SIZE),
            cigar: Vec::with_capacity(REC_BLOCK_SIZE * 4),
        }
    }
}

impl RecBlock {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset block to empty state for records from input `input_ix`
    #[inline]
    pub fn clear(&mut self, input_ix: usize) {
        self.input_ix = input_ix;
        self.recs.clear();
        self.cigar.clear();
    }

    #[inline]
    pub fn input_ix(&self) -> usize {
        self.input_ix
    }

    pub fn push<R: AlnRecord + ?Sized>(&mut self, rec: &R) {
        let cigar_start = self.cigar.len();
        self.cigar.extend_from_slice(rec.raw_cigar());
        self.recs.push(RecInfo {
            flags: rec.flags(),
            tid: rec.tid(),
            pos: rec.pos(),
            cigar_start,
            cigar_end: self.cigar.len(),
        })
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.recs.len() >= REC_BLOCK_SIZE
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.recs.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.recs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = BlockRec<'_>> {
        self.recs.iter().map(|info| BlockRec {
            info,
            cigar: &self.cigar[info.cigar_start..info.cigar_end],
        })
    }
}

/// View of one record stored in a [`RecBlock`]
pub struct BlockRec<'a> {
    info: &'a RecInfo,
    cigar: &'a [u32],
}

impl<'a> AlnRecord for BlockRec<'a> {
    #[inline]
    fn flags(&self) -> u16 {
        self.info.flags
    }
    #[inline]
    fn tid(&self) -> i64 {
        self.info.tid
    }
    #[inline]
    fn pos(&self) -> i64 {
        self.info.pos
    }
    #[inline]
    fn raw_cigar(&self) -> &[u32] {
        self.cigar
    }
}
