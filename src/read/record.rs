use rust_htslib::bam::Record;

#[cfg(test)]
use crate::footprint::CigarOp;

/// The parts of an alignment record that coverage needs
pub trait AlnRecord {
    fn flags(&self) -> u16;
    /// Reference id in the input file's own header, or -1 if not placed
    fn tid(&self) -> i64;
    /// 0 based leftmost position of the first reference consuming op
    fn pos(&self) -> i64;
    /// CIGAR in BAM encoding, (length << 4) | op
    fn raw_cigar(&self) -> &[u32];
}

impl AlnRecord for Record {
    #[inline]
    fn flags(&self) -> u16 {
        Record::flags(self)
    }

    #[inline]
    fn tid(&self) -> i64 {
        Record::tid(self) as i64
    }

    #[inline]
    fn pos(&self) -> i64 {
        Record::pos(self)
    }

    #[inline]
    fn raw_cigar(&self) -> &[u32] {
        Record::raw_cigar(self)
    }
}

/// Record built directly from its parts
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct SimpleRecord {
    pub flags: u16,
    pub tid: i64,
    pub pos: i64,
    pub cigar: Vec<u32>,
}

#[cfg(test)]
impl SimpleRecord {
    pub fn new(flags: u16, tid: i64, pos: i64, ops: &[(CigarOp, u32)]) -> Self {
        let cigar = ops.iter().map(|(op, l)| (l << 4) | (*op as u32)).collect();
        Self {
            flags,
            tid,
            pos,
            cigar,
        }
    }
}

#[cfg(test)]
impl AlnRecord for SimpleRecord {
    fn flags(&self) -> u16 {
        self.flags
    }
    fn tid(&self) -> i64 {
        self.tid
    }
    fn pos(&self) -> i64 {
        self.pos
    }
    fn raw_cigar(&self) -> &[u32] {
        &self.cigar
    }
}
