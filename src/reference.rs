use std::{
    collections::{hash_map::Entry, HashMap, HashSet},
    fmt::{self, Debug, Formatter},
    io::{self, Write},
    path::Path,
    str,
    sync::Arc,
};

use anyhow::Context;
use rust_htslib::bam::HeaderView;

/// One reference sequence (contig) from the input headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSeq {
    name: Arc<str>,
    len: u64,
}

impl RefSeq {
    #[cfg(test)]
    pub fn new(name: &str, len: u64) -> Self {
        Self {
            name: Arc::from(name),
            len,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }
}

/// Maps the reference ids of one input file to ids in the combined [`RefTable`]
#[derive(Debug, Clone, Default)]
pub struct TidMap {
    map: Vec<usize>,
}

impl TidMap {
    /// Global id for a local reference id.  None if the local id is not in the file's header.
    #[inline]
    pub fn get(&self, tid: i64) -> Option<usize> {
        usize::try_from(tid).ok().and_then(|i| self.map.get(i).copied())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }
}

/// Reference sequences of all inputs, in the order first seen.  Fixed once all headers
/// have been read.
#[derive(Default)]
pub struct RefTable {
    seqs: Vec<RefSeq>,
    index: HashMap<Arc<str>, usize>,
}

impl Debug for RefTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RefTable [ no. contigs: {} ]", self.seqs.len())
    }
}

impl RefTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    #[inline]
    pub fn get(&self, tid: usize) -> Option<&RefSeq> {
        self.seqs.get(tid)
    }

    /// Add the contigs of one input to the table.  Contigs already present must have the same
    /// length; new contigs are appended.
    pub fn add_contigs<'a, I>(&mut self, ctgs: I, src: &Path) -> anyhow::Result<TidMap>
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let mut map = Vec::new();
        let mut seen = HashSet::new();
        for (name, len) in ctgs {
            let n = self.seqs.len();
            let tid = match self.index.entry(Arc::from(name)) {
                Entry::Occupied(e) => {
                    let tid = *e.get();
                    let l = self.seqs[tid].len;
                    if l != len {
                        return Err(anyhow!(
                            "Contig {} has length {} in {} but {} in an earlier input",
                            name,
                            len,
                            src.display(),
                            l
                        ));
                    }
                    tid
                }
                Entry::Vacant(e) => {
                    self.seqs.push(RefSeq {
                        name: e.key().clone(),
                        len,
                    });
                    e.insert(n);
                    n
                }
            };
            if !seen.insert(tid) {
                return Err(anyhow!(
                    "Duplicate contig {} in header of {}",
                    name,
                    src.display()
                ));
            }
            map.push(tid)
        }
        debug!(
            "{}: {} contigs in header, {} in combined table",
            src.display(),
            map.len(),
            self.seqs.len()
        );
        Ok(TidMap { map })
    }

    /// Add the contigs from an htslib header
    pub fn add_header(&mut self, hdr: &HeaderView, src: &Path) -> anyhow::Result<TidMap> {
        let mut ctgs = Vec::with_capacity(hdr.target_count() as usize);
        for (i, name) in hdr.target_names().into_iter().enumerate() {
            let name = str::from_utf8(name)
                .with_context(|| format!("Contig name not UTF-8 in {}", src.display()))?;
            let len = hdr
                .target_len(i as u32)
                .ok_or_else(|| anyhow!("Missing length for contig {} in {}", name, src.display()))?;
            ctgs.push((name, len))
        }
        self.add_contigs(ctgs, src)
    }

    /// Write the chromosome size table, one `name<TAB>length` line per contig
    pub fn write_sizes<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for s in self.seqs.iter() {
            writeln!(w, "{}\t{}", s.name, s.len)?
        }
        Ok(())
    }
}
