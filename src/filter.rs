//! Flag based record selection.
//!
//! Each rule in [`FilterConfig`] rejects records that have one SAM flag bit set.  Rules are
//! independent: a record is rejected if any enabled rule matches, so a record that is both
//! secondary and supplementary is dropped by either rule.

pub const BAM_FUNMAP: u16 = 0x4;
pub const BAM_FSECONDARY: u16 = 0x100;
pub const BAM_FQCFAIL: u16 = 0x200;
pub const BAM_FDUP: u16 = 0x400;
pub const BAM_FSUPPLEMENTARY: u16 = 0x800;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    pub ignore_secondary: bool,
    pub ignore_qc_fail: bool,
    pub ignore_duplicate: bool,
    pub ignore_supplementary: bool,
}

/// Exclusion rules in a fixed order.  Used for the rejection tallies.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rule {
    Secondary,
    QcFail,
    Duplicate,
    Supplementary,
}

impl Rule {
    pub const ALL: [Rule; 4] = [
        Rule::Secondary,
        Rule::QcFail,
        Rule::Duplicate,
        Rule::Supplementary,
    ];

    #[inline]
    pub fn bit(&self) -> u16 {
        match self {
            Self::Secondary => BAM_FSECONDARY,
            Self::QcFail => BAM_FQCFAIL,
            Self::Duplicate => BAM_FDUP,
            Self::Supplementary => BAM_FSUPPLEMENTARY,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Secondary => "secondary",
            Self::QcFail => "qc-fail",
            Self::Duplicate => "duplicate",
            Self::Supplementary => "supplementary",
        }
    }
}

impl FilterConfig {
    /// Bitmask of all enabled exclusion rules
    #[inline]
    pub fn mask(&self) -> u16 {
        Rule::ALL
            .iter()
            .filter(|r| self.enabled(**r))
            .fold(0, |m, r| m | r.bit())
    }

    #[inline]
    pub fn enabled(&self, r: Rule) -> bool {
        match r {
            Rule::Secondary => self.ignore_secondary,
            Rule::QcFail => self.ignore_qc_fail,
            Rule::Duplicate => self.ignore_duplicate,
            Rule::Supplementary => self.ignore_supplementary,
        }
    }

    /// True if a record with these flags should contribute to coverage
    #[inline]
    pub fn accept(&self, flags: u16) -> bool {
        flags & self.mask() == 0
    }

    /// First enabled rule (in [`Rule::ALL`] order) that rejects the flags, if any
    pub fn rejected_by(&self, flags: u16) -> Option<Rule> {
        Rule::ALL
            .iter()
            .copied()
            .find(|r| self.enabled(*r) && flags & r.bit() != 0)
    }
}
