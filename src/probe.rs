//! Hybridization probe placement inside an amplicon.
//!
//! The search is **first-fit**: inner offsets are tried in ascending order and
//! the first window passing the validity rules is returned. There is no
//! scoring beyond position order.
//!
//! Default rules reject a candidate that
//! - starts with `G` (5' G quenches common reporter dyes),
//! - contains `GGGG`,
//! - contains `AAAAAA`.
//!
//! # Examples
//! ```
//! use taqpick::probe::{is_valid_probe, find_probe, AmpliconRegion};
//! assert!(!is_valid_probe("GACGTACGTACGTACGT"));
//! assert!(is_valid_probe("ACGTACGTACGTACGTG"));
//! // amplicon of 10 bases leaves no room for a probe
//! assert!(find_probe("ACGTACGTACGTACGT", AmpliconRegion::new(0, 10)).unwrap().is_none());
//! ```

use std::sync::LazyLock;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, AhoCorasickKind};
use serde::{Deserialize, Serialize};

use crate::engine::PrimerCandidatePair;
use crate::gc::gc_fraction;
use crate::thermo::{melting_temp, SaltConditions, ThermoError};

/// Probe geometry and sequence rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeRules {
    /// Probe length is `min(amplicon - margin, max_len)`.
    pub margin: i64,
    pub max_len: i64,
    /// Bases kept clear of the primers at either end of the scan.
    pub inset: i64,
    /// A probe may not start with any of these bases.
    pub forbidden_5prime: String,
    /// A probe may not contain any of these motifs.
    pub forbidden_motifs: Vec<String>,
}

impl Default for ProbeRules {
    fn default() -> Self {
        Self {
            margin: 10,
            max_len: 30,
            inset: 5,
            forbidden_5prime: "G".to_string(),
            forbidden_motifs: vec!["GGGG".to_string(), "AAAAAA".to_string()],
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("probe Tm: {0}")]
    Thermo(#[from] ThermoError),
    #[error("cannot build probe motif screen: {0}")]
    Screen(String),
}

/// Amplicon bounds used to limit the probe scan.
///
/// `length` is signed: an engine reporting a reverse primer upstream of the
/// forward one yields a non-positive length, which simply means no probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AmpliconRegion {
    pub start: usize,
    pub length: i64,
}

impl AmpliconRegion {
    pub fn new(start: usize, length: i64) -> Self { Self { start, length } }

    /// From the forward start to the end of the reverse primer.
    pub fn from_pair(pair: &PrimerCandidatePair) -> Self {
        let end = pair.reverse_start as i64 + pair.reverse.len() as i64;
        Self { start: pair.forward_start, length: end - pair.forward_start as i64 }
    }
}

/// A picked probe with its metrics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Probe {
    pub sequence: String,
    /// 0-based template offset.
    pub start: usize,
    /// GC percentage.
    pub gc: f64,
    /// Melting temperature, °C.
    pub tm: f64,
}

/// Validity screen plus first-fit search, built once per rule set.
pub struct ProbePicker {
    rules: ProbeRules,
    forbidden_5prime: Vec<u8>,
    motifs: AhoCorasick,
}

impl ProbePicker {
    pub fn new(rules: ProbeRules) -> Result<Self, ProbeError> {
        let motifs = AhoCorasickBuilder::new()
            .kind(Some(AhoCorasickKind::DFA))
            .ascii_case_insensitive(true)
            .build(rules.forbidden_motifs.iter().filter(|m| !m.is_empty()))
            .map_err(|e| ProbeError::Screen(e.to_string()))?;
        let forbidden_5prime = rules.forbidden_5prime.bytes().map(|b| b.to_ascii_uppercase()).collect();
        Ok(Self { rules, forbidden_5prime, motifs })
    }

    pub fn rules(&self) -> &ProbeRules { &self.rules }

    /// All rules must hold for a candidate to be usable.
    pub fn is_valid(&self, candidate: &[u8]) -> bool {
        if let Some(first) = candidate.first() {
            if self.forbidden_5prime.contains(&first.to_ascii_uppercase()) {
                return false;
            }
        }
        !self.motifs.is_match(candidate)
    }

    /// Probe length for an amplicon, or `None` when it has no room for one.
    pub fn probe_size(&self, amplicon_length: i64) -> Option<usize> {
        let size = (amplicon_length - self.rules.margin).min(self.rules.max_len);
        (size > 0).then_some(size as usize)
    }

    /// First valid probe inside `region`, scanning `start+inset .. start+length-size-inset`.
    ///
    /// `Ok(None)` is the normal "no probe" outcome. A window running past the
    /// end of `sequence` stops the scan.
    pub fn find(&self, sequence: &str, region: AmpliconRegion, salt: &SaltConditions) -> Result<Option<Probe>, ProbeError> {
        let Some(size) = self.probe_size(region.length) else {
            return Ok(None);
        };
        let bytes = sequence.as_bytes();
        let lo = region.start as i64 + self.rules.inset;
        let hi = region.start as i64 + region.length - size as i64 - self.rules.inset;

        for i in lo.max(0)..hi {
            let i = i as usize;
            let Some(window) = bytes.get(i..i + size) else { break };
            if self.is_valid(window) {
                let candidate = String::from_utf8_lossy(window).into_owned();
                let tm = melting_temp(&candidate, salt)?;
                let gc = gc_fraction(&candidate);
                return Ok(Some(Probe { sequence: candidate, start: i, gc, tm }));
            }
        }
        Ok(None)
    }
}

impl Default for ProbePicker {
    fn default() -> Self {
        ProbePicker::new(ProbeRules::default()).expect("built-in probe motifs always compile")
    }
}

static DEFAULT_PICKER: LazyLock<ProbePicker> = LazyLock::new(ProbePicker::default);

/// Check a candidate against the default rules.
pub fn is_valid_probe(candidate: &str) -> bool {
    DEFAULT_PICKER.is_valid(candidate.as_bytes())
}

/// First-fit probe search with default rules and buffer conditions.
pub fn find_probe(sequence: &str, region: AmpliconRegion) -> Result<Option<Probe>, ProbeError> {
    DEFAULT_PICKER.find(sequence, region, &SaltConditions::default())
}

#[cfg(test)]
mod validity_tests {
    use super::*;

    #[test]
    fn leading_g_is_rejected() {
        assert!(!is_valid_probe("GATTACA"));
        assert!(!is_valid_probe("gattaca"));
        assert!(is_valid_probe("AGATTACA"));
    }

    #[test]
    fn forbidden_motifs_are_rejected_anywhere() {
        assert!(!is_valid_probe("ACGGGGT"));
        assert!(!is_valid_probe("CTTAAAAAAC"));
        assert!(!is_valid_probe("CTTAAAAAA"));
        assert!(is_valid_probe("ACGGGTAAAAAC"));
    }

    #[test]
    fn custom_rules_extend_the_screen() {
        let rules = ProbeRules {
            forbidden_5prime: "GT".into(),
            forbidden_motifs: vec!["CCCC".into()],
            ..ProbeRules::default()
        };
        let p = ProbePicker::new(rules).unwrap();
        assert!(!p.is_valid(b"TACG"));
        assert!(!p.is_valid(b"ACCCCA"));
        assert!(p.is_valid(b"AGGGGA"));
    }
}
