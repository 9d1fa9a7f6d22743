//! Primer-pair candidate generation.
//!
//! The pipeline only sees the [`CandidateGenerator`] port: given a template and
//! [`DesignConstraints`] it returns ranked [`PrimerCandidatePair`]s. Any engine
//! can sit behind it; tests use fixed fakes.
//!
//! [`BuiltinGenerator`] is a primer3-style exhaustive enumerator:
//! - every window of `min_size..=max_size` bases is a forward candidate, and its
//!   reverse complement a reverse candidate;
//! - candidates must be pure ACGT and inside the GC, Tm and homopolymer limits;
//! - primer penalty is `|Tm - opt_tm| + |len - opt_size|`, pair penalty the sum;
//! - pairs must not overlap and their product size must lie in range.
//!
//! Coordinates are 0-based template offsets. For the reverse primer the offset
//! is the **leftmost** template base it covers, so the amplicon ends at
//! `reverse_start + reverse.len()`.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use bio::alphabets::dna::revcomp;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::gc::gc_fraction;
use crate::thermo::{melting_temp, SaltConditions};

/// Bounds and optima handed to the generation engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignConstraints {
    pub min_size: usize,
    pub opt_size: usize,
    pub max_size: usize,
    pub min_tm: f64,
    pub opt_tm: f64,
    pub max_tm: f64,
    pub min_gc: f64,
    pub max_gc: f64,
    /// Maximum number of ranked pairs to return.
    pub num_return: usize,
    /// Ask the engine for an internal oligo. Advisory; probes are re-picked locally.
    pub pick_internal_oligo: bool,
    pub product_size_min: usize,
    pub product_size_max: usize,
    /// Longest allowed mononucleotide run inside a primer.
    pub max_poly_x: usize,
    /// Largest allowed Tm difference between the two primers of a pair.
    pub max_tm_diff: f64,
    pub salt: SaltConditions,
}

impl Default for DesignConstraints {
    fn default() -> Self {
        Self {
            min_size: 18,
            opt_size: 20,
            max_size: 22,
            min_tm: 57.0,
            opt_tm: 60.0,
            max_tm: 63.0,
            min_gc: 40.0,
            max_gc: 60.0,
            num_return: 3,
            pick_internal_oligo: true,
            product_size_min: 100,
            product_size_max: 300,
            max_poly_x: 5,
            max_tm_diff: 100.0,
            salt: SaltConditions::default(),
        }
    }
}

impl DesignConstraints {
    /// Reject bounds that cannot describe any primer.
    pub fn validate(&self) -> Result<(), GenerationError> {
        let bad = |msg: &str| Err(GenerationError::InvalidConstraints(msg.to_string()));
        if self.min_size == 0 || self.min_size > self.opt_size || self.opt_size > self.max_size {
            return bad("primer sizes must satisfy 0 < min <= opt <= max");
        }
        if !(self.min_tm <= self.opt_tm && self.opt_tm <= self.max_tm) {
            return bad("melting temperatures must satisfy min <= opt <= max");
        }
        if !(0.0..=100.0).contains(&self.min_gc) || !(0.0..=100.0).contains(&self.max_gc) || self.min_gc > self.max_gc {
            return bad("GC bounds must lie in 0..=100 with min <= max");
        }
        if self.product_size_min > self.product_size_max {
            return bad("product size range is empty");
        }
        Ok(())
    }
}

/// One ranked candidate pair as reported by an engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrimerCandidatePair {
    pub forward: String,
    pub reverse: String,
    pub forward_start: usize,
    pub reverse_start: usize,
    pub forward_tm: f64,
    pub reverse_tm: f64,
    /// Lower is a better fit to the constraints.
    pub penalty: f64,
    /// Internal oligo suggested by the engine, if it picks one.
    #[serde(default)]
    pub probe_hint: Option<String>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("invalid design constraints: {0}")]
    InvalidConstraints(String),
    #[error("{0}")]
    Engine(String),
    #[error("engine did not answer within {0:?}")]
    TimedOut(Duration),
}

/// The candidate-generation port.
pub trait CandidateGenerator: Send + Sync {
    /// Ranked pairs, best first, at most `constraints.num_return` of them.
    fn generate(&self, template: &str, constraints: &DesignConstraints) -> Result<Vec<PrimerCandidatePair>, GenerationError>;

    /// Short label for logs.
    fn name(&self) -> &str { "generator" }
}

/// Run `generator` on a worker thread and give up after `timeout`.
///
/// A panicking engine is reported as [`GenerationError::Engine`]. A timed-out
/// worker is left to finish on its own; its result is discarded.
pub fn generate_with_timeout(
    generator: Arc<dyn CandidateGenerator>,
    template: &str,
    constraints: &DesignConstraints,
    timeout: Duration,
) -> Result<Vec<PrimerCandidatePair>, GenerationError> {
    let (tx, rx) = mpsc::channel();
    let template = template.to_string();
    let constraints = constraints.clone();
    let gen = generator.clone();
    std::thread::Builder::new()
        .name("taqpick-generate".into())
        .spawn(move || {
            let _ = tx.send(gen.generate(&template, &constraints));
        })
        .map_err(|e| GenerationError::Engine(format!("cannot start engine thread: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(GenerationError::TimedOut(timeout)),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(GenerationError::Engine(format!("{} panicked", generator.name())))
        }
    }
}

#[derive(Clone, Debug)]
struct Oligo {
    start: usize,
    len: usize,
    seq: String,
    tm: f64,
    penalty: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Strand { Forward, Reverse }

fn longest_run(seq: &[u8]) -> usize {
    let mut best = 0usize;
    let mut run = 0usize;
    let mut prev = None;
    for &b in seq {
        run = if Some(b) == prev { run + 1 } else { 1 };
        prev = Some(b);
        best = best.max(run);
    }
    best
}

/// Exhaustive primer3-style enumerator.
#[derive(Clone, Debug, Default)]
pub struct BuiltinGenerator;

impl BuiltinGenerator {
    fn oligo_at(template: &[u8], start: usize, len: usize, strand: Strand, c: &DesignConstraints) -> Option<Oligo> {
        let window = template.get(start..start + len)?;
        if !window.iter().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T')) {
            return None;
        }
        if longest_run(window) > c.max_poly_x {
            return None;
        }
        let bytes = match strand {
            Strand::Forward => window.to_vec(),
            Strand::Reverse => revcomp(window),
        };
        let seq = String::from_utf8(bytes).ok()?;
        let gc = gc_fraction(&seq);
        if gc < c.min_gc || gc > c.max_gc {
            return None;
        }
        let tm = melting_temp(&seq, &c.salt).ok()?;
        if tm < c.min_tm || tm > c.max_tm {
            return None;
        }
        let penalty = (tm - c.opt_tm).abs() + (len as f64 - c.opt_size as f64).abs();
        Some(Oligo { start, len, seq, tm, penalty })
    }

    fn oligos(template: &[u8], strand: Strand, c: &DesignConstraints) -> Vec<Oligo> {
        (0..template.len())
            .into_par_iter()
            .flat_map_iter(|start| {
                (c.min_size..=c.max_size).filter_map(move |len| Self::oligo_at(template, start, len, strand, c))
            })
            .collect()
    }

    fn best_pairs_for(left: &Oligo, rights: &[Oligo], c: &DesignConstraints) -> Vec<(f64, usize)> {
        let from = rights.partition_point(|r| r.start < left.start + left.len);
        let mut best: Vec<(f64, usize)> = Vec::with_capacity(c.num_return + 1);
        for (idx, r) in rights.iter().enumerate().skip(from) {
            if r.start > left.start + c.product_size_max {
                break;
            }
            let product = r.start + r.len - left.start;
            if product < c.product_size_min || product > c.product_size_max {
                continue;
            }
            if (left.tm - r.tm).abs() > c.max_tm_diff {
                continue;
            }
            best.push((left.penalty + r.penalty, idx));
            best.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            best.truncate(c.num_return);
        }
        best
    }
}

impl CandidateGenerator for BuiltinGenerator {
    fn generate(&self, template: &str, c: &DesignConstraints) -> Result<Vec<PrimerCandidatePair>, GenerationError> {
        c.validate()?;
        if c.num_return == 0 || template.len() < c.min_size {
            return Ok(Vec::new());
        }
        let t = template.to_ascii_uppercase();
        let t = t.as_bytes();

        let lefts = Self::oligos(t, Strand::Forward, c);
        let mut rights = Self::oligos(t, Strand::Reverse, c);
        rights.sort_by(|a, b| a.start.cmp(&b.start).then(a.len.cmp(&b.len)));

        let rights: &[Oligo] = &rights;

        let mut pairs: Vec<(f64, &Oligo, &Oligo)> = lefts
            .par_iter()
            .flat_map_iter(|l| {
                Self::best_pairs_for(l, rights, c)
                    .into_iter()
                    .map(move |(penalty, ri)| (penalty, l, &rights[ri]))
            })
            .collect();
        pairs.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(a.1.start.cmp(&b.1.start))
                .then(a.2.start.cmp(&b.2.start))
                .then(a.1.len.cmp(&b.1.len))
                .then(a.2.len.cmp(&b.2.len))
        });
        pairs.truncate(c.num_return);

        log::debug!(
            "builtin engine: {} forward / {} reverse candidates, {} pairs returned",
            lefts.len(),
            rights.len(),
            pairs.len()
        );

        Ok(pairs
            .into_iter()
            .map(|(penalty, l, r)| PrimerCandidatePair {
                forward: l.seq.clone(),
                reverse: r.seq.clone(),
                forward_start: l.start,
                reverse_start: r.start,
                forward_tm: l.tm,
                reverse_tm: r.tm,
                penalty,
                probe_hint: None,
            })
            .collect())
    }

    fn name(&self) -> &str { "builtin" }
}


#[cfg(test)]
mod timeout_tests {
    use super::*;

    struct Slow;
    impl CandidateGenerator for Slow {
        fn generate(&self, _: &str, _: &DesignConstraints) -> Result<Vec<PrimerCandidatePair>, GenerationError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(Vec::new())
        }
    }

    struct Panics;
    impl CandidateGenerator for Panics {
        fn generate(&self, _: &str, _: &DesignConstraints) -> Result<Vec<PrimerCandidatePair>, GenerationError> {
            panic!("engine exploded")
        }
        fn name(&self) -> &str { "panics" }
    }

    #[test]
    fn slow_engine_times_out() {
        let r = generate_with_timeout(Arc::new(Slow), "ACGT", &DesignConstraints::default(), Duration::from_millis(20));
        assert_eq!(r, Err(GenerationError::TimedOut(Duration::from_millis(20))));
    }

    #[test]
    fn panicking_engine_is_contained() {
        let r = generate_with_timeout(Arc::new(Panics), "ACGT", &DesignConstraints::default(), Duration::from_secs(5));
        assert_eq!(r, Err(GenerationError::Engine("panics panicked".into())));
    }

    #[test]
    fn engine_errors_pass_through() {
        let c = DesignConstraints { min_size: 30, ..DesignConstraints::default() };
        let r = generate_with_timeout(Arc::new(BuiltinGenerator), "ACGT", &c, Duration::from_secs(5));
        assert!(matches!(r, Err(GenerationError::InvalidConstraints(_))));
    }
}
