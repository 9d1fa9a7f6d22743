//! Request orchestration: normalize, generate, place probes, assemble.
//!
//! ### Flow for one request
//! 1. [`normalize_input`]; an empty sequence is an invalid-input error.
//! 2. The [`CandidateGenerator`] ranks primer pairs (fatal on failure or timeout).
//! 3. Per pair, in engine order: derive the amplicon, run the first-fit probe
//!    search, compute primer GC and dispatch similarity checks. A pair with no
//!    probe, or whose probe metrics fail, is **dropped**; the rest go on.
//! 4. The GC window series is computed once over the whole sequence and
//!    rendered to a request-scoped plot.
//!
//! Similarity submissions for all kept pairs are started before any status is
//! awaited, then collected in order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::engine::{generate_with_timeout, BuiltinGenerator, CandidateGenerator, PrimerCandidatePair};
use crate::error::DesignError;
use crate::gc::{gc_fraction, gc_window_series, GcSeries};
use crate::plot::{persist, PlotArtifact, PlotRenderer, SvgPlot};
use crate::probe::{AmpliconRegion, Probe, ProbePicker};
use crate::seqio::{count_non_acgt, normalize_input};
use crate::similarity::{Disabled, Dispatcher, NcbiBlast, Pending, SimilarityCheck};

/// One surviving primer pair with its probe and metrics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PrimerPairRecord {
    pub forward: String,
    pub reverse: String,
    pub forward_start: usize,
    pub reverse_start: usize,
    pub forward_tm: f64,
    pub reverse_tm: f64,
    pub forward_gc: f64,
    pub reverse_gc: f64,
    pub penalty: f64,
    pub product_size: i64,
    pub probe: Probe,
    pub blast_forward: String,
    pub blast_reverse: String,
}

/// Everything a request produces.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DesignResult {
    /// Pairs that received a probe, in engine order.
    #[serde(rename = "primers")]
    pub pairs: Vec<PrimerPairRecord>,
    pub gc_series: GcSeries,
    pub gc_plot: PlotArtifact,
    pub sequence_length: usize,
    /// Pairs the engine returned before probe filtering.
    pub candidates: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
struct Assessed {
    pair: PrimerCandidatePair,
    region: AmpliconRegion,
    probe: Probe,
    forward_gc: f64,
    reverse_gc: f64,
}

/// What happened to one candidate pair.
#[derive(Debug)]
enum PairOutcome {
    Kept(Assessed),
    NoProbe,
    Failed(String),
}

/// The pair assembler. Build once and share across requests.
pub struct Designer {
    config: PipelineConfig,
    generator: Arc<dyn CandidateGenerator>,
    picker: ProbePicker,
    dispatcher: Dispatcher,
    renderer: Box<dyn PlotRenderer>,
}

impl Designer {
    /// Built-in engine, NCBI BLAST (or nothing when disabled) and SVG plots.
    pub fn new(config: PipelineConfig) -> Result<Self, DesignError> {
        let checker: Arc<dyn SimilarityCheck> = if config.blast_enabled {
            let blast = NcbiBlast::new(config.blast_url.clone(), config.similarity_timeout())
                .map_err(|e| DesignError::Pipeline(format!("cannot build BLAST client: {e}")))?;
            Arc::new(blast)
        } else {
            Arc::new(Disabled)
        };
        Self::with_parts(config, Arc::new(BuiltinGenerator), checker, Box::new(SvgPlot::default()))
    }

    /// Assemble a designer from explicit collaborators.
    pub fn with_parts(
        config: PipelineConfig,
        generator: Arc<dyn CandidateGenerator>,
        checker: Arc<dyn SimilarityCheck>,
        renderer: Box<dyn PlotRenderer>,
    ) -> Result<Self, DesignError> {
        let picker = ProbePicker::new(config.probe.clone()).map_err(|e| DesignError::Pipeline(e.to_string()))?;
        let dispatcher = Dispatcher::new(checker, config.similarity_concurrency, config.similarity_timeout())
            .map_err(|e| DesignError::Pipeline(format!("cannot start similarity pool: {e}")))?;
        Ok(Self { config, generator, picker, dispatcher, renderer })
    }

    pub fn config(&self) -> &PipelineConfig { &self.config }

    /// Design primers and probes for FASTA or raw input text.
    pub fn design(&self, raw_input: &str) -> Result<DesignResult, DesignError> {
        let normalized = normalize_input(raw_input);
        if normalized.is_empty() {
            return Err(DesignError::InvalidInput("Invalid FASTA sequence".to_string()));
        }
        let mut warnings = Vec::new();
        if normalized.extra_records > 0 {
            warnings.push(format!(
                "{} additional FASTA record(s) ignored; only the first record is designed",
                normalized.extra_records
            ));
        }
        if normalized.non_acgt > 0 {
            warnings.push(format!("sequence contains {} character(s) outside A/C/G/T", normalized.non_acgt));
        }
        for w in &warnings {
            log::warn!("{w}");
        }
        self.run(&normalized.sequence, warnings)
    }

    /// Same as [`Designer::design`] for an already canonical sequence.
    pub fn design_normalized(&self, sequence: &str) -> Result<DesignResult, DesignError> {
        if sequence.is_empty() {
            return Err(DesignError::InvalidInput("Invalid FASTA sequence".to_string()));
        }
        let mut warnings = Vec::new();
        let odd = count_non_acgt(sequence);
        if odd > 0 {
            warnings.push(format!("sequence contains {odd} character(s) outside A/C/G/T"));
        }
        self.run(sequence, warnings)
    }

    fn run(&self, sequence: &str, warnings: Vec<String>) -> Result<DesignResult, DesignError> {
        let constraints = &self.config.constraints;
        let mut candidates = generate_with_timeout(
            self.generator.clone(),
            sequence,
            constraints,
            self.config.generation_timeout(),
        )?;
        if candidates.len() > constraints.num_return {
            log::debug!(
                "{} returned {} pairs, keeping the first {}",
                self.generator.name(),
                candidates.len(),
                constraints.num_return
            );
            candidates.truncate(constraints.num_return);
        }
        let n_candidates = candidates.len();

        let mut staged: Vec<(Assessed, Pending, Pending)> = Vec::new();
        for (rank, pair) in candidates.into_iter().enumerate() {
            match self.assess_pair(sequence, pair) {
                PairOutcome::Kept(kept) => {
                    let fwd = self.dispatcher.dispatch(&kept.pair.forward);
                    let rev = self.dispatcher.dispatch(&kept.pair.reverse);
                    staged.push((kept, fwd, rev));
                }
                PairOutcome::NoProbe => log::debug!("pair #{rank} dropped: no valid probe in amplicon"),
                PairOutcome::Failed(why) => log::warn!("pair #{rank} dropped: {why}"),
            }
        }

        let pairs: Vec<PrimerPairRecord> = staged
            .into_iter()
            .map(|(Assessed { pair, region, probe, forward_gc, reverse_gc }, fwd, rev)| PrimerPairRecord {
                blast_forward: self.dispatcher.resolve(fwd),
                blast_reverse: self.dispatcher.resolve(rev),
                forward: pair.forward,
                reverse: pair.reverse,
                forward_start: pair.forward_start,
                reverse_start: pair.reverse_start,
                forward_tm: pair.forward_tm,
                reverse_tm: pair.reverse_tm,
                forward_gc,
                reverse_gc,
                penalty: pair.penalty,
                product_size: region.length,
                probe,
            })
            .collect();

        let gc_series = gc_window_series(sequence, self.config.window);
        let gc_plot = self.render_plot(&gc_series)?;

        log::info!(
            "designed {} of {} candidate pair(s) for a {}-base sequence",
            pairs.len(),
            n_candidates,
            sequence.len()
        );
        Ok(DesignResult {
            pairs,
            gc_series,
            gc_plot,
            sequence_length: sequence.len(),
            candidates: n_candidates,
            warnings,
        })
    }

    fn assess_pair(&self, sequence: &str, pair: PrimerCandidatePair) -> PairOutcome {
        let salt = &self.config.constraints.salt;
        let region = AmpliconRegion::from_pair(&pair);
        let searched = catch_unwind(AssertUnwindSafe(|| self.picker.find(sequence, region, salt)));
        match searched {
            Ok(Ok(Some(probe))) => {
                let forward_gc = gc_fraction(&pair.forward);
                let reverse_gc = gc_fraction(&pair.reverse);
                PairOutcome::Kept(Assessed { pair, region, probe, forward_gc, reverse_gc })
            }
            Ok(Ok(None)) => PairOutcome::NoProbe,
            Ok(Err(e)) => PairOutcome::Failed(e.to_string()),
            Err(_) => PairOutcome::Failed("probe search panicked".to_string()),
        }
    }

    fn render_plot(&self, series: &GcSeries) -> Result<PlotArtifact, DesignError> {
        let document = self.renderer.render(series)?;
        match &self.config.plot_dir {
            Some(dir) => {
                let path = persist(&document, dir, self.renderer.extension())?;
                Ok(PlotArtifact::File { path })
            }
            None => Ok(PlotArtifact::Inline { svg: document }),
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use crate::engine::{DesignConstraints, GenerationError};

    /// Returns a fixed list of pairs regardless of the template.
    pub struct FixedEngine(pub Vec<PrimerCandidatePair>);

    impl CandidateGenerator for FixedEngine {
        fn generate(&self, _: &str, _: &DesignConstraints) -> Result<Vec<PrimerCandidatePair>, GenerationError> {
            Ok(self.0.clone())
        }
        fn name(&self) -> &str { "fixed" }
    }

    pub struct BrokenEngine;

    impl CandidateGenerator for BrokenEngine {
        fn generate(&self, _: &str, _: &DesignConstraints) -> Result<Vec<PrimerCandidatePair>, GenerationError> {
            Err(GenerationError::Engine("license server unreachable".into()))
        }
    }

    pub fn pair(template: &str, forward_start: usize, reverse_start: usize, len: usize, penalty: f64) -> PrimerCandidatePair {
        let site = &template.as_bytes()[reverse_start..reverse_start + len];
        PrimerCandidatePair {
            forward: template[forward_start..forward_start + len].to_string(),
            reverse: String::from_utf8(bio::alphabets::dna::revcomp(site)).unwrap(),
            forward_start,
            reverse_start,
            forward_tm: 60.1,
            reverse_tm: 59.7,
            penalty,
            probe_hint: None,
        }
    }

    pub fn designer(pairs: Vec<PrimerCandidatePair>) -> Designer {
        designer_with(pairs, Arc::new(Disabled))
    }

    pub fn designer_with(pairs: Vec<PrimerCandidatePair>, checker: Arc<dyn SimilarityCheck>) -> Designer {
        let config = PipelineConfig { blast_enabled: false, ..PipelineConfig::default() };
        Designer::with_parts(config, Arc::new(FixedEngine(pairs)), checker, Box::new(SvgPlot::default())).unwrap()
    }
}
