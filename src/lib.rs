#![forbid(unsafe_code)]
//! # taqpick
//!
//! PCR **primer pair** and TaqMan-style **hydrolysis probe** design for a single
//! DNA template, with a sliding-window **GC-content** profile and plot.
//!
//! ## Highlights
//! - ❗ **No feature flags**: all capabilities are always enabled.
//! - 🔌 **Ports at the seams**: the primer engine ([`engine::CandidateGenerator`]),
//!   the similarity service ([`similarity::SimilarityCheck`]) and the plot
//!   renderer ([`plot::PlotRenderer`]) are traits; tests swap in fakes.
//! - 🧪 **Built-in engine**: exhaustive primer3-style enumeration with
//!   SantaLucia nearest-neighbour melting temperatures, so no external tool is needed.
//! - 📄 **Request-scoped output**: every request gets its own plot, inline or in a
//!   freshly named file.
//!
//! ## Flow
//! 1. [`seqio::normalize_input`] turns FASTA or raw text into one uppercase sequence.
//! 2. The generator ranks primer pairs under [`engine::DesignConstraints`].
//! 3. [`probe::ProbePicker`] places a probe first-fit inside each amplicon; pairs
//!    without one are dropped.
//! 4. Surviving primers are submitted to a similarity service in the background;
//!    only a status string is kept.
//! 5. [`gc::gc_window_series`] profiles the template and [`plot::SvgPlot`] draws it.
//!
//! ## Examples
//! ```rust
//! // Sequence-level helpers need no setup:
//! assert_eq!(taqpick::gc::gc_fraction("GGCCAATT"), 50.0);
//! assert!(!taqpick::probe::is_valid_probe("GACGTTGCATCACGTTGCAT"));
//! let series = taqpick::gc::gc_window_series(&"ACGT".repeat(50), 20);
//! assert_eq!(series.len(), 181);
//! ```
//!
//! A full design, offline:
//! ```no_run
//! use taqpick::{Designer, PipelineConfig};
//! let config = PipelineConfig { blast_enabled: false, ..PipelineConfig::default() };
//! let designer = Designer::new(config).unwrap();
//! let result = designer.design(">amp\nGCAGGTCGACTCTAGAGGATCCCCGGGTACCGAGCTCGAATTC").unwrap();
//! for p in &result.pairs {
//!     println!("{} / {} probe {}", p.forward, p.reverse, p.probe.sequence);
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod gc;
pub mod pipeline;
pub mod plot;
pub mod probe;
pub mod report;
pub mod seqio;
pub mod serve;
pub mod similarity;
pub mod thermo;

pub use config::PipelineConfig;
pub use error::DesignError;
pub use pipeline::{DesignResult, Designer, PrimerPairRecord};

/// Crate version string (from `CARGO_PKG_VERSION`).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One-shot convenience: build a [`Designer`] from `config` and run a single request.
///
/// Long-running callers should build the [`Designer`] once and reuse it; it owns
/// the similarity worker pool.
pub fn design_from_text(config: PipelineConfig, input: &str) -> Result<DesignResult, DesignError> {
    Designer::new(config)?.design(input)
}
