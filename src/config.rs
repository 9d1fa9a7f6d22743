//! Pipeline configuration.
//!
//! Every field has a default, so a JSON config file only needs the keys it
//! changes:
//!
//! ```json
//! { "window": 30, "constraints": { "num_return": 5 }, "blast_enabled": false }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::engine::DesignConstraints;
use crate::gc::DEFAULT_WINDOW;
use crate::probe::ProbeRules;
use crate::similarity::NCBI_BLAST_URL;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// GC sliding-window length.
    pub window: usize,
    pub constraints: DesignConstraints,
    pub probe: ProbeRules,
    pub generation_timeout_secs: u64,
    pub similarity_timeout_secs: u64,
    /// Maximum similarity submissions in flight.
    pub similarity_concurrency: usize,
    pub blast_url: String,
    pub blast_enabled: bool,
    /// Write plots here (one new file per request) instead of returning them inline.
    pub plot_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            constraints: DesignConstraints::default(),
            probe: ProbeRules::default(),
            generation_timeout_secs: 30,
            similarity_timeout_secs: 20,
            similarity_concurrency: 4,
            blast_url: NCBI_BLAST_URL.to_string(),
            blast_enabled: true,
            plot_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file; absent keys keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let p = path.as_ref();
        let text = std::fs::read_to_string(p).with_context(|| format!("reading config {}", p.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", p.display()))
    }

    pub fn generation_timeout(&self) -> Duration { Duration::from_secs(self.generation_timeout_secs.max(1)) }

    pub fn similarity_timeout(&self) -> Duration { Duration::from_secs(self.similarity_timeout_secs.max(1)) }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{ "window": 30, "constraints": { "num_return": 5 }, "blast_enabled": false }"#).unwrap();
        assert_eq!(cfg.window, 30);
        assert_eq!(cfg.constraints.num_return, 5);
        assert_eq!(cfg.constraints.opt_size, 20);
        assert_eq!(cfg.constraints.min_tm, 57.0);
        assert!(!cfg.blast_enabled);
        assert_eq!(cfg.probe, ProbeRules::default());
        assert_eq!(cfg.plot_dir, None);
    }

    #[test]
    fn defaults_match_design_constraints() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.window, 20);
        let c = &cfg.constraints;
        assert_eq!((c.min_size, c.opt_size, c.max_size), (18, 20, 22));
        assert_eq!((c.min_tm, c.opt_tm, c.max_tm), (57.0, 60.0, 63.0));
        assert_eq!((c.min_gc, c.max_gc), (40.0, 60.0));
        assert_eq!(c.num_return, 3);
        assert!(c.pick_internal_oligo);
    }

    #[test]
    fn config_file_round_trip_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taqpick.json");
        std::fs::write(&path, r#"{ "similarity_concurrency": 8, "plot_dir": "/tmp/plots" }"#).unwrap();
        let cfg = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.similarity_concurrency, 8);
        assert_eq!(cfg.plot_dir, Some(PathBuf::from("/tmp/plots")));
        assert!(PipelineConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
