use std::sync::Arc;

use taqpick::engine::{BuiltinGenerator, CandidateGenerator, DesignConstraints, GenerationError, PrimerCandidatePair};
use taqpick::plot::{PlotArtifact, SvgPlot};
use taqpick::probe::is_valid_probe;
use taqpick::report::{write_csv, DesignResponse, Envelope};
use taqpick::similarity::{Disabled, STATUS_SKIPPED};
use taqpick::{Designer, PipelineConfig};

// pUC19 multiple cloning site and flanks
const PUC19_MCS: &str = "TGTAAAACGACGGCCAGTGAATTCGAGCTCGGTACCCGGGGATCCTCTAGAGTCGACCTGCAGGCATGCAAGCTTGGCGTAATCATGGTCATAGCTGTTTCCTGTGTGAAATTGTTATCCGCTCACAATTCCACACAACATACGAGCCGGAAGCATAAAGTGTAAAGCCTGGGGTGCCTAATGAGTGAGCTAACTCACATTAATTGCGTTGCGCTCACTGCCCGCTTTCCAGTCGGGAAACCTGTCGTGCCAGCTG";

fn offline() -> PipelineConfig {
    PipelineConfig { blast_enabled: false, ..PipelineConfig::default() }
}

struct TwoPairs;

impl CandidateGenerator for TwoPairs {
    fn generate(&self, template: &str, _: &DesignConstraints) -> Result<Vec<PrimerCandidatePair>, GenerationError> {
        let mk = |fs: usize, rs: usize, len: usize| PrimerCandidatePair {
            forward: template[fs..fs + len].to_string(),
            reverse: String::from_utf8(bio::alphabets::dna::revcomp(&template.as_bytes()[rs..rs + len])).unwrap(),
            forward_start: fs,
            reverse_start: rs,
            forward_tm: 60.0,
            reverse_tm: 60.0,
            penalty: 0.5,
            probe_hint: None,
        };
        // one spacious amplicon, one with no room for a probe
        Ok(vec![mk(10, 150, 20), mk(50, 52, 8)])
    }
}

#[test]
fn synthetic_template_keeps_only_the_pair_with_a_probe() {
    let template = "ACGTTGCATC".repeat(20);
    let d = Designer::with_parts(offline(), Arc::new(TwoPairs), Arc::new(Disabled), Box::new(SvgPlot::default())).unwrap();
    let r = d.design(&format!(">synthetic\n{template}\n")).unwrap();
    assert_eq!(r.candidates, 2);
    assert_eq!(r.pairs.len(), 1);
    assert_eq!(r.gc_series.len(), 181);
    assert_eq!(r.pairs[0].blast_forward, STATUS_SKIPPED);

    let v = serde_json::to_value(Envelope::ok(DesignResponse::from(&r))).unwrap();
    assert_eq!(v["status"], 200);
    assert_eq!(v["body"]["primers"][0]["forward"], r.pairs[0].forward.as_str());
}

#[test]
fn builtin_engine_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig { plot_dir: Some(dir.path().to_path_buf()), ..offline() };
    let d = Designer::with_parts(config, Arc::new(BuiltinGenerator), Arc::new(Disabled), Box::new(SvgPlot::default())).unwrap();

    let r = d.design(PUC19_MCS).unwrap();
    assert_eq!(r.sequence_length, PUC19_MCS.len());
    assert!(r.candidates <= 3);
    assert!(!r.pairs.is_empty(), "no pair survived probe placement");
    assert!(r.pairs.len() <= r.candidates);
    for p in &r.pairs {
        assert!(is_valid_probe(&p.probe.sequence));
        let amplicon_end = p.forward_start + p.product_size as usize;
        assert!(p.probe.start >= p.forward_start + 5);
        assert!(p.probe.start + p.probe.sequence.len() <= amplicon_end);
        assert_eq!(&PUC19_MCS[p.probe.start..p.probe.start + p.probe.sequence.len()], p.probe.sequence);
    }
    match &r.gc_plot {
        PlotArtifact::File { path } => {
            assert!(path.starts_with(dir.path()));
            assert!(std::fs::read_to_string(path).unwrap().contains("GC Content Distribution"));
        }
        other => panic!("expected a plot file, got {other:?}"),
    }

    let mut csv = Vec::new();
    write_csv(&mut csv, "puc19", &r).unwrap();
    assert_eq!(String::from_utf8(csv).unwrap().lines().count(), r.pairs.len() + 1);
}

#[test]
fn invalid_input_maps_to_400() {
    let d = Designer::new(offline()).unwrap();
    let err = d.design("").unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(err.to_string(), "Invalid FASTA sequence");
}
