//! Output shapes: the JSON response envelope and a flat CSV export.
//!
//! The envelope is what the `serve` loop writes per request line:
//!
//! ```json
//! {"status":200,"body":{"primers":[...],"gc_series":{...},"gc_plot":{...},"sequence_length":256,"warnings":[]}}
//! {"status":400,"detail":"Invalid FASTA sequence"}
//! ```

use std::io::Write;

use serde::Serialize;

use crate::error::DesignError;
use crate::gc::GcSeries;
use crate::pipeline::{DesignResult, PrimerPairRecord};
use crate::plot::PlotArtifact;

/// Success body for one design request.
#[derive(Debug, Serialize)]
pub struct DesignResponse<'a> {
    pub primers: &'a [PrimerPairRecord],
    pub gc_series: &'a GcSeries,
    pub gc_plot: &'a PlotArtifact,
    pub sequence_length: usize,
    pub warnings: &'a [String],
}

impl<'a> From<&'a DesignResult> for DesignResponse<'a> {
    fn from(r: &'a DesignResult) -> Self {
        Self {
            primers: &r.pairs,
            gc_series: &r.gc_series,
            gc_plot: &r.gc_plot,
            sequence_length: r.sequence_length,
            warnings: &r.warnings,
        }
    }
}

/// `{"status": ..., "body": ...}` or `{"status": ..., "detail": ...}`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Envelope<B: Serialize> {
    Ok { status: u16, body: B },
    Err { status: u16, detail: String },
}

impl<B: Serialize> Envelope<B> {
    pub fn ok(body: B) -> Self { Envelope::Ok { status: 200, body } }

    pub fn error(status: u16, detail: impl Into<String>) -> Self {
        Envelope::Err { status, detail: detail.into() }
    }

    pub fn status(&self) -> u16 {
        match self {
            Envelope::Ok { status, .. } | Envelope::Err { status, .. } => *status,
        }
    }
}

impl<B: Serialize> From<&DesignError> for Envelope<B> {
    fn from(e: &DesignError) -> Self { Envelope::error(e.status_code(), e.to_string()) }
}

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
}

pub const HEALTHY: Health = Health { status: "healthy" };

/// One CSV line per primer pair.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    source: &'a str,
    rank: usize,
    forward: &'a str,
    reverse: &'a str,
    forward_start: usize,
    reverse_start: usize,
    forward_tm: f64,
    reverse_tm: f64,
    forward_gc: f64,
    reverse_gc: f64,
    penalty: f64,
    product_size: i64,
    probe: &'a str,
    probe_start: usize,
    probe_tm: f64,
    probe_gc: f64,
    blast_forward: &'a str,
    blast_reverse: &'a str,
}

fn round2(x: f64) -> f64 { (x * 100.0).round() / 100.0 }

/// Column names of [`CsvRow`], in field order.
pub const CSV_HEADER: [&str; 18] = [
    "source",
    "rank",
    "forward",
    "reverse",
    "forward_start",
    "reverse_start",
    "forward_tm",
    "reverse_tm",
    "forward_gc",
    "reverse_gc",
    "penalty",
    "product_size",
    "probe",
    "probe_start",
    "probe_tm",
    "probe_gc",
    "blast_forward",
    "blast_reverse",
];

/// A CSV writer with the header already written, so an export with no pairs
/// still names its columns.
pub fn csv_writer<W: Write>(out: W) -> csv::Result<csv::Writer<W>> {
    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    w.write_record(CSV_HEADER)?;
    Ok(w)
}

/// Append the pairs of `result` to a writer from [`csv_writer`], tagged with `source`.
pub fn write_csv_rows<W: Write>(
    w: &mut csv::Writer<W>,
    source: &str,
    result: &DesignResult,
) -> csv::Result<()> {
    for (rank, p) in result.pairs.iter().enumerate() {
        w.serialize(CsvRow {
            source,
            rank: rank + 1,
            forward: &p.forward,
            reverse: &p.reverse,
            forward_start: p.forward_start,
            reverse_start: p.reverse_start,
            forward_tm: round2(p.forward_tm),
            reverse_tm: round2(p.reverse_tm),
            forward_gc: round2(p.forward_gc),
            reverse_gc: round2(p.reverse_gc),
            penalty: round2(p.penalty),
            product_size: p.product_size,
            probe: &p.probe.sequence,
            probe_start: p.probe.start,
            probe_tm: round2(p.probe.tm),
            probe_gc: round2(p.probe.gc),
            blast_forward: &p.blast_forward,
            blast_reverse: &p.blast_reverse,
        })?;
    }
    Ok(())
}

/// Write a single result as CSV with header.
pub fn write_csv<W: Write>(out: W, source: &str, result: &DesignResult) -> csv::Result<()> {
    let mut w = csv_writer(out)?;
    write_csv_rows(&mut w, source, result)?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod report_tests {
    use super::*;
    use crate::pipeline::fakes::{designer, pair};

    fn sample() -> DesignResult {
        let t = "ACGTTGCATC".repeat(20);
        designer(vec![pair(&t, 10, 150, 20, 0.4)]).design(&t).unwrap()
    }

    #[test]
    fn ok_envelope_shape() {
        let r = sample();
        let v = serde_json::to_value(Envelope::ok(DesignResponse::from(&r))).unwrap();
        assert_eq!(v["status"], 200);
        let body = &v["body"];
        assert_eq!(body["sequence_length"], 200);
        assert_eq!(body["primers"].as_array().unwrap().len(), 1);
        let p = &body["primers"][0];
        for key in ["forward", "reverse", "forward_tm", "reverse_tm", "forward_gc", "reverse_gc", "penalty", "blast_forward", "blast_reverse"] {
            assert!(p.get(key).is_some(), "missing {key}");
        }
        assert!(p["probe"]["sequence"].is_string());
        assert_eq!(body["gc_plot"]["kind"], "inline");
        assert_eq!(body["gc_series"]["window"], 20);
        assert!(body.get("candidates").is_none());
    }

    #[test]
    fn error_envelope_carries_detail() {
        let err = DesignError::InvalidInput("Invalid FASTA sequence".into());
        let env: Envelope<()> = (&err).into();
        assert_eq!(env.status(), 400);
        let v = serde_json::to_value(env).unwrap();
        assert_eq!(v, serde_json::json!({"status": 400, "detail": "Invalid FASTA sequence"}));
    }

    #[test]
    fn health_body() {
        let v = serde_json::to_value(Envelope::ok(HEALTHY)).unwrap();
        assert_eq!(v, serde_json::json!({"status": 200, "body": {"status": "healthy"}}));
    }

    #[test]
    fn csv_has_header_and_one_row_per_pair() {
        let r = sample();
        let mut buf = Vec::new();
        write_csv(&mut buf, "amp.fa", &r).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("source,rank,forward,reverse,forward_start"));
        assert!(header.ends_with("blast_forward,blast_reverse"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("amp.fa,1,"));
        assert!(lines.next().is_none());
        assert_eq!(header.split(',').collect::<Vec<_>>(), CSV_HEADER);
    }

    #[test]
    fn csv_without_pairs_still_has_header() {
        let t = "ACGTTGCATC".repeat(20);
        let r = designer(Vec::new()).design(&t).unwrap();
        let mut buf = Vec::new();
        write_csv(&mut buf, "empty.fa", &r).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec![CSV_HEADER.join(",")]);
    }
}
