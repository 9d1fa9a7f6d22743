//! Input normalization for **FASTA or raw** nucleotide text.
//!
//! ### Design
//! - **FASTA** parsed with `needletail`, starting at the first `>` header line
//!   (anything above it is ignored). Only the **first** record is used; later
//!   records are counted and reported but never merged.
//! - **Raw** text (no header anywhere) is uppercased with **all** whitespace
//!   removed, interior line breaks and spaces included, not only the leading
//!   and trailing runs. A sequence pasted over several lines is joined.
//! - A parser error yields an **empty** sequence; rejecting it is the caller's
//!   job (see [`crate::pipeline::Designer::design`]).
//!
//! ### Example
//! ```
//! use taqpick::seqio::normalize_input;
//! let n = normalize_input(">amp1\nacgt\nACGT\n>amp2\nTTTT\n");
//! assert_eq!(n.sequence, "ACGTACGT");
//! assert_eq!(n.extra_records, 1);
//! assert_eq!(normalize_input("acgtACGT  ").sequence, "ACGTACGT");
//! ```

use std::io::Cursor;

use needletail::parse_fastx_reader;

/// Where a normalized sequence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat { Fasta, Raw }

/// A canonical, uppercase sequence plus what the normalizer noticed on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// Uppercase nucleotide string; empty when the input was unusable.
    pub sequence: String,
    /// Identifier of the FASTA record used, if the input was FASTA.
    pub id: Option<String>,
    pub format: InputFormat,
    /// FASTA records after the first one (ignored).
    pub extra_records: usize,
    /// Characters outside `A|C|G|T`; kept in the sequence, flagged to the caller.
    pub non_acgt: usize,
}

impl Normalized {
    fn empty(format: InputFormat) -> Self {
        Normalized { sequence: String::new(), id: None, format, extra_records: 0, non_acgt: 0 }
    }

    pub fn is_empty(&self) -> bool { self.sequence.is_empty() }
}

/// Count characters that are not one of `A`, `C`, `G`, `T` (case-insensitive).
#[inline]
pub fn count_non_acgt(seq: &str) -> usize {
    seq.bytes().filter(|b| !matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T')).count()
}

/// Byte offset of the `>` that opens the first FASTA header line, if any.
fn first_header_offset(text: &str) -> Option<usize> {
    let mut offset = 0usize;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('>') {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }
    None
}

/// Normalize a FASTA or raw text blob into a canonical uppercase sequence.
pub fn normalize_input(text: &str) -> Normalized {
    match first_header_offset(text) {
        Some(start) => normalize_fasta(&text[start..]),
        None => normalize_raw(text),
    }
}

/// Trims and also drops interior whitespace.
fn normalize_raw(text: &str) -> Normalized {
    let sequence: String = text
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let non_acgt = count_non_acgt(&sequence);
    Normalized { sequence, id: None, format: InputFormat::Raw, extra_records: 0, non_acgt }
}

fn normalize_fasta(text: &str) -> Normalized {
    let cursor = Cursor::new(text.as_bytes().to_vec());
    let mut reader = match parse_fastx_reader(cursor) {
        Ok(r) => r,
        Err(e) => {
            log::debug!("FASTA reader rejected input: {e}");
            return Normalized::empty(InputFormat::Fasta);
        }
    };
    let record = match reader.next() {
        Some(Ok(rec)) => rec,
        Some(Err(e)) => {
            log::debug!("FASTA record could not be parsed: {e}");
            return Normalized::empty(InputFormat::Fasta);
        }
        None => return normalize_raw(text),
    };

    let id = String::from_utf8_lossy(record.id()).to_string();
    let sequence = String::from_utf8_lossy(&record.seq()).to_ascii_uppercase();
    let extra_records = text
        .lines()
        .filter(|l| l.trim_start().starts_with('>'))
        .count()
        .saturating_sub(1);
    let non_acgt = count_non_acgt(&sequence);
    Normalized { sequence, id: Some(id), format: InputFormat::Fasta, extra_records, non_acgt }
}
