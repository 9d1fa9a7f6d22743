//! Nearest-neighbour melting temperature for short DNA oligos.
//!
//! Unified parameters from SantaLucia (1998), PNAS 95:1460. Salt handling
//! follows the SantaLucia entropy correction with Mg²⁺ folded into an
//! equivalent monovalent concentration (von Ahsen et al. 2001), the same
//! defaults primer3 uses for `calc_tm`.
//!
//! # Examples
//! ```
//! use taqpick::thermo::{melting_temp, SaltConditions};
//! let tm = melting_temp("TTGCATGCCAGTACGATCGA", &SaltConditions::default()).unwrap();
//! assert!((tm - 59.8).abs() < 0.5);
//! ```

use serde::{Deserialize, Serialize};

const R: f64 = 1.987;

/// Oligo and buffer concentrations used for Tm.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaltConditions {
    /// Monovalent cations, mM.
    pub monovalent_mm: f64,
    /// Divalent cations (Mg²⁺), mM.
    pub divalent_mm: f64,
    /// dNTPs, mM (they chelate Mg²⁺).
    pub dntp_mm: f64,
    /// Oligo strand concentration, nM.
    pub dna_nm: f64,
}

impl Default for SaltConditions {
    fn default() -> Self {
        Self { monovalent_mm: 50.0, divalent_mm: 1.5, dntp_mm: 0.6, dna_nm: 50.0 }
    }
}

impl SaltConditions {
    /// Monovalent-equivalent sodium in mol/L.
    fn sodium_equivalent(&self) -> f64 {
        let free_mg = (self.divalent_mm - self.dntp_mm).max(0.0);
        (self.monovalent_mm + 120.0 * free_mg.sqrt()) / 1000.0
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ThermoError {
    #[error("sequence too short for nearest-neighbour Tm (length {0})")]
    TooShort(usize),
    #[error("non-ACGT base '{base}' at position {pos}")]
    InvalidBase { base: char, pos: usize },
    #[error("salt or oligo concentration must be positive")]
    BadConditions,
}

/// ΔH (kcal/mol) and ΔS (cal/K·mol) for a 5'→3' dinucleotide step.
fn nn_step(a: u8, b: u8) -> (f64, f64) {
    match (a, b) {
        (b'A', b'A') | (b'T', b'T') => (-7.9, -22.2),
        (b'A', b'T') => (-7.2, -20.4),
        (b'T', b'A') => (-7.2, -21.3),
        (b'C', b'A') | (b'T', b'G') => (-8.5, -22.7),
        (b'G', b'T') | (b'A', b'C') => (-8.4, -22.4),
        (b'C', b'T') | (b'A', b'G') => (-7.8, -21.0),
        (b'G', b'A') | (b'T', b'C') => (-8.2, -22.2),
        (b'C', b'G') => (-10.6, -27.2),
        (b'G', b'C') => (-9.8, -24.4),
        (b'G', b'G') | (b'C', b'C') => (-8.0, -19.9),
        _ => unreachable!("bases validated before lookup"),
    }
}

fn terminal(base: u8) -> (f64, f64) {
    match base {
        b'G' | b'C' => (0.1, -2.8),
        _ => (2.3, 4.1),
    }
}

fn complement(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        _ => b'C',
    }
}

/// `true` when the oligo equals its own reverse complement.
pub fn is_self_complementary(seq: &[u8]) -> bool {
    seq.iter().zip(seq.iter().rev()).all(|(&a, &b)| a == complement(b))
}

/// Melting temperature (°C) of a perfectly matched duplex.
pub fn melting_temp(seq: &str, salt: &SaltConditions) -> Result<f64, ThermoError> {
    let s: Vec<u8> = seq.bytes().map(|b| b.to_ascii_uppercase()).collect();
    if s.len() < 2 {
        return Err(ThermoError::TooShort(s.len()));
    }
    if let Some(pos) = s.iter().position(|b| !matches!(b, b'A' | b'C' | b'G' | b'T')) {
        return Err(ThermoError::InvalidBase { base: s[pos] as char, pos });
    }
    if salt.dna_nm <= 0.0 || salt.sodium_equivalent() <= 0.0 {
        return Err(ThermoError::BadConditions);
    }

    let (mut dh, mut ds) = s.windows(2).fold((0.0, 0.0), |(h, e), w| {
        let (sh, se) = nn_step(w[0], w[1]);
        (h + sh, e + se)
    });
    for end in [s[0], s[s.len() - 1]] {
        let (th, ts) = terminal(end);
        dh += th;
        ds += ts;
    }

    let symmetric = is_self_complementary(&s);
    if symmetric {
        ds += -1.4;
    }
    ds += 0.368 * (s.len() - 1) as f64 * salt.sodium_equivalent().ln();

    let ct = salt.dna_nm * 1e-9;
    let effective = if symmetric { ct } else { ct / 4.0 };
    Ok(dh * 1000.0 / (ds + R * effective.ln()) - 273.15)
}

#[cfg(test)]
mod tm_tests {
    use super::*;

    fn tm(s: &str) -> f64 { melting_temp(s, &SaltConditions::default()).unwrap() }

    #[test]
    fn known_oligos_within_tolerance() {
        assert!((tm("GTAAAACGACGGCCAGT") - 54.7).abs() < 0.3);
        assert!((tm("AGCGTACGTTAGCCTAGCTA") - 58.0).abs() < 0.3);
        assert!((tm("CAGGAAACAGCTATGAC") - 49.1).abs() < 0.3);
    }

    #[test]
    fn gc_rich_melts_higher() {
        assert!(tm("GCGCGGCCGCGGCGCCGCGC") > tm("TTGCATGCCAGTACGATCGA"));
        assert!(tm("TTGCATGCCAGTACGATCGA") > tm("ATATATATATATATATATAT"));
    }

    #[test]
    fn case_does_not_matter() {
        assert_eq!(tm("acgtTGCAacgtTGCAggcc"), tm("ACGTTGCAACGTTGCAGGCC"));
    }

    #[test]
    fn self_complementary_detection() {
        assert!(is_self_complementary(b"ACGT"));
        assert!(is_self_complementary(b"ATATATAT"));
        assert!(!is_self_complementary(b"AAAA"));
    }

    #[test]
    fn invalid_input_is_reported() {
        let salt = SaltConditions::default();
        assert_eq!(melting_temp("A", &salt), Err(ThermoError::TooShort(1)));
        assert_eq!(
            melting_temp("ACGNT", &salt),
            Err(ThermoError::InvalidBase { base: 'N', pos: 3 })
        );
        let bad = SaltConditions { dna_nm: 0.0, ..SaltConditions::default() };
        assert_eq!(melting_temp("ACGT", &bad), Err(ThermoError::BadConditions));
    }

    #[test]
    fn more_salt_raises_tm() {
        let low = SaltConditions::default();
        let high = SaltConditions { monovalent_mm: 200.0, ..low };
        let s = "TTGCATGCCAGTACGATCGA";
        assert!(melting_temp(s, &high).unwrap() > melting_temp(s, &low).unwrap());
    }
}
