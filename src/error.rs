//! Request-level error taxonomy.
//!
//! Only failures that abort a whole request live here. Problems scoped to a
//! single primer pair (no probe, a probe whose Tm cannot be computed) are
//! handled inside [`crate::pipeline`] by dropping that pair, and similarity
//! submission problems degrade to status strings in [`crate::similarity`].

/// A failure that ends a design request.
#[derive(thiserror::Error, Debug)]
pub enum DesignError {
    /// Normalization produced an empty sequence (client fault).
    #[error("{0}")]
    InvalidInput(String),
    /// The candidate-generation engine failed, panicked or timed out.
    #[error("primer generation failed: {0}")]
    Generation(String),
    /// The GC plot could not be rendered or written.
    #[error("GC plot failed: {0}")]
    Plot(String),
    /// Any other failure above the per-pair boundary.
    #[error("design pipeline failed: {0}")]
    Pipeline(String),
}

impl DesignError {
    /// HTTP-like status class: `400` for client faults, `500` otherwise.
    pub fn status_code(&self) -> u16 {
        match self {
            DesignError::InvalidInput(_) => 400,
            DesignError::Generation(_) | DesignError::Plot(_) | DesignError::Pipeline(_) => 500,
        }
    }

    /// `true` when the caller sent something unusable.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

impl From<crate::plot::PlotError> for DesignError {
    fn from(err: crate::plot::PlotError) -> Self {
        DesignError::Plot(err.to_string())
    }
}

impl From<crate::engine::GenerationError> for DesignError {
    fn from(err: crate::engine::GenerationError) -> Self {
        DesignError::Generation(err.to_string())
    }
}

#[cfg(test)]
mod status_tests {
    use super::*;

    #[test]
    fn invalid_input_is_a_client_error() {
        let e = DesignError::InvalidInput("Invalid FASTA sequence".into());
        assert_eq!(e.status_code(), 400);
        assert!(e.is_client_error());
        assert_eq!(e.to_string(), "Invalid FASTA sequence");
    }

    #[test]
    fn collaborator_failures_are_server_errors() {
        for e in [
            DesignError::Generation("timeout".into()),
            DesignError::Plot("disk full".into()),
            DesignError::Pipeline("boom".into()),
        ] {
            assert_eq!(e.status_code(), 500);
            assert!(!e.is_client_error());
        }
    }
}
