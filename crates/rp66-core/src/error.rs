//! Error types for segmentation and object queries

use rp66_formats::FormatError;
use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by segmentation and object lookups
///
/// Structural problems in a file are not errors: they are logged and
/// surfaced as flags on the logical file. Only failures that leave nothing
/// usable to return end up here.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing or record decoding error
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Invalid query pattern
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// No object matched a single-object lookup
    #[error("no {object_type} object named {name}")]
    NotFound {
        /// Requested object type
        object_type: String,
        /// Requested object name
        name: String,
    },

    /// Several distinct objects matched a single-object lookup
    #[error(
        "{} {object_type} objects named {name}, disambiguate by origin and copy: {}",
        .candidates.len(),
        format_candidates(.candidates)
    )]
    Ambiguous {
        /// Requested object type
        object_type: String,
        /// Requested object name
        name: String,
        /// (origin, copy) of every match
        candidates: Vec<(u32, u8)>,
    },
}

fn format_candidates(candidates: &[(u32, u8)]) -> String {
    candidates
        .iter()
        .map(|(origin, copy)| format!("(origin={origin}, copy={copy})"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_lists_candidates() {
        let err = Error::Ambiguous {
            object_type: "CHANNEL".to_string(),
            name: "GR".to_string(),
            candidates: vec![(1, 0), (2, 0)],
        };
        assert_eq!(
            err.to_string(),
            "2 CHANNEL objects named GR, disambiguate by origin and copy: \
             (origin=1, copy=0), (origin=2, copy=0)"
        );
    }
}
