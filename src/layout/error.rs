//! Error types for the layout engine

use thiserror::Error;

use super::solver::SolverError;

/// Errors that can occur during layout computation
///
/// Unsatisfiable layouts are not errors: the solver breaks constraints by
/// priority and the engine carries on.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// The template has nothing to draw
    #[error("template has no body")]
    NoBody,

    #[error("unsupported template version {0}")]
    UnsupportedVersion(i64),

    /// Constraint solver error
    #[error("constraint solver error: {0}")]
    SolverError(#[from] SolverError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(LayoutError::NoBody.to_string(), "template has no body");
        assert_eq!(
            LayoutError::UnsupportedVersion(7).to_string(),
            "unsupported template version 7"
        );
        let err: LayoutError = SolverError::UnknownHandle(3).into();
        assert!(err.to_string().contains("Unknown constraint handle 3"));
    }
}
