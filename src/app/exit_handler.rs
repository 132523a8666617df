//! Exit code logic for the bookcapture process.
//!
//! Single responsibility: map a run result to the process exit outcome.

use bookcapture_core::{PipelineError, RunSummary};

use crate::ProcessExit;

/// Determines the process exit outcome from the archive result.
pub(crate) fn determine_exit_outcome(result: &Result<RunSummary, PipelineError>) -> ProcessExit {
    match result {
        Ok(_) => ProcessExit::Success,
        Err(error) if error.is_partial() => ProcessExit::Partial,
        Err(_) => ProcessExit::Failure,
    }
}

#[cfg(test)]
mod tests {
    use super::determine_exit_outcome;
    use crate::ProcessExit;
    use bookcapture_core::{CaptureError, DocumentIdentity, DocumentTarget, PipelineError, RunSummary};

    #[test]
    fn test_exit_outcome_success_for_empty_document() {
        let identity = DocumentIdentity::new(&DocumentTarget::new("1"), "Empty");
        let result = Ok(RunSummary::EmptyDocument { identity });
        assert_eq!(determine_exit_outcome(&result), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_pages_saved_before_denial() {
        let result = Err(PipelineError::from(CaptureError::AccessDenied { page: 7 }));
        assert_eq!(determine_exit_outcome(&result), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_failure_when_first_page_denied() {
        let result = Err(PipelineError::from(CaptureError::AccessDenied { page: 1 }));
        assert_eq!(determine_exit_outcome(&result), ProcessExit::Failure);
    }

    #[test]
    fn test_process_exit_codes() {
        assert_eq!(ProcessExit::Success.code(), 0);
        assert_eq!(ProcessExit::Failure.code(), 1);
        assert_eq!(ProcessExit::Partial.code(), 2);
    }
}
