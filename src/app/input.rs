//! Resolves which document to archive, asking the operator for what the
//! command line left out.

use anyhow::Result;
use bookcapture_core::target::parse_document_reference;
use bookcapture_core::{DEFAULT_DOMAIN, DocumentTarget, Prompter};

/// Builds the target from `document`, or prompts for a domain override and a
/// document reference when `document` is `None`.
pub(crate) fn resolve_target(
    document: Option<&str>,
    volume: Option<u32>,
    domain: Option<&str>,
    prompter: &dyn Prompter,
) -> Result<DocumentTarget> {
    let (reference, domain) = match document {
        Some(reference) => (reference.to_string(), domain.map(str::to_string)),
        None => {
            let domain = match domain {
                Some(domain) => Some(domain.to_string()),
                None => {
                    let answer = prompter
                        .ask_line(&format!("Reader domain (blank for {DEFAULT_DOMAIN}):"))?;
                    (!answer.is_empty()).then_some(answer)
                }
            };
            let reference = prompter.ask_line("Document id or reader URL:")?;
            (reference, domain)
        }
    };

    let target = parse_document_reference(&reference, domain.as_deref())?;
    Ok(target.with_volume(volume))
}
