//! Bookcapture Core Library
//!
//! This library archives a paginated, access-controlled online reader into a
//! locally stored, page-ordered PDF. Runs are resumable: every page is
//! persisted as its own artifact and re-runs only capture what is missing.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`target`] - Document references, identities and reader URL parsing
//! - [`auth`] - Session cookies and their on-disk store
//! - [`driver`] - Browser automation contract and the Chromium implementation
//! - [`session`] - Session negotiation state machine
//! - [`capture`] - Discovery and the resumable per-page capture loop
//! - [`catalog`] - Table-of-contents fetch and persistence
//! - [`assemble`] - Ordered PDF assembly and outline annotation
//! - [`pipeline`] - The end-to-end archive run

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assemble;
pub mod auth;
pub mod capture;
pub mod catalog;
pub mod driver;
pub mod endpoints;
pub mod failure;
pub mod layout;
pub mod pipeline;
pub mod prompt;
pub mod reader;
pub mod session;
pub mod settings;
pub mod target;

mod filename;

// Re-export commonly used types
pub use assemble::{AssemblyError, AssemblyOutcome, AnnotateOutcome, assemble_document};
pub use auth::{SessionCookie, SessionCredentials, SessionStore, StoreError};
pub use capture::{CaptureError, CaptureEvent, CaptureObserver, CaptureOutcome, CaptureReport};
pub use catalog::{CatalogEntry, CatalogError, CatalogFetcher, CatalogStatus, CatalogTree};
pub use driver::{AutomationDriver, DriverError, DriverLauncher, LaunchMode, Visibility};
pub use endpoints::Endpoints;
pub use failure::{FailureCategory, FailureDescriptor, describe_failure};
pub use layout::ArtifactLayout;
pub use pipeline::{ArchivedDocument, Archiver, PipelineError, RunSummary};
pub use prompt::{PromptError, Prompter, TerminalPrompter};
pub use session::{NegotiatorState, SessionError, SessionNegotiator, ViewingContext};
pub use settings::{ArchiveSettings, AssemblySettings, BrowserSettings, CaptureTimings};
pub use target::{DEFAULT_DOMAIN, DocumentIdentity, DocumentTarget, TargetError};
