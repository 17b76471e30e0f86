// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Literate testing for script examples in markdown documents.
//!
//! Extracts annotated code blocks from documents, runs them through the
//! sandboxed interpreter and reports whether they behave as documented.
//!
//! ```text
//! text -> extract -> Document -> ContextManager -> execute (per block)
//!      -> aggregate -> DocumentReport
//! ```
//!
//! Blocks of one document share a carried context, in order, so a later
//! block sees what an earlier one defined. Documents are independent and
//! run in parallel.

pub mod config;
pub mod context;
pub mod executor;
pub mod extract;
pub mod policy;
pub mod report;
pub mod runner;

pub use config::{ConfigError, ExpectErrorPolicy, RunConfig};
pub use context::{ContextManager, DocumentRun, ExecutionContext, Lifetime};
pub use executor::execute;
pub use extract::{
    extract, Annotations, CodeBlock, Document, DocumentSource, ExpectError, Extractor, ParseError,
    Segment,
};
pub use policy::{CancelToken, PolicyConfig, Watchdog};
pub use report::{aggregate, BlockOutcome, DocumentReport, ExecutionResult, Failure};
pub use runner::{exit_code, run, run_document, run_with_cancel};
