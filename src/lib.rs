//! Core library for the valuation-tools command line application.
//!
//! The library exposes the pieces the `fetch` command is assembled from so
//! that they can be driven from tests with canned responses. IO adapters
//! (address lists, the provider client, table writers) live under
//! [`valuation::tools::io`], typed responses and rows inside
//! [`valuation::tools::model`], the response flattening logic in
//! [`valuation::tools::flatten`], and the fetch orchestration under
//! [`valuation::tools::collect`].

pub mod valuation;

pub use valuation::tools::{Result, ToolError, collect, error, flatten, io, logging, model};
