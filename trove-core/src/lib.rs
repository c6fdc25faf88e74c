// Copyright (c) The trove Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core logic for working with downloaded test-result trees.
//!
//! Two independent pieces live here, both pure:
//!
//! - [`materialize`] recursively converts a downloaded markup tree
//!   (suites, cases, annotations, comments) into a nested JSON document,
//!   reconstructing hierarchical paths and decoding compressed annotation
//!   payloads along the way.
//! - [`TrackRecord`] classifies a test case's consecutive run outcomes
//!   into a trend label (new, consistent, flaky, passing, resolved), with
//!   [`CaseLedger`] folding whole runs case by case.
//!
//! Fetching result content from the remote service and storing the
//! produced documents are the caller's concern; nothing in this crate
//! performs I/O beyond emitting `tracing` events.

pub mod errors;
mod markup;
mod materialize;
mod progress;
mod track;

pub use markup::MarkupElement;
pub use materialize::{MaterializedNode, TagClass, materialize, materialize_str};
pub use progress::{NoProgress, ProgressKind, ProgressSink};
pub use track::{CaseLedger, RunOutcome, TrackRecord, TrackState};
