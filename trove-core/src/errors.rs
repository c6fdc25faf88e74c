// Copyright (c) The trove Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by trove-core.

use crate::track::RunOutcome;
use thiserror::Error;

/// An error that occurred while parsing downloaded markup text.
///
/// Returned by [`MarkupElement::parse`](crate::MarkupElement::parse).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MarkupParseError {
    /// The markup is not well-formed XML.
    #[error("malformed markup near byte {offset}")]
    Malformed {
        /// Byte offset the reader had reached when it gave up.
        offset: usize,
        /// The underlying reader error.
        #[source]
        err: quick_xml::Error,
    },

    /// The input contained no root element.
    #[error("markup contains no root element")]
    NoRootElement,

    /// Content was found after the root element was closed.
    #[error("trailing content after the root element")]
    TrailingContent,
}

/// An error that occurred while materializing a result tree.
///
/// Corrupt annotation payloads are *not* reported through this type: they
/// are recovered locally (logged, field omitted). This type covers
/// contract violations in the tree itself.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MaterializeError {
    /// A container node lacks the `name` attribute required to extend the
    /// hierarchical path.
    #[error("`{tag}` node under {parent_path:?} has no `name` attribute")]
    MissingName {
        /// Tag of the offending node.
        tag: String,
        /// Path accumulated up to the node's parent.
        parent_path: String,
    },

    /// The downloaded markup could not be parsed.
    #[error("failed to parse result markup")]
    Parse(#[from] MarkupParseError),
}

/// Error returned while parsing a [`RunOutcome`] value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized run outcome: {input}\n(known values: {})",
    RunOutcome::variants().join(", "),
)]
pub struct RunOutcomeParseError {
    input: String,
}

impl RunOutcomeParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}
