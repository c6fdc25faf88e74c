// Copyright (c) The trove Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of downloaded markup trees into nested JSON documents.
//!
//! Materialization walks the tree once, top down. Each container node
//! extends the hierarchical path with its own `name` attribute, collects
//! its converted children under a class-specific key (`cases`,
//! `annotations`, `comments`), and stamps every child record's `path`
//! with its own path after the recursive call returns. Annotation inline
//! text is stored base64-encoded and gzip-compressed by the remote
//! service; it is decoded here, and corrupt payloads are logged and
//! skipped rather than failing the conversion.

use crate::{
    errors::MaterializeError,
    markup::MarkupElement,
    progress::{ProgressKind, ProgressSink},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use flate2::read::GzDecoder;
use serde_json::{Map, Value};
use std::io::Read as _;
use thiserror::Error;
use tracing::{debug, warn};

/// Tag classes recognized in downloaded result trees.
///
/// The remote service uses two spellings for the container tags depending
/// on which endpoint produced the snippet; both are accepted.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum TagClass {
    /// A suite container (`suite` or `test_suite`).
    Suite,

    /// A case container (`case` or `test_case`).
    Case,

    /// An `annotation` node.
    Annotation,

    /// A `comment` leaf.
    Comment,

    /// Any other tag.
    Other,
}

impl TagClass {
    /// Classifies a tag name.
    pub fn of(tag: &str) -> Self {
        match tag {
            "suite" | "test_suite" => TagClass::Suite,
            "case" | "test_case" => TagClass::Case,
            "annotation" => TagClass::Annotation,
            "comment" => TagClass::Comment,
            _ => TagClass::Other,
        }
    }

    /// The key under which this class collects its converted children.
    fn child_slot(self) -> Option<&'static str> {
        match self {
            TagClass::Suite => Some("cases"),
            TagClass::Case => Some("annotations"),
            TagClass::Annotation => Some("comments"),
            TagClass::Comment | TagClass::Other => None,
        }
    }

    fn progress_kind(self, tag: &str) -> ProgressKind {
        match self {
            TagClass::Suite => ProgressKind::Suites,
            TagClass::Case => ProgressKind::Cases,
            TagClass::Annotation => ProgressKind::Annotations,
            TagClass::Comment | TagClass::Other => {
                ProgressKind::Other(tag.to_owned())
            }
        }
    }
}

/// One materialized node: the source tag plus the bare content record.
///
/// Parents consume only the content; the tag rides along so callers can
/// dispatch on what the root of a converted snippet turned out to be.
#[derive(Clone, Debug)]
pub struct MaterializedNode {
    /// The source element's tag name.
    pub tag: String,

    /// The converted record: attributes, `path`, decoded `text`, and the
    /// child slot when non-empty.
    pub content: Map<String, Value>,
}

impl MaterializedNode {
    /// Classifies this node's source tag.
    pub fn class(&self) -> TagClass {
        TagClass::of(&self.tag)
    }
}

/// Parses downloaded markup text and materializes it in one step.
///
/// Convenience for callers holding the raw snippet; see [`materialize`].
pub fn materialize_str(
    input: &str,
    parent_path: &str,
    progress: &mut dyn ProgressSink,
) -> Result<MaterializedNode, MaterializeError> {
    let element = MarkupElement::parse(input)?;
    materialize(&element, parent_path, progress)
}

/// Materializes one markup element into a JSON record.
///
/// `parent_path` is the slash-separated chain of ancestor names; pass `""`
/// for the outermost element, so the first segment begins with a single
/// `/`. The sink receives exactly one unit per node visited; pass
/// [`NoProgress`](crate::NoProgress) to ignore progress.
///
/// Container nodes (suites, cases, annotations) must carry a `name`
/// attribute; a missing one is a contract violation reported as
/// [`MaterializeError::MissingName`]. Empty child slots are pruned from
/// the output rather than left as empty lists.
pub fn materialize(
    element: &MarkupElement,
    parent_path: &str,
    progress: &mut dyn ProgressSink,
) -> Result<MaterializedNode, MaterializeError> {
    let class = TagClass::of(&element.tag);
    let mut content: Map<String, Value> = element
        .attrs
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();

    match class {
        TagClass::Suite | TagClass::Case | TagClass::Annotation => {
            let name = element.attr("name").ok_or_else(|| {
                MaterializeError::MissingName {
                    tag: element.tag.clone(),
                    parent_path: parent_path.to_owned(),
                }
            })?;
            let path = format!("{parent_path}/{name}");
            debug!("materializing {} at {path}", element.tag);
            content.insert("path".to_owned(), Value::String(path.clone()));

            if class == TagClass::Annotation {
                if let Some(encoded) = &element.text {
                    match decode_annotation_text(encoded) {
                        Ok(text) => {
                            content.insert("text".to_owned(), Value::String(text));
                        }
                        Err(error) => {
                            warn!("undecodable annotation text at {path}: {error}");
                        }
                    }
                }
            }

            let mut children = Vec::with_capacity(element.children.len());
            for child in &element.children {
                let node = materialize(child, &path, progress)?;
                let mut record = node.content;
                // Children are stamped with this node's path, top down;
                // the deeper path a child computed for itself was only
                // used for its own recursion.
                record.insert("path".to_owned(), Value::String(path.clone()));
                children.push(Value::Object(record));
            }
            if !children.is_empty() {
                let slot = class
                    .child_slot()
                    .expect("container classes have a child slot");
                content.insert(slot.to_owned(), Value::Array(children));
            }
        }
        TagClass::Comment => {
            if let Some(text) = &element.text {
                content.insert("text".to_owned(), Value::String(text.clone()));
            }
            content.insert(
                "path".to_owned(),
                Value::String(parent_path.to_owned()),
            );
        }
        TagClass::Other => {
            debug!("leaving unrecognized tag {} as-is", element.tag);
        }
    }

    progress.report(class.progress_kind(&element.tag));

    Ok(MaterializedNode {
        tag: element.tag.clone(),
        content,
    })
}

#[derive(Debug, Error)]
enum AnnotationTextError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid gzip payload: {0}")]
    Gzip(#[from] std::io::Error),
}

/// Annotation payloads are gzip-compressed then base64-encoded. Encoders
/// may wrap the base64 text, so ASCII whitespace is stripped first.
fn decode_annotation_text(encoded: &str) -> Result<String, AnnotationTextError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let compressed = STANDARD.decode(compact)?;
    let mut text = String::new();
    GzDecoder::new(compressed.as_slice()).read_to_string(&mut text)?;
    Ok(text)
}
