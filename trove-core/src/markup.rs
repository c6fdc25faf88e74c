// Copyright (c) The trove Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Element tree for downloaded result content.
//!
//! The remote service serves result content as XML snippets with a small
//! tag vocabulary (suites, cases, annotations, comments). This module owns
//! the text-to-tree step; it is vocabulary-blind, and tag classification
//! happens during materialization.

use crate::errors::MarkupParseError;
use indexmap::IndexMap;
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

/// A single element of a downloaded result tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MarkupElement {
    /// The tag name.
    pub tag: String,

    /// Attributes in document order.
    pub attrs: IndexMap<String, String>,

    /// Inline text, if any remained after trimming surrounding whitespace.
    pub text: Option<String>,

    /// Child elements in document order.
    pub children: Vec<MarkupElement>,
}

impl MarkupElement {
    /// Parses downloaded markup text into an element tree.
    ///
    /// The XML declaration, comments, processing instructions and doctype
    /// are skipped. Text nodes are trimmed, and all-whitespace text is
    /// treated as absent. Exactly one root element is expected; anything
    /// else after it is an error.
    pub fn parse(input: &str) -> Result<Self, MarkupParseError> {
        let mut reader = Reader::from_str(input);
        let mut stack: Vec<MarkupElement> = Vec::new();
        let mut root: Option<MarkupElement> = None;

        loop {
            let offset = reader.buffer_position();
            let event = reader
                .read_event()
                .map_err(|err| MarkupParseError::Malformed { offset, err })?;
            match event {
                Event::Start(start) => {
                    let element = element_from_start(&reader, &start, offset)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&reader, &start, offset)?;
                    attach(element, &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    // The reader validates tag balance, so the stack is
                    // never empty here.
                    let element = stack.pop().expect("end event matches an open element");
                    attach(element, &mut stack, &mut root)?;
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|err| MarkupParseError::Malformed { offset, err })?;
                    append_text(value.trim(), &mut stack, root.is_some())?;
                }
                Event::CData(data) => {
                    let bytes = data.into_inner();
                    let value = reader
                        .decoder()
                        .decode(&bytes)
                        .map_err(|err| MarkupParseError::Malformed { offset, err })?;
                    append_text(value.trim(), &mut stack, root.is_some())?;
                }
                Event::Eof => break,
                // Declaration, comments, processing instructions, doctype.
                _ => {}
            }
        }

        root.ok_or(MarkupParseError::NoRootElement)
    }

    /// Returns the value of the named attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

fn element_from_start(
    reader: &Reader<&[u8]>,
    start: &BytesStart<'_>,
    offset: usize,
) -> Result<MarkupElement, MarkupParseError> {
    let malformed =
        |err: quick_xml::Error| MarkupParseError::Malformed { offset, err };
    let decoder = reader.decoder();

    let tag = decoder
        .decode(start.name().as_ref())
        .map_err(malformed)?
        .into_owned();
    let mut attrs = IndexMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| malformed(err.into()))?;
        let key = decoder
            .decode(attr.key.as_ref())
            .map_err(malformed)?
            .into_owned();
        let value = attr.unescape_value().map_err(malformed)?.into_owned();
        attrs.insert(key, value);
    }

    Ok(MarkupElement {
        tag,
        attrs,
        text: None,
        children: Vec::new(),
    })
}

/// Hands a completed element to its parent, or installs it as the root.
fn attach(
    element: MarkupElement,
    stack: &mut Vec<MarkupElement>,
    root: &mut Option<MarkupElement>,
) -> Result<(), MarkupParseError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_some() {
                return Err(MarkupParseError::TrailingContent);
            }
            *root = Some(element);
        }
    }
    Ok(())
}

fn append_text(
    trimmed: &str,
    stack: &mut [MarkupElement],
    root_is_set: bool,
) -> Result<(), MarkupParseError> {
    if trimmed.is_empty() {
        return Ok(());
    }
    match stack.last_mut() {
        Some(parent) => match &mut parent.text {
            Some(text) => {
                text.push(' ');
                text.push_str(trimmed);
            }
            None => parent.text = Some(trimmed.to_owned()),
        },
        None => {
            return Err(if root_is_set {
                MarkupParseError::TrailingContent
            } else {
                MarkupParseError::NoRootElement
            });
        }
    }
    Ok(())
}
