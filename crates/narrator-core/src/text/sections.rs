//! Heading-delimited document sections

use fancy_regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::error::{Error, Result};

static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(=+)\s+(.*?)\s+\1").unwrap());

/// A titled run of the document
///
/// `content` starts at the section's own heading marker, so concatenating
/// every section's content in order yields the document itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub title: Option<String>,
    pub content: String,
}

/// Split a document at its `== title ==` markers.
///
/// The first section is always untitled and holds whatever precedes the
/// first heading; it is empty when the document opens with a heading.
pub fn split_sections(document: &str) -> Result<Vec<Section>> {
    let mut sections = Vec::new();
    let mut start = 0;
    let mut title = None;

    for caps in SECTION_RE.captures_iter(document) {
        let caps = caps.map_err(|e| Error::Pattern(e.to_string()))?;
        let (Some(marker), Some(name)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        sections.push(Section {
            title: title.take(),
            content: document[start..marker.start()].to_string(),
        });
        start = marker.start();
        title = Some(name.as_str().to_string());
    }

    sections.push(Section {
        title,
        content: document[start..].to_string(),
    });
    Ok(sections)
}
