//! # Document Parsing
//!
//! Turns raw document text into the structured payload sent to the remote
//! index, with an identity derived only from the document's path.
//!
//! ## Identity
//!
//! Remote ids may only contain ASCII letters, digits, `-` and `_`. Paths are
//! escaped byte-wise: letters, digits and `-` pass through, every other UTF-8
//! byte (including `_` itself) becomes `_xx` in lowercase hex. The mapping is
//! injective, so distinct paths never share an id.
//!
//! An escaped id longer than [`MAX_ID_LEN`] is replaced by `__` followed by the
//! SHA-256 of the path. `__` cannot occur in an escaped id (an escape is always
//! followed by a hex digit), so hashed ids never collide with escaped ones.
//!
//! ## Frontmatter
//!
//! An optional YAML block delimited by lines containing only `---`, starting
//! on the first line. A missing closing delimiter means the document has no
//! frontmatter. Malformed YAML never fails parsing: the document gets an empty
//! mapping and a [`ParseWarning`] is returned beside it.

use bridge_traits::RemoteDocument;
use serde_json::{Map, Value};

use crate::hasher::content_hash;

/// Longest id the search service accepts
pub const MAX_ID_LEN: usize = 511;

const FRONTMATTER_DELIMITER: &str = "---";

/// A document ready to be submitted to the remote index
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    /// Display title
    pub name: String,
    pub path: String,
    pub frontmatter: Map<String, Value>,
    /// Body with the frontmatter block stripped
    pub content: String,
    /// Fingerprint of the full original text, frontmatter included
    pub hash: String,
}

impl Document {
    pub fn to_remote(&self) -> RemoteDocument {
        RemoteDocument {
            id: self.id.clone(),
            name: self.name.clone(),
            path: self.path.clone(),
            frontmatter: self.frontmatter.clone(),
            content: self.content.clone(),
        }
    }
}

/// Non-fatal diagnostic produced while parsing a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Result of [`parse`]: the document plus any diagnostic
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub document: Document,
    pub warning: Option<ParseWarning>,
}

/// Derive the remote id for a path.
///
/// Pure: depends on nothing but `path`.
pub fn document_id(path: &str) -> String {
    let mut id = String::with_capacity(path.len());
    for byte in path.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            id.push(byte as char);
        } else {
            id.push('_');
            id.push_str(&format!("{:02x}", byte));
        }
    }

    if id.len() > MAX_ID_LEN {
        format!("__{}", content_hash(path.as_bytes()))
    } else {
        id
    }
}

/// Display name derived from the path: the file name without its extension
pub fn name_from_path(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}

/// Split `raw` into `(yaml, body)` when it starts with a closed frontmatter block
fn split_frontmatter(raw: &str) -> Option<(&str, &str)> {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let mut lines = text.split_inclusive('\n');

    let first = lines.next()?;
    if first.trim_end_matches(['\r', '\n']) != FRONTMATTER_DELIMITER {
        return None;
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if line.trim_end_matches(['\r', '\n']) == FRONTMATTER_DELIMITER {
            return Some((&text[yaml_start..offset], &text[offset + line.len()..]));
        }
        offset += line.len();
    }

    None
}

fn parse_frontmatter(yaml: &str) -> Result<Map<String, Value>, String> {
    if yaml.trim().is_empty() {
        return Ok(Map::new());
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| format!("malformed frontmatter: {}", e))?;

    match value {
        serde_yaml::Value::Null => Ok(Map::new()),
        serde_yaml::Value::Mapping(_) => match serde_json::to_value(&value) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err("frontmatter is not a mapping".to_string()),
            Err(e) => Err(format!("unsupported frontmatter value: {}", e)),
        },
        _ => Err("frontmatter is not a mapping".to_string()),
    }
}

/// Parse a document.
///
/// Never fails; problems with the frontmatter block are reported through
/// [`ParsedDocument::warning`].
pub fn parse(path: &str, raw: &str) -> ParsedDocument {
    let (frontmatter, content, warning) = match split_frontmatter(raw) {
        Some((yaml, body)) => match parse_frontmatter(yaml) {
            Ok(map) => (map, body, None),
            Err(message) => (
                Map::new(),
                body,
                Some(ParseWarning {
                    path: path.to_string(),
                    message,
                }),
            ),
        },
        None => (Map::new(), raw, None),
    };

    let name = frontmatter
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| name_from_path(path));

    ParsedDocument {
        document: Document {
            id: document_id(path),
            name,
            path: path.to_string(),
            frontmatter,
            content: content.to_string(),
            hash: content_hash(raw.as_bytes()),
        },
        warning,
    }
}
