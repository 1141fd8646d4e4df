// Template documents: parsing `{identifier}` placeholders out of descriptor
// text and caching the parsed result per source.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use log::debug;

use super::error::GenError;
use super::templates::Flavor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template. Immutable once built, so it is shared between
/// requests behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDocument {
    source_label: String,
    segments: Vec<Segment>,
}

pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_identifier_char)
}

// Where the scan starting right after a `{` stopped.
enum MarkerEnd<'a> {
    Closed(&'a str),
    Nested(&'a str),
    Open(&'a str),
}

fn scan_marker(after_brace: &str) -> MarkerEnd<'_> {
    // Markers never span lines, whichever line ending the source uses.
    match after_brace.find(['}', '{', '\n', '\r']) {
        Some(end) => {
            let inner = &after_brace[..end];
            match after_brace.as_bytes()[end] {
                b'}' => MarkerEnd::Closed(inner),
                b'{' => MarkerEnd::Nested(inner),
                _ => MarkerEnd::Open(inner),
            }
        }
        None => MarkerEnd::Open(after_brace),
    }
}

/// Returns the first `{identifier}` token found in `text`, braces included.
pub fn find_marker(text: &str) -> Option<String> {
    let mut from = 0;
    while let Some(pos) = text[from..].find('{') {
        let start = from + pos;
        if let MarkerEnd::Closed(inner) = scan_marker(&text[start + 1..]) {
            if is_identifier(inner) {
                return Some(format!("{{{}}}", inner));
            }
        }
        from = start + 1;
    }
    None
}

fn line_and_column(text: &str, byte_offset: usize) -> (usize, usize) {
    let before = &text[..byte_offset];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

impl TemplateDocument {
    pub fn parse(source_label: &str, text: &str) -> Result<Self, GenError> {
        let malformed = |offset: usize, reason: &str| {
            let (line, column) = line_and_column(text, offset);
            GenError::MalformedPlaceholder {
                source_label: source_label.to_string(),
                line,
                column,
                reason: reason.to_string(),
            }
        };

        let mut segments = vec![];
        let mut literal_start = 0;
        let mut from = 0;

        while let Some(pos) = text[from..].find('{') {
            let start = from + pos;
            match scan_marker(&text[start + 1..]) {
                MarkerEnd::Closed(inner) if is_identifier(inner) => {
                    if literal_start < start {
                        segments.push(Segment::Literal(text[literal_start..start].to_string()));
                    }
                    segments.push(Segment::Placeholder(inner.to_string()));
                    from = start + inner.len() + 2;
                    literal_start = from;
                    continue;
                }
                MarkerEnd::Nested(inner) if inner.chars().all(is_identifier_char) => {
                    return Err(malformed(start, "placeholder markers do not nest"));
                }
                MarkerEnd::Open(inner) if is_identifier(inner) => {
                    return Err(malformed(start, "placeholder marker is never closed"));
                }
                // Anything else is a literal brace.
                _ => {}
            }
            from = start + 1;
        }
        if literal_start < text.len() {
            segments.push(Segment::Literal(text[literal_start..].to_string()));
        }

        debug!(
            "Parsed template {}: {} segments",
            source_label,
            segments.len()
        );
        Ok(Self {
            source_label: source_label.to_string(),
            segments,
        })
    }

    pub fn load(path: &Path) -> Result<Self, GenError> {
        let text = std::fs::read_to_string(path).map_err(|e| GenError::TemplateNotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&path.display().to_string(), &text)
    }

    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    // Placeholder names in document order, repeats included.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

}

impl fmt::Display for TemplateDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Placeholder(name) => write!(f, "{{{}}}", name)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateKey {
    File(PathBuf),
    Builtin(Flavor),
}

/// Process-local cache of parsed templates.
///
/// Cached documents are served from a read lock. A miss takes a per-key gate
/// so that concurrent first loads of the same key parse the source once.
#[derive(Default)]
pub struct TemplateStore {
    documents: RwLock<HashMap<TemplateKey, Arc<TemplateDocument>>>,
    gates: Mutex<HashMap<TemplateKey, Arc<Mutex<()>>>>,
    parses: AtomicUsize,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, path: &Path) -> Result<Arc<TemplateDocument>, GenError> {
        self.get_or_parse(TemplateKey::File(path.to_path_buf()), || {
            TemplateDocument::load(path)
        })
    }

    pub fn builtin(&self, flavor: Flavor) -> Result<Arc<TemplateDocument>, GenError> {
        self.get_or_parse(TemplateKey::Builtin(flavor), || {
            TemplateDocument::parse(flavor.builtin_label(), flavor.builtin_source())
        })
    }

    fn cached(&self, key: &TemplateKey) -> Option<Arc<TemplateDocument>> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn get_or_parse<F>(&self, key: TemplateKey, parse: F) -> Result<Arc<TemplateDocument>, GenError>
    where
        F: FnOnce() -> Result<TemplateDocument, GenError>,
    {
        if let Some(doc) = self.cached(&key) {
            return Ok(doc);
        }

        let gate = self
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone();
        let _flight = gate.lock().unwrap_or_else(PoisonError::into_inner);

        // Another thread may have finished the parse while we waited.
        if let Some(doc) = self.cached(&key) {
            return Ok(doc);
        }

        let doc = Arc::new(parse()?);
        let parsed = self.parses.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Cached template {:?} ({} parsed by this store)", key, parsed);
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, doc.clone());
        Ok(doc)
    }
}
