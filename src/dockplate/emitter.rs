use std::path::Path;

use anyhow::Result;
use log::debug;
use serde::Serialize;

use super::error::GenError;
use super::resolver::{Origin, ResolvedSegment};
use super::template::find_marker;

/// The rendered descriptor plus a record of which placeholders produced what.
/// Serializing it yields only that record, for audit reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildDescriptor {
    #[serde(skip_serializing)]
    text: String,
    fixed: Vec<String>,
    included: Vec<String>,
    excluded: Vec<String>,
}

impl BuildDescriptor {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fixed(&self) -> &[String] {
        &self.fixed
    }

    // Conditional fragments whose present text was emitted.
    pub fn included(&self) -> &[String] {
        &self.included
    }

    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.text)?;
        Ok(())
    }
}

fn note(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

pub fn emit(segments: Vec<ResolvedSegment>) -> Result<BuildDescriptor, GenError> {
    let mut text = String::with_capacity(segments.iter().map(|s| s.text.len()).sum());
    let mut fixed = vec![];
    let mut included = vec![];
    let mut excluded = vec![];

    for segment in segments {
        match &segment.origin {
            Origin::Literal => {}
            Origin::Fixed { name } => note(&mut fixed, name),
            Origin::Fragment { name, included: true } => note(&mut included, name),
            Origin::Fragment { name, included: false } => note(&mut excluded, name),
        }
        text.push_str(&segment.text);
    }

    if let Some(marker) = find_marker(&text) {
        return Err(GenError::EmissionInvariantViolated(marker));
    }

    debug!(
        "Emitted descriptor: {} bytes, fixed {:?}, included {:?}, excluded {:?}",
        text.len(),
        fixed,
        included,
        excluded
    );
    Ok(BuildDescriptor {
        text,
        fixed,
        included,
        excluded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(text: &str) -> ResolvedSegment {
        ResolvedSegment {
            text: text.to_string(),
            origin: Origin::Literal,
        }
    }

    fn fragment(name: &str, text: &str, included: bool) -> ResolvedSegment {
        ResolvedSegment {
            text: text.to_string(),
            origin: Origin::Fragment {
                name: name.to_string(),
                included,
            },
        }
    }

    #[test]
    fn test_emit_concatenates_in_order() {
        let descriptor = emit(vec![
            literal("FROM "),
            ResolvedSegment {
                text: "alpine".to_string(),
                origin: Origin::Fixed {
                    name: "base_image".to_string(),
                },
            },
            literal("\n"),
            fragment("examples_copy", "", false),
            fragment("extras", "COPY extras/ ./extras/", true),
        ])
        .unwrap();

        assert_eq!(descriptor.text(), "FROM alpine\nCOPY extras/ ./extras/");
        assert_eq!(descriptor.fixed(), &["base_image".to_string()]);
        assert_eq!(descriptor.included(), &["extras".to_string()]);
        assert_eq!(descriptor.excluded(), &["examples_copy".to_string()]);
    }

    #[test]
    fn test_emit_records_repeated_names_once() {
        let descriptor = emit(vec![
            fragment("a", "x", true),
            fragment("a", "x", true),
        ])
        .unwrap();
        assert_eq!(descriptor.included(), &["a".to_string()]);
    }

    #[test]
    fn test_emit_rejects_surviving_marker() {
        // A literal that still carries a marker means a segment was never resolved.
        let err = emit(vec![literal("FROM "), literal("{base_image}")]).unwrap_err();
        assert_eq!(
            err,
            GenError::EmissionInvariantViolated("{base_image}".to_string())
        );
    }

    #[test]
    fn test_emit_rejects_marker_formed_across_segments() {
        let err = emit(vec![literal("{base"), literal("_image}")]).unwrap_err();
        assert!(matches!(err, GenError::EmissionInvariantViolated(_)));
    }

    #[test]
    fn test_emit_allows_literal_braces() {
        let descriptor = emit(vec![literal("RUN echo '{\"a\": 1}' {}")]).unwrap();
        assert_eq!(descriptor.text(), "RUN echo '{\"a\": 1}' {}");
    }

    #[test]
    fn test_write_to() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("Dockerfile");
        let descriptor = emit(vec![literal("FROM alpine\n")]).unwrap();
        descriptor.write_to(&path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "FROM alpine\n");
    }
}
