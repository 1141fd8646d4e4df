// Manifest: per-request mapping from placeholder name to how it resolves.
//
// The on-disk form is JSON:
//
//     {
//       "schema_version": 1,
//       "placeholders": {
//         "base_image": "python:3.11-slim",
//         "examples_copy": { "when": true, "present": "COPY examples/ ./examples/" }
//       }
//     }
//
// Loading knows nothing about templates. Whether every placeholder a template
// references is covered is decided at resolution time.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use log::{debug, warn};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::error::GenError;
use super::injector::ConditionalFragment;
use super::template::{find_marker, is_identifier, is_identifier_char};

pub const BASE_IMAGE: &str = "base_image";
pub const EXAMPLES_COPY: &str = "examples_copy";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    Fixed,
    Conditional,
}

impl fmt::Display for SpecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecKind::Fixed => f.write_str("a fixed string value"),
            SpecKind::Conditional => f.write_str("a conditional fragment"),
        }
    }
}

/// The placeholders a schema version knows about, and the shape each must
/// take. Keys outside the schema are accepted in either shape.
#[derive(Debug)]
pub struct PlaceholderSchema {
    pub version: u32,
    pub declared: &'static [(&'static str, SpecKind)],
}

pub static SCHEMA_V1: PlaceholderSchema = PlaceholderSchema {
    version: 1,
    declared: &[
        (BASE_IMAGE, SpecKind::Fixed),
        (EXAMPLES_COPY, SpecKind::Conditional),
    ],
};

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

pub fn schema_for(version: u32) -> Option<&'static PlaceholderSchema> {
    match version {
        1 => Some(&SCHEMA_V1),
        _ => None,
    }
}

impl PlaceholderSchema {
    pub fn declared_kind(&self, name: &str) -> Option<SpecKind> {
        self.declared
            .iter()
            .find(|(declared, _)| *declared == name)
            .map(|(_, kind)| *kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionSpec {
    FixedValue(String),
    ConditionalFragment(ConditionalFragment),
}

impl ResolutionSpec {
    pub fn kind(&self) -> SpecKind {
        match self {
            ResolutionSpec::FixedValue(_) => SpecKind::Fixed,
            ResolutionSpec::ConditionalFragment(_) => SpecKind::Conditional,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    schema: &'static PlaceholderSchema,
    entries: BTreeMap<String, ResolutionSpec>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PlaceholderSchema {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for PlaceholderSchema {}

impl Manifest {
    pub fn new() -> Self {
        Self {
            schema: &SCHEMA_V1,
            entries: BTreeMap::new(),
        }
    }

    pub fn schema_version(&self) -> u32 {
        self.schema.version
    }

    pub fn get(&self, name: &str) -> Option<&ResolutionSpec> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: ResolutionSpec) -> Result<(), GenError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(GenError::InvalidManifest(format!(
                "duplicate placeholder key `{}`",
                name
            )));
        }
        if let Some(expected) = self.schema.declared_kind(&name) {
            if expected != spec.kind() {
                return Err(GenError::InvalidManifest(format!(
                    "placeholder `{}` must be {} under schema version {}, got {}",
                    name,
                    expected,
                    self.schema.version,
                    spec.kind()
                )));
            }
        }
        check_no_marker(&name, &spec)?;
        if !is_identifier(&name) {
            warn!(
                "Manifest key `{}` is not a placeholder identifier and can never be referenced",
                name
            );
        }
        self.entries.insert(name, spec);
        Ok(())
    }

    pub fn fixed(mut self, name: impl Into<String>, value: impl Into<String>) -> Result<Self, GenError> {
        self.insert(name, ResolutionSpec::FixedValue(value.into()))?;
        Ok(self)
    }

    pub fn conditional(
        mut self,
        name: impl Into<String>,
        predicate: bool,
        present: impl Into<String>,
        absent: impl Into<String>,
    ) -> Result<Self, GenError> {
        self.insert(
            name,
            ResolutionSpec::ConditionalFragment(ConditionalFragment::new(predicate, present, absent)),
        )?;
        Ok(self)
    }

    pub fn parse(raw: &str) -> Result<Self, GenError> {
        let file: ManifestFile = serde_json::from_str(raw)
            .map_err(|e| GenError::InvalidManifest(e.to_string()))?;

        let version = file.schema_version.unwrap_or(CURRENT_SCHEMA_VERSION);
        let schema = schema_for(version).ok_or_else(|| {
            GenError::InvalidManifest(format!("unsupported schema_version {}", version))
        })?;

        let mut manifest = Self {
            schema,
            entries: BTreeMap::new(),
        };
        for (name, value) in file.placeholders.0 {
            let spec = spec_from_json(&name, value)?;
            manifest.insert(name, spec)?;
        }
        debug!(
            "Parsed manifest with {} entries (schema version {})",
            manifest.len(),
            manifest.schema_version()
        );
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self, GenError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GenError::InvalidManifest(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&raw)
    }
}

// A trailing `{` plus identifier characters, which the text after the value
// could close into a marker.
fn open_tail(text: &str) -> Option<&str> {
    let start = text.rfind('{')?;
    text[start + 1..]
        .chars()
        .all(is_identifier_char)
        .then(|| &text[start..])
}

// A leading identifier plus `}`, which the text before the value could open
// into a marker.
fn open_head(text: &str) -> Option<&str> {
    let end = text.find('}')?;
    is_identifier(&text[..end]).then(|| &text[..=end])
}

// Values must not contain a marker or half of one. With both halves ruled
// out, no concatenation of values and parsed literals can form a marker.
fn check_no_marker(name: &str, spec: &ResolutionSpec) -> Result<(), GenError> {
    let texts: Vec<&str> = match spec {
        ResolutionSpec::FixedValue(v) => vec![v.as_str()],
        ResolutionSpec::ConditionalFragment(f) => vec![f.present.as_str(), f.absent.as_str()],
    };
    for text in texts {
        if let Some(marker) = find_marker(text) {
            return Err(GenError::InvalidManifest(format!(
                "value of `{}` contains the placeholder marker {}",
                name, marker
            )));
        }
        if let Some(tail) = open_tail(text) {
            return Err(GenError::InvalidManifest(format!(
                "value of `{}` ends with `{}`, which opens a placeholder marker",
                name, tail
            )));
        }
        if let Some(head) = open_head(text) {
            return Err(GenError::InvalidManifest(format!(
                "value of `{}` starts with `{}`, which closes a placeholder marker",
                name, head
            )));
        }
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(default)]
    schema_version: Option<u32>,
    placeholders: UniqueEntries,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConditional {
    when: bool,
    present: String,
    #[serde(default)]
    absent: String,
}

fn spec_from_json(name: &str, value: JsonValue) -> Result<ResolutionSpec, GenError> {
    match value {
        JsonValue::String(s) => Ok(ResolutionSpec::FixedValue(s)),
        JsonValue::Object(_) => {
            let raw: RawConditional = serde_json::from_value(value).map_err(|e| {
                GenError::InvalidManifest(format!("placeholder `{}`: {}", name, e))
            })?;
            Ok(ResolutionSpec::ConditionalFragment(ConditionalFragment::new(
                raw.when,
                raw.present,
                raw.absent,
            )))
        }
        other => Err(GenError::InvalidManifest(format!(
            "placeholder `{}` must be a string or a {{\"when\", \"present\", \"absent\"}} object, got {}",
            name, other
        ))),
    }
}

// Placeholder entries in file order, rejecting repeated keys that a plain
// map would silently collapse.
struct UniqueEntries(Vec<(String, JsonValue)>);

impl<'de> Deserialize<'de> for UniqueEntries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = UniqueEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of placeholder names to resolution specs")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut seen = HashSet::new();
                let mut entries = vec![];
                while let Some((key, value)) = map.next_entry::<String, JsonValue>()? {
                    if !seen.insert(key.clone()) {
                        return Err(de::Error::custom(format!(
                            "duplicate placeholder key `{}`",
                            key
                        )));
                    }
                    entries.push((key, value));
                }
                Ok(UniqueEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}
