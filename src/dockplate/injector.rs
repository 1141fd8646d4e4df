use log::debug;
use serde::{Deserialize, Serialize};

use super::resolver::{Binding, Origin, ResolvedSegment};

// An optional block of descriptor text. The predicate is decided by whoever
// builds the manifest; injection never looks at the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalFragment {
    pub predicate: bool,
    pub present: String,
    #[serde(default)]
    pub absent: String,
}

impl ConditionalFragment {
    pub fn new(predicate: bool, present: impl Into<String>, absent: impl Into<String>) -> Self {
        Self {
            predicate,
            present: present.into(),
            absent: absent.into(),
        }
    }
}

pub fn inject(fragment: &ConditionalFragment) -> &str {
    if fragment.predicate {
        &fragment.present
    } else {
        &fragment.absent
    }
}

// Settles every pending fragment in a bound template, leaving other segments
// as they are.
pub fn inject_all(bound: Vec<Binding<'_>>) -> Vec<ResolvedSegment> {
    bound
        .into_iter()
        .map(|binding| match binding {
            Binding::Text(segment) => segment,
            Binding::Fragment { name, fragment } => {
                debug!(
                    "Fragment {} is {}",
                    name,
                    if fragment.predicate { "included" } else { "excluded" }
                );
                ResolvedSegment {
                    text: inject(fragment).to_string(),
                    origin: Origin::Fragment {
                        name,
                        included: fragment.predicate,
                    },
                }
            }
        })
        .collect()
}
