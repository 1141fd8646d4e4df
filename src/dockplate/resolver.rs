use log::debug;

use super::error::GenError;
use super::injector::ConditionalFragment;
use super::manifest::{Manifest, ResolutionSpec};
use super::template::{Segment, TemplateDocument};

// Where a piece of resolved text came from, kept for the descriptor's audit
// metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Literal,
    Fixed { name: String },
    Fragment { name: String, included: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSegment {
    pub text: String,
    pub origin: Origin,
}

/// One template segment bound to its manifest entry. Conditional fragments
/// stay pending until the injector picks their text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding<'m> {
    Text(ResolvedSegment),
    Fragment {
        name: String,
        fragment: &'m ConditionalFragment,
    },
}

impl Binding<'_> {
    pub fn is_fragment(&self) -> bool {
        matches!(self, Binding::Fragment { .. })
    }
}

/// Binds every segment of `doc` against `manifest`, in document order.
///
/// Each placeholder occurrence is looked up on its own, so a name used twice
/// yields the same binding twice. A placeholder without a manifest entry fails
/// the whole pass.
pub fn resolve<'m>(doc: &TemplateDocument, manifest: &'m Manifest) -> Result<Vec<Binding<'m>>, GenError> {
    let mut bound = Vec::with_capacity(doc.segments().len());
    for segment in doc.segments() {
        let next = match segment {
            Segment::Literal(text) => Binding::Text(ResolvedSegment {
                text: text.clone(),
                origin: Origin::Literal,
            }),
            Segment::Placeholder(name) => match manifest.get(name) {
                None => {
                    debug!(
                        "No manifest entry for {} among {:?}",
                        name,
                        manifest.names().collect::<Vec<_>>()
                    );
                    return Err(GenError::UnresolvedPlaceholder(name.clone()));
                }
                Some(ResolutionSpec::FixedValue(value)) => Binding::Text(ResolvedSegment {
                    text: value.clone(),
                    origin: Origin::Fixed { name: name.clone() },
                }),
                Some(ResolutionSpec::ConditionalFragment(fragment)) => Binding::Fragment {
                    name: name.clone(),
                    fragment,
                },
            },
        };
        bound.push(next);
    }
    Ok(bound)
}
