// One generation request: template + manifest in, descriptor out.

use std::fmt;

use log::debug;

use super::emitter::{emit, BuildDescriptor};
use super::error::GenError;
use super::injector::inject_all;
use super::manifest::Manifest;
use super::resolver::resolve;
use super::template::TemplateDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Loaded,
    Resolving,
    Injecting,
    Emitted,
    Failed,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Emitted | State::Failed)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Loaded => "loaded",
            State::Resolving => "resolving",
            State::Injecting => "injecting",
            State::Emitted => "emitted",
            State::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub struct Generation<'a> {
    doc: &'a TemplateDocument,
    manifest: &'a Manifest,
    state: State,
    trail: Vec<State>,
}

impl<'a> Generation<'a> {
    pub fn new(doc: &'a TemplateDocument, manifest: &'a Manifest) -> Self {
        Self {
            doc,
            manifest,
            state: State::Loaded,
            trail: vec![State::Loaded],
        }
    }

    fn advance(&mut self, next: State) {
        debug_assert!(
            !self.state.is_terminal(),
            "no transition out of {}",
            self.state
        );
        debug!(
            "Generation for {}: {} -> {}",
            self.doc.source_label(),
            self.state,
            next
        );
        self.state = next;
        self.trail.push(next);
    }

    // Placeholders are bound while Resolving; pending fragments are only
    // settled once the request has moved on to Injecting.
    fn steps(&mut self) -> Result<BuildDescriptor, GenError> {
        self.advance(State::Resolving);
        let bound = resolve(self.doc, self.manifest)?;
        if bound.iter().any(|b| b.is_fragment()) {
            self.advance(State::Injecting);
        }
        emit(inject_all(bound))
    }

    pub fn run(mut self) -> Outcome {
        let result = self.steps();
        match &result {
            Ok(_) => self.advance(State::Emitted),
            Err(e) => {
                debug!("Generation failed: {}", e);
                self.advance(State::Failed);
            }
        }
        Outcome {
            trail: self.trail,
            result,
        }
    }
}

// The result of a request together with every state it passed through.
#[derive(Debug)]
pub struct Outcome {
    pub trail: Vec<State>,
    pub result: Result<BuildDescriptor, GenError>,
}

impl Outcome {
    pub fn final_state(&self) -> State {
        self.trail.last().copied().unwrap_or(State::Loaded)
    }
}

pub fn generate(doc: &TemplateDocument, manifest: &Manifest) -> Result<BuildDescriptor, GenError> {
    let outcome = Generation::new(doc, manifest).run();
    debug!(
        "Generation for {} ended {} after {} states",
        doc.source_label(),
        outcome.final_state(),
        outcome.trail.len()
    );
    outcome.result
}
