//! Reconstruction of documents from stored quads.
//!
//! A read walks the graph from the root subject guided by the frame: blank
//! node objects are always inlined, IRI objects unless the frame position
//! says `@embed: @never`. The resulting expanded tree is framed and
//! compacted.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value, json};
use store::{Quad, QuadPattern, QuadStore};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::graph::{GraphDb, Input, Target, context_base};
use crate::json_ld::iri::{is_absolute, resolve};
use crate::json_ld::vocab::{RDF_FIRST, RDF_NIL, RDF_REST, RDF_TYPE};
use crate::json_ld::{Embed, FrameOptions};
use crate::literal;
use crate::options::Options;
use crate::term;

type Frame = Map<String, Value>;

/// Keys of a frame that do not constrain what matches it.
const FRAME_FLAGS: [&str; 4] = ["@embed", "@explicit", "@omitDefault", "@requireAll"];

impl<S: QuadStore> GraphDb<S> {
    /// Reconstructs the document rooted at `target`.
    ///
    /// `target` is an IRI, relative ones resolved against the base, or a
    /// frame whose `@id` names the root. The result is compacted with
    /// `context`, or the frame's own `@context` when `context` is `None`.
    /// Returns `None` when nothing is stored about the root.
    pub async fn get(
        &self,
        target: impl Into<Input>,
        context: Option<&Value>,
        options: &Options,
    ) -> Result<Option<Value>> {
        let context = context.map(unwrap_context).filter(|context| !is_empty(context));
        let mut effective = options.resolve(&self.defaults);
        if let Some(base) = context.and_then(|context| context.get("@base")).and_then(Value::as_str) {
            effective.base = Some(base.to_owned()).filter(|base| !base.is_empty());
        }

        let frame = match target.into().into_target()? {
            Target::Iri(iri) => {
                let iri = if is_absolute(&iri) || term::is_blank(&iri) {
                    iri
                } else {
                    resolve(effective.base.as_deref(), &iri)
                };
                let mut frame = Map::new();
                if let Some(context) = context {
                    frame.insert("@context".into(), context.clone());
                }
                frame.insert("@id".into(), Value::String(iri));
                Value::Object(frame)
            }
            Target::Document(frame) => {
                if let Some(base) = context_base(&frame) {
                    effective.base = Some(base.to_owned());
                }
                frame
            }
        };

        let processor_options = self.processor_options(effective.base.as_deref());
        let expanded_frame = self.processor.expand_frame(&frame, &processor_options)?;
        let root = root_id(&expanded_frame).ok_or(Error::MissingId)?;
        let root_frame = expanded_frame
            .as_array()
            .and_then(|frames| frames.first())
            .and_then(Value::as_object);

        let quads = self.fetch(&root, root_frame).await?;
        let Some(tree) = Builder::new(&quads).root(&root, root_frame)? else {
            debug!(target: "quadld::read", %root, "not found");
            return Ok(None);
        };

        let frame_options = FrameOptions {
            base: effective.base.clone(),
            embed: Embed::Always,
            ..Default::default()
        };
        let framed = self
            .processor
            .frame(&Value::Array(vec![tree]), &frame, &frame_options)?;
        let framed = match context {
            Some(context) if frame.get("@context") != Some(context) => {
                self.processor.compact(&framed, context, &processor_options)?
            }
            _ => framed,
        };
        Ok(Some(framed))
    }

    /// Quads of every subject the reconstruction visits, by subject.
    async fn fetch<'f>(
        &self,
        root: &str,
        root_frame: Option<&'f Frame>,
    ) -> Result<HashMap<String, Vec<Quad>>> {
        let mut quads: HashMap<String, Vec<Quad>> = HashMap::new();
        let mut visited = HashSet::new();
        let mut pending = vec![Step::root(root, root_frame)];
        while let Some(step) = pending.pop() {
            if !visited.insert(step.key()) {
                continue;
            }
            if !quads.contains_key(&step.subject) {
                let found = self
                    .store
                    .get(QuadPattern::subject(step.subject.as_str()))
                    .await?;
                trace!(target: "quadld::read", subject = %step.subject, quads = found.len(), "fetch");
                quads.insert(step.subject.clone(), found);
            }
            for quad in quads.get(&step.subject).map(Vec::as_slice).unwrap_or_default() {
                if quad.predicate == RDF_TYPE {
                    continue;
                }
                if let Some(next) = step.follow(&quad.predicate, &quad.object) {
                    pending.push(next);
                }
            }
        }
        debug!(target: "quadld::read", subjects = quads.len(), "fetched");
        Ok(quads)
    }
}

/// A subject to visit and the frame position it is visited at.
struct Step<'f> {
    subject: String,
    frame: Option<&'f Frame>,
    /// Space separated predicates leading to `frame`. `None` outside the
    /// frame.
    position: Option<String>,
    /// Below a position that only emits a reference: follow constrained
    /// positions only.
    stubbed: bool,
}

impl<'f> Step<'f> {
    fn root(subject: &str, frame: Option<&'f Frame>) -> Step<'f> {
        Step {
            subject: subject.to_owned(),
            frame,
            position: frame.map(|_| String::new()),
            stubbed: false,
        }
    }

    fn key(&self) -> (String, Option<String>, bool) {
        (self.subject.clone(), self.position.clone(), self.stubbed)
    }

    /// The step for `object` reached through `predicate`, if it is visited.
    fn follow(&self, predicate: &str, object: &str) -> Option<Step<'f>> {
        let frame = child_frame(self.frame, predicate);
        if self.stubbed && frame.is_none() {
            return None;
        }
        let never = frame.is_some_and(|frame| {
            matches!(frame.get("@embed").map(Embed::from_frame_value), Some(Ok(Embed::Never)))
        });
        let visit = if term::is_blank(object) {
            true
        } else if term::is_iri(object) && object != RDF_NIL {
            !never || frame.is_some_and(has_constraints)
        } else {
            false
        };
        visit.then(|| Step {
            subject: object.to_owned(),
            frame,
            position: frame.map(|_| self.child_position(predicate)),
            stubbed: self.stubbed || never,
        })
    }

    /// Predicates from the root frame down to the frame reached through
    /// `predicate`. List cells stay at the position of their property.
    fn child_position(&self, predicate: &str) -> String {
        let position = self.position.as_deref().unwrap_or_default();
        match predicate {
            RDF_REST => position.to_owned(),
            RDF_FIRST => format!("{position} @list"),
            predicate => format!("{position} {predicate}"),
        }
    }
}

/// Frame of the node reached through `predicate`.
///
/// List nodes keep the frame of the property holding the list; list items
/// get the frame inside its `@list`.
fn child_frame<'f>(frame: Option<&'f Frame>, predicate: &str) -> Option<&'f Frame> {
    let frame = frame?;
    let child = match predicate {
        RDF_REST => return Some(frame),
        RDF_FIRST => frame.get("@list")?,
        predicate => frame.get(predicate)?,
    };
    match child {
        Value::Array(frames) => frames.first()?.as_object(),
        Value::Object(frame) => Some(frame),
        _ => None,
    }
}

fn has_constraints(frame: &Frame) -> bool {
    frame.keys().any(|key| !FRAME_FLAGS.contains(&key.as_str()))
}

/// Turns fetched quads into an expanded tree.
struct Builder<'q> {
    quads: &'q HashMap<String, Vec<Quad>>,
    path: Vec<String>,
}

impl<'q> Builder<'q> {
    fn new(quads: &'q HashMap<String, Vec<Quad>>) -> Builder<'q> {
        Builder {
            quads,
            path: vec![],
        }
    }

    fn root(mut self, root: &str, frame: Option<&Frame>) -> Result<Option<Value>> {
        if self.quads.get(root).is_none_or(Vec::is_empty) {
            return Ok(None);
        }
        self.node(&Step::root(root, frame)).map(Some)
    }

    fn node(&mut self, step: &Step<'_>) -> Result<Value> {
        if self.path.contains(&step.subject) {
            warn!(target: "quadld::read", subject = %step.subject, "cycle, emitting a reference");
            return Ok(json!({ "@id": step.subject }));
        }
        self.path.push(step.subject.clone());

        let mut node = Map::new();
        node.insert("@id".into(), Value::String(step.subject.clone()));
        let quads = self.quads;
        for quad in quads.get(&step.subject).map(Vec::as_slice).unwrap_or_default() {
            let (key, value) = if quad.predicate == RDF_TYPE {
                ("@type", Value::String(quad.object.clone()))
            } else {
                (quad.predicate.as_str(), self.object(step, quad)?)
            };
            if let Value::Array(values) = node.entry(key).or_insert_with(|| json!([])) {
                values.push(value);
            }
        }

        self.path.pop();
        Ok(Value::Object(node))
    }

    fn object(&mut self, step: &Step<'_>, quad: &Quad) -> Result<Value> {
        if quad.object == RDF_NIL {
            return Ok(json!({ "@list": [] }));
        }
        if term::is_literal(&quad.object) {
            return Ok(literal::decode(&quad.object)?);
        }
        let reference = json!({ "@id": quad.object });
        let Some(next) = step.follow(&quad.predicate, &quad.object) else {
            return Ok(reference);
        };
        if self.quads.get(&next.subject).is_none_or(Vec::is_empty) {
            return Ok(reference);
        }
        if term::is_blank(&next.subject) {
            if let Some(items) = self.list(&next)? {
                return Ok(json!({ "@list": items }));
            }
        }
        self.node(&next)
    }

    /// Items of a well formed `rdf:first`/`rdf:rest` chain starting at
    /// `head`.
    fn list(&mut self, head: &Step<'_>) -> Result<Option<Vec<Value>>> {
        let mut items = vec![];
        let mut seen = HashSet::new();
        let mut current = head.subject.clone();
        loop {
            if current == RDF_NIL {
                return Ok(Some(items));
            }
            if !term::is_blank(&current) || !seen.insert(current.clone()) {
                return Ok(None);
            }
            let quads = self.quads;
            let Some(cell) = quads.get(&current) else {
                return Ok(None);
            };
            let (mut first, mut rest) = (None, None);
            for quad in cell {
                match quad.predicate.as_str() {
                    RDF_FIRST if first.is_none() => first = Some(quad),
                    RDF_REST if rest.is_none() => rest = Some(quad),
                    RDF_TYPE => {}
                    _ => {
                        if !items.is_empty() {
                            warn!(target: "quadld::read", node = %current, "malformed list");
                        }
                        return Ok(None);
                    }
                }
            }
            let (Some(first), Some(rest)) = (first, rest) else {
                return Ok(None);
            };
            let cell_step = Step {
                subject: current.clone(),
                frame: head.frame,
                position: head.position.clone(),
                stubbed: head.stubbed,
            };
            items.push(self.object(&cell_step, first)?);
            current = rest.object.clone();
        }
    }
}

/// The subject an expanded frame names at its root.
fn root_id(expanded_frame: &Value) -> Option<String> {
    let frame = expanded_frame.as_array()?.first()?;
    let id = match frame.get("@id")? {
        Value::Array(ids) => ids.first()?,
        id => id,
    };
    id.as_str().map(str::to_owned)
}

/// A context given as `{"@context": ...}` or as the context itself.
fn unwrap_context(context: &Value) -> &Value {
    context.get("@context").unwrap_or(context)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
