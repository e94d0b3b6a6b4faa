//! Conflict-checked writes.
//!
//! `check` runs every quad a document would produce through a policy and
//! returns the quads the policy rejected, together with the document made
//! of the accepted ones. Nothing is written.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use store::{Quad, QuadPattern, QuadStore};
use tracing::{debug, trace};

use crate::blank::BlankNodeMap;
use crate::error::Result;
use crate::graph::{GraphDb, Input};
use crate::json_ld::vocab::RDF_TYPE;
use crate::literal;
use crate::options::Options;
use crate::project::project;

/// What a policy decides for one quad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// Accept only if the store has no quad matching the pattern.
    Pending(QuadPattern),
    Reject,
}

/// Result of [`GraphDb::check`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckOutcome {
    /// Rejected quads in the order they were checked.
    pub conflicts: Vec<Quad>,
    /// The accepted part of the document, compacted with its context.
    /// `None` when the document has no RDF statements.
    pub checked: Option<Value>,
}

impl CheckOutcome {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

pub mod policy {
    use store::{Quad, QuadPattern};

    use super::Verdict;
    use crate::json_ld::vocab::RDF_TYPE;

    pub fn accept_all(_quad: &Quad) -> Verdict {
        Verdict::Accept
    }

    /// A subject may have one value per predicate; `rdf:type` is exempt.
    pub fn unique_subject_predicate(quad: &Quad) -> Verdict {
        if quad.predicate == RDF_TYPE {
            return Verdict::Accept;
        }
        Verdict::Pending(
            QuadPattern::subject(quad.subject.as_str()).with_predicate(quad.predicate.as_str()),
        )
    }
}

/// Accepted statements, graph name to subject to expanded node.
type Accepted = BTreeMap<Option<String>, BTreeMap<String, Map<String, Value>>>;

impl<S: QuadStore> GraphDb<S> {
    pub async fn check<F>(
        &self,
        input: impl Into<Input>,
        options: &Options,
        mut policy: F,
    ) -> Result<CheckOutcome>
    where
        F: FnMut(&Quad) -> Verdict + Send,
    {
        let document = input.into().into_document()?;
        let effective = options.resolve(&self.defaults).with_document_base(&document);
        let processor_options = self.processor_options(effective.base.as_deref());
        let dataset = self.processor.to_rdf(&document, &processor_options)?;
        if dataset.is_empty() {
            return Ok(CheckOutcome::default());
        }

        let mut blanks = BlankNodeMap::new();
        let mut accepted = Accepted::new();
        let mut conflicts = vec![];
        for quad in project(&dataset, &mut blanks) {
            let verdict = policy(&quad);
            trace!(target: "quadld::check", ?quad, ?verdict, "check");
            let accept = match verdict {
                Verdict::Accept => true,
                Verdict::Pending(pattern) => {
                    node(&mut accepted, &quad);
                    self.store.get(pattern).await?.is_empty()
                }
                Verdict::Reject => false,
            };
            if accept {
                add_statement(node(&mut accepted, &quad), &quad)?;
            } else {
                conflicts.push(quad);
            }
        }
        debug!(
            target: "quadld::check",
            conflicts = conflicts.len(),
            subjects = accepted.values().map(BTreeMap::len).sum::<usize>(),
            "checked"
        );

        let context = document.get("@context").cloned().unwrap_or_else(|| json!({}));
        let checked = self
            .processor
            .compact(&assemble(accepted), &context, &processor_options)?;
        Ok(CheckOutcome {
            conflicts,
            checked: Some(checked),
        })
    }

    /// Checks a document and stores its accepted part.
    ///
    /// Not atomic on its own: run it through
    /// [`SerialGraph`](crate::serial::SerialGraph) to exclude other writers.
    pub async fn check_and_put<F>(
        &self,
        input: impl Into<Input>,
        options: &Options,
        policy: F,
    ) -> Result<CheckOutcome>
    where
        F: FnMut(&Quad) -> Verdict + Send,
    {
        let outcome = self.check(input, options, policy).await?;
        if let Some(checked) = &outcome.checked {
            let effective = options.resolve(&self.defaults).with_document_base(checked);
            self.put_document(checked.clone(), &effective).await?;
        }
        Ok(outcome)
    }
}

fn node<'a>(accepted: &'a mut Accepted, quad: &Quad) -> &'a mut Map<String, Value> {
    accepted
        .entry(quad.graph.clone())
        .or_default()
        .entry(quad.subject.clone())
        .or_insert_with(|| {
            let mut node = Map::new();
            node.insert("@id".into(), Value::String(quad.subject.clone()));
            node
        })
}

fn add_statement(node: &mut Map<String, Value>, quad: &Quad) -> Result<()> {
    let (key, value) = if quad.predicate == RDF_TYPE {
        ("@type", Value::String(quad.object.clone()))
    } else {
        (quad.predicate.as_str(), literal::decode(&quad.object)?)
    };
    match node.entry(key).or_insert_with(|| Value::Array(vec![])) {
        Value::Array(values) => values.push(value),
        other => *other = Value::Array(vec![other.take(), value]),
    }
    Ok(())
}

/// Expanded document: default graph nodes at the top, named graphs as
/// nodes holding their `@graph`.
fn assemble(mut accepted: Accepted) -> Value {
    let mut nodes = accepted.remove(&None).unwrap_or_default();
    for (graph, members) in accepted {
        let Some(graph) = graph else { continue };
        let members: Vec<Value> = members.into_values().map(Value::Object).collect();
        nodes
            .entry(graph.clone())
            .or_insert_with(|| {
                let mut node = Map::new();
                node.insert("@id".into(), Value::String(graph));
                node
            })
            .insert("@graph".into(), Value::Array(members));
    }
    Value::Array(nodes.into_values().map(Value::Object).collect())
}
