//! Node map generation, https://www.w3.org/TR/json-ld11-api/#node-map-generation

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value, json};

use super::error::{Result, syntax_error};
use super::expand::{add_value, as_slice};
use super::iri::is_blank;

pub(crate) const DEFAULT_GRAPH: &str = "@default";

/// Graph name to node id to flattened node object.
pub(crate) type NodeMap = BTreeMap<String, BTreeMap<String, Map<String, Value>>>;

/// Relabels blank nodes `_:b0`, `_:b1`, ... in the order they are met.
#[derive(Debug, Default)]
pub(crate) struct BlankNodeIssuer {
    counter: usize,
    issued: HashMap<String, String>,
}

impl BlankNodeIssuer {
    pub(crate) fn issue(&mut self, existing: Option<&str>) -> String {
        if let Some(existing) = existing {
            if let Some(issued) = self.issued.get(existing) {
                return issued.clone();
            }
        }
        let id = format!("_:b{}", self.counter);
        self.counter += 1;
        if let Some(existing) = existing {
            self.issued.insert(existing.to_owned(), id.clone());
        }
        id
    }
}

/// Where a node object was found.
enum Parent<'a> {
    Top,
    Property { subject: &'a str, property: &'a str },
    Reverse { subject: &'a str, property: &'a str },
}

pub(crate) fn node_map(expanded: &Value, issuer: &mut BlankNodeIssuer) -> Result<NodeMap> {
    let mut graphs = NodeMap::new();
    graphs.insert(DEFAULT_GRAPH.to_owned(), BTreeMap::new());
    let mut generator = Generator {
        graphs: &mut graphs,
        issuer,
    };
    generator.generate(expanded, DEFAULT_GRAPH, &Parent::Top, None)?;
    Ok(graphs)
}

/// All graphs merged into one map, as used by framing.
pub(crate) fn merged_node_map(
    expanded: &Value,
    issuer: &mut BlankNodeIssuer,
) -> Result<BTreeMap<String, Map<String, Value>>> {
    let graphs = node_map(expanded, issuer)?;
    let mut merged: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    for nodes in graphs.into_values() {
        for (id, node) in nodes {
            let merged_node = merged.entry(id.clone()).or_insert_with(|| {
                let mut node = Map::new();
                node.insert("@id".into(), Value::String(id));
                node
            });
            for (property, values) in node {
                if property == "@id" {
                    continue;
                }
                if property.starts_with('@') && property != "@type" {
                    merged_node.insert(property, values);
                    continue;
                }
                merged_node
                    .entry(property.as_str())
                    .or_insert_with(|| Value::Array(vec![]));
                for value in as_slice(&values) {
                    add_unique(merged_node, &property, value.clone());
                }
            }
        }
    }
    Ok(merged)
}

struct Generator<'a> {
    graphs: &'a mut NodeMap,
    issuer: &'a mut BlankNodeIssuer,
}

impl Generator<'_> {
    fn generate(
        &mut self,
        element: &Value,
        graph: &str,
        parent: &Parent<'_>,
        mut list: Option<&mut Vec<Value>>,
    ) -> Result<()> {
        let object = match element {
            Value::Array(items) => {
                for item in items {
                    self.generate(item, graph, parent, list.as_deref_mut())?;
                }
                return Ok(());
            }
            Value::Object(object) => object,
            _ => return Ok(()),
        };

        // 3 value objects
        if object.contains_key("@value") {
            let mut value = object.clone();
            relabel_types(&mut value, self.issuer);
            return self.attach(graph, parent, list, Value::Object(value));
        }

        // 4 list objects
        if let Some(items) = object.get("@list") {
            let mut members = vec![];
            self.generate(items, graph, parent, Some(&mut members))?;
            let mut list_object = Map::new();
            list_object.insert("@list".into(), Value::Array(members));
            return self.attach(graph, parent, list, Value::Object(list_object));
        }

        // 6 node objects
        let id = match object.get("@id") {
            Some(Value::String(id)) if is_blank(id) => self.issuer.issue(Some(id)),
            Some(Value::String(id)) => id.to_owned(),
            Some(_) => syntax_error!("invalid @id value", "the value of @id must be a string."),
            None => self.issuer.issue(None),
        };
        self.node(graph, &id);

        match parent {
            Parent::Top => {}
            Parent::Reverse { subject, property } => {
                let node = self.node(graph, &id);
                add_unique(node, property, json!({ "@id": subject }));
            }
            Parent::Property { .. } => {
                self.attach(graph, parent, list, json!({ "@id": id }))?;
            }
        }

        if let Some(types) = object.get("@type") {
            for t in as_slice(types) {
                let Some(t) = t.as_str() else { continue };
                let t = if is_blank(t) {
                    self.issuer.issue(Some(t))
                } else {
                    t.to_owned()
                };
                add_unique(self.node(graph, &id), "@type", Value::String(t));
            }
        }

        if let Some(index) = object.get("@index") {
            self.node(graph, &id).insert("@index".into(), index.clone());
        }

        if let Some(Value::Object(reverse)) = object.get("@reverse") {
            for (property, values) in reverse {
                let parent = Parent::Reverse {
                    subject: &id,
                    property,
                };
                for value in as_slice(values) {
                    self.generate(value, graph, &parent, None)?;
                }
            }
        }

        if let Some(graph_value) = object.get("@graph") {
            self.graphs.entry(id.clone()).or_default();
            self.generate(graph_value, &id, &Parent::Top, None)?;
        }

        for (property, values) in object {
            if property.starts_with('@') {
                continue;
            }
            let property = if is_blank(property) {
                self.issuer.issue(Some(property))
            } else {
                property.to_owned()
            };
            self.node(graph, &id)
                .entry(property.as_str())
                .or_insert_with(|| Value::Array(vec![]));
            let parent = Parent::Property {
                subject: &id,
                property: &property,
            };
            self.generate(values, graph, &parent, None)?;
        }
        Ok(())
    }

    fn node(&mut self, graph: &str, id: &str) -> &mut Map<String, Value> {
        self.graphs
            .entry(graph.to_owned())
            .or_default()
            .entry(id.to_owned())
            .or_insert_with(|| {
                let mut node = Map::new();
                node.insert("@id".into(), Value::String(id.to_owned()));
                node
            })
    }

    /// Adds a value or reference to the enclosing list or property.
    fn attach(
        &mut self,
        graph: &str,
        parent: &Parent<'_>,
        list: Option<&mut Vec<Value>>,
        value: Value,
    ) -> Result<()> {
        if let Some(list) = list {
            list.push(value);
            return Ok(());
        }
        if let Parent::Property { subject, property } = parent {
            let node = self.node(graph, subject);
            if value.get("@list").is_some() {
                add_value(node, property, value);
            } else {
                add_unique(node, property, value);
            }
        }
        Ok(())
    }
}

fn relabel_types(value: &mut Map<String, Value>, issuer: &mut BlankNodeIssuer) {
    if let Some(Value::String(t)) = value.get_mut("@type") {
        if is_blank(t) {
            *t = issuer.issue(Some(t));
        }
    }
}

pub(crate) fn add_unique(node: &mut Map<String, Value>, property: &str, value: Value) {
    let exists = node
        .get(property)
        .is_some_and(|values| as_slice(values).contains(&value));
    if !exists {
        add_value(node, property, value);
    }
}
