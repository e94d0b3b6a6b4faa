//! Deserialize JSON-LD to RDF, https://www.w3.org/TR/json-ld11-api/#deserialize-json-ld-to-rdf-algorithm

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::iri::{is_absolute, is_blank};
use super::node_map::{BlankNodeIssuer, DEFAULT_GRAPH, NodeMap};
use super::vocab::{
    RDF_FIRST, RDF_LANG_STRING, RDF_NIL, RDF_REST, RDF_TYPE, XSD_BOOLEAN, XSD_DOUBLE,
    XSD_INTEGER, XSD_STRING,
};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GraphKey {
    Default,
    Named(String),
}

impl GraphKey {
    pub fn name(&self) -> Option<&str> {
        match self {
            GraphKey::Default => None,
            GraphKey::Named(name) => Some(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RdfTerm {
    Iri(String),
    Blank(String),
    Literal {
        value: String,
        datatype: String,
        language: Option<String>,
    },
}

impl RdfTerm {
    pub fn literal(value: impl Into<String>, datatype: &str) -> RdfTerm {
        RdfTerm::Literal {
            value: value.into(),
            datatype: datatype.to_owned(),
            language: None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RdfTerm::Iri(iri) | RdfTerm::Blank(iri) => iri,
            RdfTerm::Literal { value, .. } => value,
        }
    }

    fn node(id: &str) -> Option<RdfTerm> {
        if is_blank(id) {
            Some(RdfTerm::Blank(id.to_owned()))
        } else if is_absolute(id) {
            Some(RdfTerm::Iri(id.to_owned()))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdfTriple {
    pub subject: RdfTerm,
    pub predicate: String,
    pub object: RdfTerm,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RdfDataset {
    pub graphs: BTreeMap<GraphKey, Vec<RdfTriple>>,
}

impl RdfDataset {
    pub fn is_empty(&self) -> bool {
        self.graphs.values().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.graphs.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GraphKey, &RdfTriple)> {
        self.graphs
            .iter()
            .flat_map(|(graph, triples)| triples.iter().map(move |triple| (graph, triple)))
    }
}

pub(crate) fn to_rdf(graphs: &NodeMap, issuer: &mut BlankNodeIssuer) -> RdfDataset {
    let mut dataset = RdfDataset::default();
    for (graph_name, nodes) in graphs {
        let key = if graph_name == DEFAULT_GRAPH {
            GraphKey::Default
        } else if is_absolute(graph_name) || is_blank(graph_name) {
            GraphKey::Named(graph_name.to_owned())
        } else {
            continue;
        };
        let mut triples = vec![];
        for (id, node) in nodes {
            let Some(subject) = RdfTerm::node(id) else {
                continue;
            };
            node_to_rdf(&subject, node, issuer, &mut triples);
        }
        if !triples.is_empty() {
            dataset.graphs.entry(key).or_default().extend(triples);
        }
    }
    dataset
}

fn node_to_rdf(
    subject: &RdfTerm,
    node: &Map<String, Value>,
    issuer: &mut BlankNodeIssuer,
    triples: &mut Vec<RdfTriple>,
) {
    for (property, values) in node {
        let values = values.as_array().map(Vec::as_slice).unwrap_or_default();
        if property == "@type" {
            for t in values.iter().filter_map(Value::as_str) {
                if let Some(object) = RdfTerm::node(t) {
                    triples.push(RdfTriple {
                        subject: subject.clone(),
                        predicate: RDF_TYPE.to_owned(),
                        object,
                    });
                }
            }
            continue;
        }
        // keywords, relative IRIs and blank node predicates are not RDF
        if property.starts_with('@') || is_blank(property) || !is_absolute(property) {
            continue;
        }
        for item in values {
            if let Some(object) = object_to_rdf(item, issuer, triples) {
                triples.push(RdfTriple {
                    subject: subject.clone(),
                    predicate: property.to_owned(),
                    object,
                });
            }
        }
    }
}

fn object_to_rdf(
    item: &Value,
    issuer: &mut BlankNodeIssuer,
    triples: &mut Vec<RdfTriple>,
) -> Option<RdfTerm> {
    if let Some(id) = item.get("@id").and_then(Value::as_str) {
        return RdfTerm::node(id);
    }
    if let Some(list) = item.get("@list").and_then(Value::as_array) {
        return Some(list_to_rdf(list, issuer, triples));
    }
    let value = item.get("@value")?;
    let datatype = item.get("@type").and_then(Value::as_str);
    let language = item.get("@language").and_then(Value::as_str);
    let literal = match value {
        Value::Bool(b) => RdfTerm::literal(b.to_string(), datatype.unwrap_or(XSD_BOOLEAN)),
        Value::Number(number) => {
            let integral = number.is_i64() || number.is_u64();
            let f = number.as_f64().unwrap_or_default();
            let is_double = !integral && (f.fract() != 0.0 || f.abs() >= 1e21);
            if is_double || datatype == Some(XSD_DOUBLE) {
                RdfTerm::literal(canonical_double(f), datatype.unwrap_or(XSD_DOUBLE))
            } else if integral {
                RdfTerm::literal(number.to_string(), datatype.unwrap_or(XSD_INTEGER))
            } else {
                RdfTerm::literal(format!("{f:.0}"), datatype.unwrap_or(XSD_INTEGER))
            }
        }
        Value::String(s) => match language {
            Some(language) => RdfTerm::Literal {
                value: s.to_owned(),
                datatype: RDF_LANG_STRING.to_owned(),
                language: Some(language.to_owned()),
            },
            None => RdfTerm::literal(s.to_owned(), datatype.unwrap_or(XSD_STRING)),
        },
        _ => return None,
    };
    Some(literal)
}

/// `rdf:first`/`rdf:rest` chain for a list; the head is returned.
fn list_to_rdf(list: &[Value], issuer: &mut BlankNodeIssuer, triples: &mut Vec<RdfTriple>) -> RdfTerm {
    let nil = RdfTerm::Iri(RDF_NIL.to_owned());
    if list.is_empty() {
        return nil;
    }
    let head = RdfTerm::Blank(issuer.issue(None));
    let mut subject = head.clone();
    for (i, item) in list.iter().enumerate() {
        if let Some(object) = object_to_rdf(item, issuer, triples) {
            triples.push(RdfTriple {
                subject: subject.clone(),
                predicate: RDF_FIRST.to_owned(),
                object,
            });
        }
        let next = if i + 1 == list.len() {
            nil.clone()
        } else {
            RdfTerm::Blank(issuer.issue(None))
        };
        triples.push(RdfTriple {
            subject,
            predicate: RDF_REST.to_owned(),
            object: next.clone(),
        });
        subject = next;
    }
    head
}

/// XSD canonical double, `5.3E0`.
pub(crate) fn canonical_double(value: f64) -> String {
    let formatted = format!("{value:.15e}");
    let Some((mantissa, exponent)) = formatted.split_once('e') else {
        return formatted;
    };
    let mut mantissa = mantissa.trim_end_matches('0').to_owned();
    if mantissa.ends_with('.') {
        mantissa.push('0');
    }
    format!("{mantissa}E{}", exponent.trim_start_matches('+'))
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;

    use super::*;
    use crate::json_ld::node_map::node_map;

    fn dataset(expanded: Value) -> Result<RdfDataset> {
        let mut issuer = BlankNodeIssuer::default();
        let graphs = node_map(&expanded, &mut issuer)?;
        Ok(to_rdf(&graphs, &mut issuer))
    }

    #[test]
    fn doubles_are_canonical() {
        assert_eq!(canonical_double(5.3), "5.3E0");
        assert_eq!(canonical_double(1.0), "1.0E0");
        assert_eq!(canonical_double(0.25), "2.5E-1");
        assert_eq!(canonical_double(-1234.5), "-1.2345E3");
    }

    #[test]
    fn literals_get_datatypes() -> Result<()> {
        let dataset = dataset(json!([{
            "@id": "http://ex.org/a",
            "http://ex.org/p": [
                { "@value": 42 },
                { "@value": 5.3 },
                { "@value": true },
                { "@value": "hi", "@language": "en" },
                { "@value": "plain" },
                { "@value": "2020-01-01", "@type": "http://www.w3.org/2001/XMLSchema#date" }
            ]
        }]))?;
        let objects: Vec<&RdfTerm> = dataset.iter().map(|(_, t)| &t.object).collect();
        assert_eq!(objects.len(), 6);
        assert!(objects.contains(&&RdfTerm::literal("42", XSD_INTEGER)));
        assert!(objects.contains(&&RdfTerm::literal("5.3E0", XSD_DOUBLE)));
        assert!(objects.contains(&&RdfTerm::literal("true", XSD_BOOLEAN)));
        assert!(objects.contains(&&RdfTerm::literal("plain", XSD_STRING)));
        assert!(objects.contains(&&RdfTerm::Literal {
            value: "hi".into(),
            datatype: RDF_LANG_STRING.into(),
            language: Some("en".into()),
        }));
        Ok(())
    }

    #[test]
    fn lists_become_chains() -> Result<()> {
        let dataset = dataset(json!([{
            "@id": "http://ex.org/a",
            "http://ex.org/list": [{ "@list": [{ "@value": "x" }, { "@value": "y" }] }]
        }]))?;
        let triples = &dataset.graphs[&GraphKey::Default];
        assert_eq!(triples.len(), 5);
        let head = triples
            .iter()
            .find(|t| t.predicate == "http://ex.org/list")
            .map(|t| t.object.clone());
        assert_eq!(head, Some(RdfTerm::Blank("_:b0".into())));
        assert!(triples.iter().any(|t| t.predicate == RDF_REST
            && t.subject == RdfTerm::Blank("_:b1".into())
            && t.object == RdfTerm::Iri(RDF_NIL.into())));
        Ok(())
    }

    #[test]
    fn relative_iris_are_skipped() -> Result<()> {
        let dataset = dataset(json!([
            { "@id": "relative", "http://ex.org/p": [{ "@value": 1 }] },
            { "@id": "http://ex.org/a", "http://ex.org/p": [{ "@id": "relative" }] }
        ]))?;
        assert!(dataset.is_empty());
        Ok(())
    }
}
