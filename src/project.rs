//! Quad projection of RDF datasets.

use store::Quad;

use crate::blank::BlankNodeMap;
use crate::json_ld::{GraphKey, RdfDataset, RdfTerm};
use crate::literal::encode_term;

/// Quads to write for `dataset`, in graph order then triple order.
///
/// Blank nodes are replaced with their store identifiers from `blanks`,
/// named graph triples carry their graph name.
pub fn project(dataset: &RdfDataset, blanks: &mut BlankNodeMap) -> Vec<Quad> {
    let mut quads = Vec::with_capacity(dataset.len());
    for (graph, triple) in dataset.iter() {
        let subject = store_term(&triple.subject, blanks);
        let object = store_term(&triple.object, blanks);
        let mut quad = Quad::new(subject, triple.predicate.clone(), object);
        if let GraphKey::Named(name) = graph {
            let name = if crate::term::is_blank(name) {
                blanks.resolve(name).to_owned()
            } else {
                name.clone()
            };
            quad = quad.in_graph(name);
        }
        quads.push(quad);
    }
    quads
}

/// Quads to delete for `dataset`.
///
/// Only the default graph is considered, and triples whose subject or
/// object is a blank node are skipped: a blank node in a delete document
/// cannot name a stored node.
pub fn project_deletable(dataset: &RdfDataset) -> Vec<Quad> {
    let Some(triples) = dataset.graphs.get(&GraphKey::Default) else {
        return vec![];
    };
    triples
        .iter()
        .filter(|triple| {
            !matches!(triple.subject, RdfTerm::Blank(_))
                && !matches!(triple.object, RdfTerm::Blank(_))
        })
        .map(|triple| {
            Quad::new(
                triple.subject.as_str(),
                triple.predicate.clone(),
                encode_term(&triple.object),
            )
        })
        .collect()
}

fn store_term(term: &RdfTerm, blanks: &mut BlankNodeMap) -> String {
    match term {
        RdfTerm::Blank(label) => blanks.resolve(label).to_owned(),
        term => encode_term(term),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::json_ld::RdfTriple;
    use crate::json_ld::vocab::{XSD_INTEGER, XSD_STRING};

    use super::*;

    fn triple(subject: RdfTerm, predicate: &str, object: RdfTerm) -> RdfTriple {
        RdfTriple {
            subject,
            predicate: predicate.into(),
            object,
        }
    }

    fn dataset() -> RdfDataset {
        let mut graphs = BTreeMap::new();
        graphs.insert(
            GraphKey::Default,
            vec![
                triple(
                    RdfTerm::Iri("http://ex.org/car".into()),
                    "http://ex.org/owner",
                    RdfTerm::Blank("_:b0".into()),
                ),
                triple(
                    RdfTerm::Blank("_:b0".into()),
                    "http://ex.org/name",
                    RdfTerm::literal("Elon", XSD_STRING),
                ),
                triple(
                    RdfTerm::Iri("http://ex.org/car".into()),
                    "http://ex.org/wheels",
                    RdfTerm::literal("4", XSD_INTEGER),
                ),
            ],
        );
        graphs.insert(
            GraphKey::Named("http://ex.org/g".into()),
            vec![triple(
                RdfTerm::Iri("http://ex.org/car".into()),
                "http://ex.org/color",
                RdfTerm::literal("red", XSD_STRING),
            )],
        );
        RdfDataset { graphs }
    }

    #[test]
    fn blank_nodes_share_store_ids() {
        let mut blanks = BlankNodeMap::new();
        let quads = project(&dataset(), &mut blanks);
        assert_eq!(quads.len(), 4);
        assert_eq!(quads[0].object, quads[1].subject);
        assert_eq!(Some(quads[0].object.as_str()), blanks.get("_:b0"));
        assert_ne!(quads[0].object, "_:b0");
        assert_eq!(quads[1].object, "\"Elon\"");
        assert_eq!(
            quads[2].object,
            "\"4\"^^http://www.w3.org/2001/XMLSchema#integer"
        );
        assert_eq!(quads[2].graph, None);
        assert_eq!(quads[3].graph.as_deref(), Some("http://ex.org/g"));
    }

    #[test]
    fn deletable_skips_blank_nodes_and_named_graphs() {
        let quads = project_deletable(&dataset());
        assert_eq!(
            quads,
            vec![Quad::new(
                "http://ex.org/car",
                "http://ex.org/wheels",
                "\"4\"^^http://www.w3.org/2001/XMLSchema#integer"
            )]
        );
    }

    #[test]
    fn empty_dataset_projects_nothing() {
        let mut blanks = BlankNodeMap::new();
        assert!(project(&RdfDataset::default(), &mut blanks).is_empty());
        assert!(blanks.is_empty());
    }
}
