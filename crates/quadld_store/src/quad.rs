use anyhow::{Context, Result};
use minicbor::{Decode, Encode};
use serde::Serialize;

/// One stored statement.
///
/// A quad without `graph` belongs to the default graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode, Serialize)]
pub struct Quad {
    #[n(0)]
    pub subject: String,
    #[n(1)]
    pub predicate: String,
    #[n(2)]
    pub object: String,
    #[n(3)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<String>,
}

impl Quad {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Quad {
        Quad {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            graph: None,
        }
    }

    pub fn in_graph(mut self, graph: impl Into<String>) -> Quad {
        self.graph = Some(graph.into());
        self
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        minicbor::to_vec(self).context("unable to encode quad")
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Quad> {
        minicbor::decode(bytes).context("unable to decode quad")
    }
}

/// Which graphs a pattern looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GraphSelector {
    /// Every graph, default and named
    #[default]
    Any,
    /// Only the default graph
    Default,
    /// Only the given named graph
    Named(String),
}

impl GraphSelector {
    pub fn matches(&self, graph: Option<&str>) -> bool {
        match self {
            GraphSelector::Any => true,
            GraphSelector::Default => graph.is_none(),
            GraphSelector::Named(name) => graph == Some(name.as_str()),
        }
    }
}

impl From<Option<String>> for GraphSelector {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(name) => GraphSelector::Named(name),
            None => GraphSelector::Default,
        }
    }
}

/// Exact-field match over quads. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuadPattern {
    pub subject: Option<String>,
    pub predicate: Option<String>,
    pub object: Option<String>,
    pub graph: GraphSelector,
}

impl QuadPattern {
    pub fn subject(subject: impl Into<String>) -> QuadPattern {
        QuadPattern {
            subject: Some(subject.into()),
            ..Default::default()
        }
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> QuadPattern {
        self.predicate = Some(predicate.into());
        self
    }

    pub fn with_object(mut self, object: impl Into<String>) -> QuadPattern {
        self.object = Some(object.into());
        self
    }

    pub fn in_graph(mut self, graph: GraphSelector) -> QuadPattern {
        self.graph = graph;
        self
    }

    pub fn matches(&self, quad: &Quad) -> bool {
        fn field(expected: &Option<String>, actual: &str) -> bool {
            expected.as_deref().is_none_or(|expected| expected == actual)
        }
        field(&self.subject, &quad.subject)
            && field(&self.predicate, &quad.predicate)
            && field(&self.object, &quad.object)
            && self.graph.matches(quad.graph.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_without_default_graph() -> Result<()> {
        let quad = Quad::new("http://ex.org/a", "http://ex.org/p", "\"x\"");
        assert_eq!(
            serde_json::to_value(&quad)?,
            json!({ "subject": "http://ex.org/a", "predicate": "http://ex.org/p", "object": "\"x\"" })
        );
        let named = quad.in_graph("http://ex.org/g");
        assert_eq!(serde_json::to_value(&named)?["graph"], "http://ex.org/g");
        Ok(())
    }

    #[test]
    fn pattern_matches_graph_selector() {
        let quad = Quad::new("http://ex.org/a", "http://ex.org/p", "\"x\"");
        let named = quad.clone().in_graph("http://ex.org/g");

        let any = QuadPattern::subject("http://ex.org/a");
        assert!(any.matches(&quad));
        assert!(any.matches(&named));

        let default_only = any.clone().in_graph(GraphSelector::Default);
        assert!(default_only.matches(&quad));
        assert!(!default_only.matches(&named));

        let graph_only = any.in_graph(GraphSelector::Named("http://ex.org/g".into()));
        assert!(!graph_only.matches(&quad));
        assert!(graph_only.matches(&named));
    }

    #[test]
    fn cbor_keeps_graph() -> Result<()> {
        let quad = Quad::new("_:a", "http://ex.org/p", "\"1\"^^http://www.w3.org/2001/XMLSchema#integer")
            .in_graph("http://ex.org/g");
        assert_eq!(quad, Quad::from_bytes(&quad.to_bytes()?)?);
        Ok(())
    }
}
