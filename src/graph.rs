use std::sync::Arc;

use serde_json::Value;
use store::QuadStore;

use crate::error::Result;
use crate::json_ld::{JsonLdProcessor, Processor, ProcessorOptions};
use crate::options::Defaults;

/// JSON-LD documents over a quad store.
///
/// Operations are implemented in [`write`](crate::write),
/// [`check`](crate::check) and [`read`](crate::read).
#[derive(Clone)]
pub struct GraphDb<S> {
    pub(crate) store: S,
    pub(crate) processor: Arc<dyn JsonLdProcessor>,
    pub(crate) defaults: Defaults,
}

impl<S: QuadStore> GraphDb<S> {
    pub fn new(store: S) -> GraphDb<S> {
        GraphDb {
            store,
            processor: Arc::new(Processor::default()),
            defaults: Defaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: Defaults) -> GraphDb<S> {
        self.defaults = defaults;
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn JsonLdProcessor>) -> GraphDb<S> {
        self.processor = processor;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    pub(crate) fn processor_options(&self, base: Option<&str>) -> ProcessorOptions {
        ProcessorOptions::with_base(base)
    }
}

/// A document, or its JSON text.
///
/// For operations that take a target (`cut`, `get`) a string names an IRI.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Document(Value),
    Text(String),
}

impl Input {
    /// The document, parsing text as JSON.
    pub(crate) fn into_document(self) -> Result<Value> {
        match self {
            Input::Document(document) => Ok(document),
            Input::Text(text) => Ok(serde_json::from_str(&text)?),
        }
    }

    /// An IRI target or a document naming one.
    pub(crate) fn into_target(self) -> Result<Target> {
        match self {
            Input::Document(Value::String(iri)) => Ok(Target::Iri(iri)),
            Input::Document(document) => Ok(Target::Document(document)),
            Input::Text(text) if text.trim_start().starts_with('{') => {
                Ok(Target::Document(serde_json::from_str(&text)?))
            }
            Input::Text(iri) => Ok(Target::Iri(iri.trim().to_owned())),
        }
    }
}

pub(crate) enum Target {
    Iri(String),
    Document(Value),
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::Document(value)
    }
}

impl From<&Value> for Input {
    fn from(value: &Value) -> Self {
        Input::Document(value.clone())
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Input::Text(value)
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Input::Text(value.to_owned())
    }
}

/// The `@base` of a document's own context.
pub(crate) fn context_base(document: &Value) -> Option<&str> {
    document
        .get("@context")
        .and_then(|context| context.get("@base"))
        .and_then(Value::as_str)
        .filter(|base| !base.is_empty())
}

/// The keys a document uses for `@id`: the keyword and its aliases.
pub(crate) fn id_keys(document: &Value) -> Vec<String> {
    let mut keys = vec!["@id".to_owned()];
    if let Some(Value::Object(context)) = document.get("@context") {
        for (term, definition) in context {
            let alias = match definition {
                Value::String(iri) => iri == "@id",
                Value::Object(definition) => definition.get("@id") == Some(&Value::from("@id")),
                _ => false,
            };
            if alias {
                keys.push(term.clone());
            }
        }
    }
    keys
}

/// The node identifier a document declares at its root.
pub(crate) fn document_id(document: &Value) -> Option<&str> {
    id_keys(document)
        .iter()
        .find_map(|key| document.get(key.as_str()))
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn targets_from_inputs() -> anyhow::Result<()> {
        assert!(matches!(
            Input::from("http://ex.org/a").into_target()?,
            Target::Iri(iri) if iri == "http://ex.org/a"
        ));
        assert!(matches!(
            Input::from(r#"{"@id": "http://ex.org/a"}"#).into_target()?,
            Target::Document(_)
        ));
        assert!(matches!(
            Input::from(json!("http://ex.org/a")).into_target()?,
            Target::Iri(_)
        ));
        assert!(Input::from("not json").into_document().is_err());
        Ok(())
    }

    #[test]
    fn id_aliases() {
        let document = json!({
            "@context": { "id": "@id", "name": "http://xmlns.com/foaf/0.1/name" },
            "id": "http://ex.org/a"
        });
        assert_eq!(document_id(&document), Some("http://ex.org/a"));
        assert_eq!(document_id(&json!({ "@id": "x" })), Some("x"));
        assert_eq!(document_id(&json!({ "name": "x" })), None);
    }
}
