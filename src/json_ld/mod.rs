//! Just enough JSON-LD
//!
//! Expansion, RDF serialization, compaction and framing over `serde_json`
//! values, behind the [`JsonLdProcessor`] trait so another implementation can
//! be plugged into [`GraphDb`](crate::GraphDb).

use std::sync::Arc;

use serde_json::Value;

mod compact;
mod context;
mod error;
mod expand;
mod frame;
pub mod iri;
mod node_map;
mod rdf;
pub mod vocab;

pub use self::error::{JsonLdError, Result};
pub use self::frame::Embed;
pub use self::rdf::{GraphKey, RdfDataset, RdfTerm, RdfTriple};

use self::context::Context;

#[derive(Debug, Clone, Default)]
pub struct ProcessorOptions {
    /// Base IRI for relative references, overridden by `@base` in a context.
    pub base: Option<String>,
}

impl ProcessorOptions {
    pub fn with_base(base: Option<&str>) -> ProcessorOptions {
        ProcessorOptions {
            base: base.filter(|base| !base.is_empty()).map(str::to_owned),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameOptions {
    pub base: Option<String>,
    /// Default `@embed` for frames that do not set one.
    pub embed: Embed,
    pub explicit: bool,
    pub require_all: bool,
    pub omit_default: bool,
    /// Drop blank node identifiers that appear only once in the output.
    pub prune_blank_node_ids: bool,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            base: None,
            embed: Embed::Once,
            explicit: false,
            require_all: false,
            omit_default: false,
            prune_blank_node_ids: true,
        }
    }
}

/// The JSON-LD algorithms the graph operations depend on.
pub trait JsonLdProcessor: Send + Sync {
    /// Expanded document, always an array of node objects.
    fn expand(&self, document: &Value, options: &ProcessorOptions) -> Result<Value>;

    /// Expanded frame: framing keywords, wildcards and match-none patterns
    /// are kept.
    fn expand_frame(&self, frame: &Value, options: &ProcessorOptions) -> Result<Value>;

    /// RDF dataset of a document.
    fn to_rdf(&self, document: &Value, options: &ProcessorOptions) -> Result<RdfDataset> {
        let expanded = self.expand(document, options)?;
        self.expanded_to_rdf(&expanded)
    }

    /// RDF dataset of a document [`expand`](JsonLdProcessor::expand) already
    /// returned.
    fn expanded_to_rdf(&self, expanded: &Value) -> Result<RdfDataset>;

    fn compact(&self, document: &Value, context: &Value, options: &ProcessorOptions)
    -> Result<Value>;

    /// Frames `document`, compacted with the frame's own `@context`.
    fn frame(&self, document: &Value, frame: &Value, options: &FrameOptions) -> Result<Value>;
}

/// Fetches remote `@context` documents.
pub trait ContextLoader: Send + Sync {
    fn load(&self, url: &str) -> Result<Value>;
}

/// Refuses every remote context.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRemoteContexts;

impl ContextLoader for NoRemoteContexts {
    fn load(&self, url: &str) -> Result<Value> {
        Err(JsonLdError::LoadingRemoteContext {
            url: url.to_owned(),
        })
    }
}

/// Built-in processor.
#[derive(Clone)]
pub struct Processor {
    loader: Arc<dyn ContextLoader>,
}

impl Default for Processor {
    fn default() -> Self {
        Processor::new(Arc::new(NoRemoteContexts))
    }
}

impl Processor {
    pub fn new(loader: Arc<dyn ContextLoader>) -> Processor {
        Processor { loader }
    }

    fn active_context(&self, base: Option<&str>, local_context: Option<&Value>) -> Result<Context> {
        let context = Context::new(base);
        match local_context {
            Some(local_context) => context.parse(local_context, self.loader.as_ref()),
            None => Ok(context),
        }
    }
}

impl JsonLdProcessor for Processor {
    fn expand(&self, document: &Value, options: &ProcessorOptions) -> Result<Value> {
        let context = self.active_context(options.base.as_deref(), None)?;
        expand::expand(&context, document, self.loader.as_ref(), false)
    }

    fn expand_frame(&self, frame: &Value, options: &ProcessorOptions) -> Result<Value> {
        let context = self.active_context(options.base.as_deref(), None)?;
        expand::expand(&context, frame, self.loader.as_ref(), true)
    }

    fn expanded_to_rdf(&self, expanded: &Value) -> Result<RdfDataset> {
        let mut issuer = node_map::BlankNodeIssuer::default();
        let graphs = node_map::node_map(expanded, &mut issuer)?;
        Ok(rdf::to_rdf(&graphs, &mut issuer))
    }

    fn compact(
        &self,
        document: &Value,
        context: &Value,
        options: &ProcessorOptions,
    ) -> Result<Value> {
        let expanded = self.expand(document, options)?;
        let local_context = context_of(context);
        let active = self.active_context(options.base.as_deref(), local_context)?;
        let compacted = compact::compact(&active, self.loader.as_ref(), &expanded)?;
        Ok(compact::with_context(compacted, local_context))
    }

    fn frame(&self, document: &Value, frame: &Value, options: &FrameOptions) -> Result<Value> {
        let processor_options = ProcessorOptions::with_base(options.base.as_deref());
        let expanded = self.expand(document, &processor_options)?;

        let expanded_frame = self.expand_frame(frame, &processor_options)?;

        let framed = frame::frame(&expanded, &expanded_frame, options)?;

        let local_context = frame.get("@context");
        let active = self.active_context(options.base.as_deref(), local_context)?;
        let compacted = compact::compact(&active, self.loader.as_ref(), &framed)?;
        let compacted = frame::cleanup_preserve(compacted);
        Ok(compact::with_context(compacted, local_context))
    }
}

/// A context given as `{"@context": ...}` or as the context itself.
fn context_of(context: &Value) -> Option<&Value> {
    match context {
        Value::Object(map) if map.contains_key("@context") => map.get("@context"),
        Value::Object(map) if map.is_empty() => None,
        Value::Null => None,
        context => Some(context),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;

    use super::*;

    #[test]
    fn compact_round_trips_simple_document() -> Result<()> {
        let processor = Processor::default();
        let context = json!({ "name": "http://xmlns.com/foaf/0.1/name" });
        let document = json!({
            "@context": context,
            "@id": "http://ex.org/p",
            "name": "Ann"
        });
        let expanded = processor.expand(&document, &ProcessorOptions::default())?;
        assert_eq!(
            expanded,
            json!([{
                "@id": "http://ex.org/p",
                "http://xmlns.com/foaf/0.1/name": [{ "@value": "Ann" }]
            }])
        );
        let compacted = processor.compact(&expanded, &context, &ProcessorOptions::default())?;
        assert_eq!(compacted, document);
        Ok(())
    }

    #[test]
    fn empty_document_has_no_triples() -> Result<()> {
        let processor = Processor::default();
        let dataset = processor.to_rdf(&json!({}), &ProcessorOptions::default())?;
        assert!(dataset.is_empty());
        Ok(())
    }
}
