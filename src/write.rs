//! Write engine: put, post, del and cut.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use store::{QuadPattern, QuadStore};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::blank::BlankNodeMap;
use crate::error::{Error, Result};
use crate::graph::{GraphDb, Input, Target, document_id, id_keys};
use crate::json_ld::iri::{is_absolute, resolve};
use crate::json_ld::FrameOptions;
use crate::options::{Effective, Options};
use crate::project::{project, project_deletable};
use crate::term;

impl<S: QuadStore> GraphDb<S> {
    /// Stores a document and returns it.
    ///
    /// Returns `None` when the document has no RDF statements. With
    /// `blank_ids` the returned document names its blank nodes with the
    /// identifiers they were stored under.
    pub async fn put(&self, input: impl Into<Input>, options: &Options) -> Result<Option<Value>> {
        let document = input.into().into_document()?;
        let effective = options.resolve(&self.defaults).with_document_base(&document);
        self.put_document(document, &effective).await
    }

    /// Stores a document after giving its root node a fresh `@id` when it
    /// has none.
    pub async fn post(&self, input: impl Into<Input>, options: &Options) -> Result<Option<Value>> {
        let mut document = input.into().into_document()?;
        let effective = options.resolve(&self.defaults).with_document_base(&document);
        mint_ids(&mut document, effective.base.as_deref());
        self.put_document(document, &effective).await
    }

    pub(crate) async fn put_document(
        &self,
        document: Value,
        effective: &Effective,
    ) -> Result<Option<Value>> {
        let processor_options = self.processor_options(effective.base.as_deref());
        let expanded = self.processor.expand(&document, &processor_options)?;
        let dataset = self.processor.expanded_to_rdf(&expanded)?;
        if dataset.is_empty() {
            debug!(target: "quadld::write", "nothing to write");
            return Ok(None);
        }

        if effective.overwrite {
            for root in root_subjects(&expanded) {
                debug!(target: "quadld::write", %root, "overwrite");
                self.cut_walk(root, effective.recurse).await?;
            }
        }

        let mut blanks = BlankNodeMap::new();
        let quads = project(&dataset, &mut blanks);
        debug!(
            target: "quadld::write",
            quads = quads.len(),
            blanks = blanks.len(),
            sync = effective.sync,
            "put"
        );
        if effective.sync {
            self.store.put(quads).await?;
        } else {
            let mut writer = self.store.put_stream().await?;
            for quad in quads {
                trace!(target: "quadld::write", ?quad, "stream");
                writer.write(quad).await?;
            }
            writer.close().await?;
        }

        if effective.blank_ids && !blanks.is_empty() {
            return Ok(Some(self.reframe_with_blank_ids(document, &blanks, effective)));
        }
        Ok(Some(document))
    }

    /// The document framed by itself with store blank node identifiers
    /// in place of the processor labels. Falls back to `document`.
    fn reframe_with_blank_ids(
        &self,
        document: Value,
        blanks: &BlankNodeMap,
        effective: &Effective,
    ) -> Value {
        let frame = framify(&document);
        let options = FrameOptions {
            base: effective.base.clone(),
            prune_blank_node_ids: false,
            ..Default::default()
        };
        let framed = match self.processor.frame(&document, &frame, &options) {
            Ok(framed) => framed,
            Err(error) => {
                warn!(target: "quadld::write", %error, "unable to reframe document");
                return document;
            }
        };
        let labels: HashMap<&str, &str> = blanks.iter().collect();
        let Value::Object(mut framed) = relabel(framed, &labels) else {
            return document;
        };
        match framed.get("@graph").and_then(Value::as_array).map(Vec::len) {
            Some(1) => {
                let Some(Value::Array(mut nodes)) = framed.remove("@graph") else {
                    return document;
                };
                let mut single = Map::new();
                if let Some(context) = framed.remove("@context") {
                    single.insert("@context".into(), context);
                }
                if let Some(Value::Object(node)) = nodes.pop() {
                    single.extend(node);
                }
                Value::Object(single)
            }
            Some(0) => document,
            Some(_) => Value::Object(framed),
            None if framed.keys().any(|key| key != "@context") => Value::Object(framed),
            None => document,
        }
    }

    /// Deletes the statements of a document.
    ///
    /// Blank nodes in the document cannot name stored nodes, so statements
    /// about them are left alone. With `cut` the document's root subject is
    /// cut instead.
    pub async fn del(&self, input: impl Into<Input>, options: &Options) -> Result<()> {
        let effective = options.resolve(&self.defaults);
        let document = match input.into() {
            Input::Text(text) => match serde_json::from_str::<Value>(&text) {
                Ok(document) => document,
                Err(_) if effective.cut => return self.cut(Input::Text(text), options).await,
                Err(_) if term::is_iri(text.trim()) => return Err(Error::UnsupportedIri(text)),
                Err(err) => return Err(err.into()),
            },
            Input::Document(Value::String(iri)) if !effective.cut => {
                return Err(Error::UnsupportedIri(iri));
            }
            Input::Document(document) => document,
        };
        if effective.cut {
            return self.cut(document, options).await;
        }

        let effective = effective.with_document_base(&document);
        let processor_options = self.processor_options(effective.base.as_deref());
        let dataset = self.processor.to_rdf(&document, &processor_options)?;
        let quads = project_deletable(&dataset);
        debug!(target: "quadld::write", quads = quads.len(), "delete");
        if quads.is_empty() {
            return Ok(());
        }
        self.store.del(quads).await?;
        Ok(())
    }

    /// Deletes everything reachable from a subject through blank nodes, and
    /// through IRIs too with `recurse`.
    ///
    /// The target is an IRI or a document with an `@id`; a document without
    /// one is ignored.
    pub async fn cut(&self, target: impl Into<Input>, options: &Options) -> Result<()> {
        let effective = options.resolve(&self.defaults);
        let (iri, base) = match target.into().into_target()? {
            Target::Iri(iri) => (iri, effective.base.clone()),
            Target::Document(document) => {
                let effective = effective.clone().with_document_base(&document);
                match document_id(&document) {
                    Some(iri) => (iri.to_owned(), effective.base),
                    None => {
                        debug!(target: "quadld::write", "cut target has no @id");
                        return Ok(());
                    }
                }
            }
        };
        let iri = if is_absolute(&iri) || term::is_blank(&iri) {
            iri
        } else {
            resolve(base.as_deref(), &iri)
        };
        self.cut_walk(iri, effective.recurse).await
    }

    async fn cut_walk(&self, root: String, recurse: bool) -> Result<()> {
        let mut writer = self.store.del_stream().await?;
        let mut visited = HashSet::new();
        let mut pending = vec![root];
        while let Some(subject) = pending.pop() {
            if !visited.insert(subject.clone()) {
                continue;
            }
            for quad in self.store.get(QuadPattern::subject(subject)).await? {
                if term::is_blank(&quad.object) || (recurse && term::is_iri(&quad.object)) {
                    pending.push(quad.object.clone());
                }
                trace!(target: "quadld::write", ?quad, "cut");
                writer.write(quad).await?;
            }
        }
        let deleted = writer.close().await?;
        debug!(target: "quadld::write", deleted, subjects = visited.len(), "cut");
        Ok(())
    }
}

/// IRIs of the top level nodes of an expanded document.
fn root_subjects(expanded: &Value) -> Vec<String> {
    expanded
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(|node| node.get("@id").and_then(Value::as_str))
        .filter(|id| is_absolute(id) && !term::is_blank(id))
        .map(str::to_owned)
        .collect()
}

/// Gives the root nodes without an identifier a fresh one.
fn mint_ids(document: &mut Value, base: Option<&str>) {
    let keys = id_keys(document);
    let mint = || match base {
        Some(base) => format!("{base}{}", Uuid::now_v7()),
        None => format!("urn:uuid:{}", Uuid::now_v7()),
    };
    let needs_id = |node: &Map<String, Value>| !keys.iter().any(|key| node.contains_key(key));
    let Value::Object(root) = document else {
        return;
    };
    match root.get_mut("@graph") {
        Some(Value::Array(nodes)) => {
            for node in nodes.iter_mut().filter_map(Value::as_object_mut) {
                if needs_id(node) {
                    node.insert("@id".into(), Value::String(mint()));
                }
            }
        }
        Some(Value::Object(node)) => {
            if needs_id(node) {
                node.insert("@id".into(), Value::String(mint()));
            }
        }
        _ => {
            if needs_id(root) {
                root.insert("@id".into(), Value::String(mint()));
            }
        }
    }
}

/// A frame matching the document: arrays other than `@type` are reduced
/// to their first entry.
fn framify(document: &Value) -> Value {
    match document {
        Value::Object(map) => {
            let framed = map
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        _ if key == "@context" => value.clone(),
                        Value::Array(items) if key != "@type" => {
                            items.first().map(framify).unwrap_or(Value::Null)
                        }
                        value => framify(value),
                    };
                    (key.clone(), value)
                })
                .filter(|(_, value)| !value.is_null())
                .collect();
            Value::Object(framed)
        }
        value => value.clone(),
    }
}

/// Replaces every string equal to a processor blank label with its store id.
fn relabel(value: Value, labels: &HashMap<&str, &str>) -> Value {
    match value {
        Value::String(s) => match labels.get(s.as_str()) {
            Some(id) => Value::String((*id).to_owned()),
            None => Value::String(s),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(|v| relabel(v, labels)).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, relabel(value, labels)))
                .collect(),
        ),
        value => value,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::Result;
    use serde_json::{Value, json};
    use store::{GraphSelector, QuadPattern, QuadStore};
    use tempfile::tempdir;

    use crate::json_ld::vocab::RDF_TYPE;
    use crate::json_ld::{
        FrameOptions, JsonLdProcessor, Processor, ProcessorOptions, RdfDataset,
        Result as JsonLdResult,
    };
    use crate::testing::{manu, open_db, tesla, without};
    use crate::{Error, Options};

    const FOAF_NAME: &str = "http://xmlns.com/foaf/0.1/name";
    const MANU: &str = "http://manu.sporny.org#person";

    #[tokio::test]
    async fn put_stores_triples() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        let echo = db.put(manu(), &Options::default()).await?;
        assert_eq!(echo, Some(manu()));

        let name = db
            .store()
            .get(QuadPattern::subject(MANU).with_predicate(FOAF_NAME))
            .await?;
        assert_eq!(name.len(), 1);
        assert_eq!(name[0].object, "\"Manu Sporny\"");
        assert_eq!(db.store().get(QuadPattern::subject(MANU)).await?.len(), 2);
        Ok(())
    }

    /// Counts `expand` calls made through the trait.
    #[derive(Default)]
    struct CountingProcessor {
        inner: Processor,
        expansions: AtomicUsize,
    }

    impl JsonLdProcessor for CountingProcessor {
        fn expand(&self, document: &Value, options: &ProcessorOptions) -> JsonLdResult<Value> {
            self.expansions.fetch_add(1, Ordering::SeqCst);
            self.inner.expand(document, options)
        }

        fn expand_frame(&self, frame: &Value, options: &ProcessorOptions) -> JsonLdResult<Value> {
            self.inner.expand_frame(frame, options)
        }

        fn expanded_to_rdf(&self, expanded: &Value) -> JsonLdResult<RdfDataset> {
            self.inner.expanded_to_rdf(expanded)
        }

        fn compact(
            &self,
            document: &Value,
            context: &Value,
            options: &ProcessorOptions,
        ) -> JsonLdResult<Value> {
            self.inner.compact(document, context, options)
        }

        fn frame(&self, document: &Value, frame: &Value, options: &FrameOptions) -> JsonLdResult<Value> {
            self.inner.frame(document, frame, options)
        }
    }

    #[tokio::test]
    async fn put_expands_once() -> Result<()> {
        let dir = tempdir()?;
        let processor = Arc::new(CountingProcessor::default());
        let db = open_db(dir.path())?.with_processor(processor.clone());
        db.put(manu(), &Options::default()).await?;
        assert_eq!(processor.expansions.load(Ordering::SeqCst), 1);
        assert_eq!(db.store().get(QuadPattern::subject(MANU)).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn put_accepts_json_text() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        db.put(manu().to_string(), &Options::default()).await?;
        assert_eq!(db.store().get(QuadPattern::subject(MANU)).await?.len(), 2);

        let err = db.put("{ not json", &Options::default()).await.unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn streaming_put() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        db.put(tesla(), &Options::default().sync(false)).await?;
        let offering = db
            .store()
            .get(
                QuadPattern::subject("http://example.org/cars/for-sale#tesla")
                    .with_predicate(RDF_TYPE)
                    .with_object("http://purl.org/goodrelations/v1#Offering"),
            )
            .await?;
        assert_eq!(offering.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn relative_id_uses_base() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        let mut doc = manu();
        doc["@id"] = json!("42");
        db.put(doc, &Options::default().base("http://levelgraph.org/tests/"))
            .await?;
        let quads = db
            .store()
            .get(QuadPattern::subject("http://levelgraph.org/tests/42").with_predicate(FOAF_NAME))
            .await?;
        assert_eq!(quads.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn empty_document_writes_nothing() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        let echo = db
            .put(json!({ "@context": manu()["@context"] }), &Options::default())
            .await?;
        assert_eq!(echo, None);
        assert!(db.store().get(QuadPattern::default()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn blank_nodes_get_store_ids() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        let doc = without(manu(), "@id");
        db.put(doc.clone(), &Options::default()).await?;
        db.put(doc, &Options::default()).await?;

        let named = db
            .store()
            .get(QuadPattern::default().with_predicate(FOAF_NAME))
            .await?;
        assert_eq!(named.len(), 2);
        assert!(named.iter().all(|quad| quad.subject.starts_with("_:")));
        assert_ne!(named[0].subject, named[1].subject);
        Ok(())
    }

    #[tokio::test]
    async fn blank_ids_are_returned() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        let echo = db
            .put(tesla(), &Options::default().blank_ids(true))
            .await?
            .unwrap_or_default();
        let price = echo["gr:hasPriceSpecification"]["@id"].as_str().unwrap_or_default();
        let includes = echo["gr:includes"]["@id"].as_str().unwrap_or_default();
        assert!(price.starts_with("_:") && !price.starts_with("_:b"));
        assert!(includes.starts_with("_:") && !includes.starts_with("_:b"));

        let stored = db
            .store()
            .get(QuadPattern::subject(price).with_predicate("http://purl.org/goodrelations/v1#hasCurrency"))
            .await?;
        assert_eq!(stored.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn post_mints_an_id() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        let doc = without(manu(), "@id");
        let echo = db
            .post(doc, &Options::default().base("http://levelgraph.org/tests/"))
            .await?
            .unwrap_or_default();
        let id = echo["@id"].as_str().unwrap_or_default();
        assert!(id.starts_with("http://levelgraph.org/tests/"));
        assert_eq!(db.store().get(QuadPattern::subject(id)).await?.len(), 2);

        let kept = db.post(manu(), &Options::default()).await?.unwrap_or_default();
        assert_eq!(kept["@id"], MANU);
        Ok(())
    }

    #[tokio::test]
    async fn put_adds_to_existing_properties() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        db.put(manu(), &Options::default()).await?;
        let mut update = manu();
        update["name"] = json!("Manu");
        db.put(update, &Options::default()).await?;
        let names = db
            .store()
            .get(QuadPattern::subject(MANU).with_predicate(FOAF_NAME))
            .await?;
        assert_eq!(names.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn overwrite_replaces_subject() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        db.put(manu(), &Options::default()).await?;
        let mut update = manu();
        update["name"] = json!("Manu");
        let mut update = without(update, "homepage");
        db.put(update.clone(), &Options::default().overwrite(true)).await?;
        let quads = db.store().get(QuadPattern::subject(MANU)).await?;
        assert_eq!(quads.len(), 1);
        assert_eq!(quads[0].object, "\"Manu\"");

        update["name"] = json!("Manu S.");
        db.put(update, &Options::default().overwrite(true).preserve(true))
            .await?;
        assert_eq!(db.store().get(QuadPattern::subject(MANU)).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn del_removes_listed_statements() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        db.put(manu(), &Options::default()).await?;
        db.del(without(manu(), "homepage"), &Options::default()).await?;
        let quads = db.store().get(QuadPattern::subject(MANU)).await?;
        assert_eq!(quads.len(), 1);
        assert_eq!(quads[0].object, "http://manu.sporny.org/");
        Ok(())
    }

    #[tokio::test]
    async fn del_keeps_blank_nodes() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        db.put(tesla(), &Options::default()).await?;
        db.del(tesla(), &Options::default()).await?;
        let left = db.store().get(QuadPattern::default()).await?;
        assert_eq!(left.len(), 8);
        assert!(
            left.iter()
                .all(|quad| quad.subject.starts_with("_:") || quad.object.starts_with("_:"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn del_rejects_bare_iri() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        let err = db.del(MANU, &Options::default()).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedIri(_)));
        assert_eq!(
            err.to_string(),
            "Passing an IRI to del is not supported anymore. Please pass a JSON-LD document."
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cut_follows_blank_nodes() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        db.put(tesla(), &Options::default()).await?;
        db.put(manu(), &Options::default()).await?;
        db.del("http://example.org/cars/for-sale#tesla", &Options::default().cut(true))
            .await?;
        let left = db.store().get(QuadPattern::default()).await?;
        assert_eq!(left.len(), 2);
        assert!(left.iter().all(|quad| quad.subject == MANU));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cut_recurse_follows_iris_and_terminates() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        let ring = json!({
            "@context": { "next": { "@id": "http://ex.org/next", "@type": "@id" } },
            "@graph": [
                { "@id": "http://ex.org/a", "next": "http://ex.org/b" },
                { "@id": "http://ex.org/b", "next": "http://ex.org/a" }
            ]
        });
        db.put(ring.clone(), &Options::default()).await?;
        db.cut(json!({ "@id": "http://ex.org/a" }), &Options::default())
            .await?;
        assert_eq!(db.store().get(QuadPattern::default()).await?.len(), 1);

        db.put(ring, &Options::default()).await?;
        db.cut("http://ex.org/a", &Options::default().recurse(true))
            .await?;
        assert!(db.store().get(QuadPattern::default()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn cut_without_id_is_a_no_op() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        db.put(manu(), &Options::default()).await?;
        db.cut(json!({ "name": "Manu Sporny" }), &Options::default())
            .await?;
        assert_eq!(db.store().get(QuadPattern::default()).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn named_graphs_keep_their_name() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        let doc = json!({
            "@context": { "name": "http://xmlns.com/foaf/0.1/name" },
            "@id": "http://ex.org/graph",
            "@graph": [{ "@id": MANU, "name": "Manu Sporny" }]
        });
        db.put(doc, &Options::default()).await?;
        let in_graph = db
            .store()
            .get(
                QuadPattern::subject(MANU)
                    .in_graph(GraphSelector::Named("http://ex.org/graph".into())),
            )
            .await?;
        assert_eq!(in_graph.len(), 1);
        let default = db
            .store()
            .get(QuadPattern::subject(MANU).in_graph(GraphSelector::Default))
            .await?;
        assert!(default.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn del_leaves_named_graphs_alone() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        let context = json!({ "name": "http://xmlns.com/foaf/0.1/name" });
        db.put(
            json!({
                "@context": context,
                "@id": "http://ex.org/g",
                "@graph": [{ "@id": "http://ex.org/a", "name": "Ann" }]
            }),
            &Options::default(),
        )
        .await?;
        let plain = json!({ "@context": context, "@id": "http://ex.org/a", "name": "Ann" });
        db.put(plain.clone(), &Options::default()).await?;

        db.del(plain, &Options::default()).await?;
        let left = db.store().get(QuadPattern::subject("http://ex.org/a")).await?;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].graph.as_deref(), Some("http://ex.org/g"));
        assert_eq!(left[0].object, "\"Ann\"");
        Ok(())
    }

    #[test]
    fn framify_keeps_first_entries() {
        let frame = super::framify(&json!({
            "@context": { "a": "http://ex.org/a" },
            "@type": ["x", "y"],
            "a": [{ "b": ["c", "d"] }, { "b": "e" }]
        }));
        assert_eq!(
            frame,
            json!({
                "@context": { "a": "http://ex.org/a" },
                "@type": ["x", "y"],
                "a": { "b": "c" }
            })
        );
    }
}
