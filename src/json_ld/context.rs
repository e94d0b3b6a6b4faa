use std::collections::BTreeMap;

use serde_json::{Map, Value as JsonValue, json};

use super::error::{Result, syntax_error};
use super::iri::{is_absolute, is_blank, resolve};
use super::vocab::{self, Term, is_keyword, looks_like_keyword};
use super::{ContextLoader, JsonLdError};

const CONTAINERS: [&str; 7] = ["@graph", "@id", "@index", "@language", "@list", "@set", "@type"];

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TermDefinition {
    /// `None` when the term is explicitly mapped to null.
    pub(crate) iri: Option<Term>,
    pub(crate) prefix: bool,
    pub(crate) reverse: bool,
    pub(crate) type_mapping: Option<String>,
    /// `Some(None)` when the term resets the default language.
    pub(crate) language: Option<Option<String>>,
    pub(crate) container: Vec<String>,
    pub(crate) context: Option<JsonValue>,
}

impl TermDefinition {
    pub(crate) fn has_container(&self, container: &str) -> bool {
        self.container.iter().any(|c| c == container)
    }

    pub(crate) fn iri_str(&self) -> Option<&str> {
        self.iri.as_ref().map(Term::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Context {
    pub(crate) base: Option<String>,
    pub(crate) original_base: Option<String>,
    pub(crate) vocab: Option<Term>,
    pub(crate) language: Option<String>,
    pub(crate) terms: BTreeMap<String, TermDefinition>,
}

impl Context {
    pub(crate) fn new(base: Option<&str>) -> Context {
        let base = base.filter(|base| !base.is_empty()).map(str::to_owned);
        Context {
            original_base: base.clone(),
            base,
            ..Default::default()
        }
    }
    pub(crate) fn insert(&mut self, term: &str, definition: TermDefinition) {
        self.terms.insert(term.to_owned(), definition);
    }
    pub(crate) fn has_term(&self, term: &str) -> bool {
        self.get_term(term).is_some()
    }
    pub(crate) fn get_term(&self, term: &str) -> Option<&TermDefinition> {
        self.terms.get(term)
    }

    /// Applies a local context on top of this active context, following
    /// https://www.w3.org/TR/json-ld11-api/#context-processing-algorithm
    ///
    /// Note - processing is implemented just enough for documents stored in a
    /// quad store: no @import, @protected, @propagate or @direction.
    pub(crate) fn parse(
        &self,
        local_context: &JsonValue,
        loader: &dyn ContextLoader,
    ) -> Result<Context> {
        self.parse_with(local_context, loader, &mut vec![])
    }

    fn parse_with(
        &self,
        local_context: &JsonValue,
        loader: &dyn ContextLoader,
        remote_contexts: &mut Vec<String>,
    ) -> Result<Context> {
        // 4.1.2.4 Normalize context to an array
        let contexts = match local_context {
            JsonValue::Array(contexts) => contexts.as_slice(),
            context => std::slice::from_ref(context),
        };

        let mut result = self.clone();
        for context in contexts {
            match context {
                // 4.1.2.5.1
                JsonValue::Null => {
                    result = Context::new(self.original_base.as_deref());
                }
                // 4.1.2.5.2
                JsonValue::String(remote_context) => {
                    let url = resolve(result.base.as_deref(), remote_context);
                    if remote_contexts.contains(&url) {
                        syntax_error!("recursive context inclusion", "{url} includes itself");
                    }
                    let document = loader.load(&url)?;
                    let Some(remote) = document.get(vocab::CONTEXT.as_str()) else {
                        return Err(JsonLdError::LoadingRemoteContext { url });
                    };
                    remote_contexts.push(url);
                    result = result.parse_with(remote, loader, remote_contexts)?;
                    remote_contexts.pop();
                }
                // 4.1.2.5.4
                JsonValue::Object(definition) => {
                    process_context_definition(definition, &mut result)?;
                }
                // 4.1.2.5.3
                _ => syntax_error!(
                    "invalid local context",
                    "@context must be an object, a string, null, or an array of them."
                ),
            }
        }

        Ok(result)
    }

    /// IRI expansion against this active context (section 5.2 without the
    /// term creation steps).
    pub(crate) fn expand_iri(&self, value: &str, document_relative: bool, vocab: bool) -> Option<Term> {
        // 5.2.2.1
        if is_keyword(value) {
            return Some(Term::new_keyword(value));
        }
        // 5.2.2.2
        if looks_like_keyword(value) {
            return None;
        }
        // 5.2.2.4
        if let Some(definition) = self.get_term(value) {
            if definition.iri.as_ref().is_some_and(Term::is_keyword) {
                return definition.iri.clone();
            }
            // 5.2.2.5
            if vocab {
                return definition.iri.clone();
            }
        }
        // 5.2.2.6
        if let Some((prefix, suffix)) = value.split_once(':') {
            // 5.2.2.6.2
            if prefix == "_" || suffix.starts_with("//") {
                return Some(Term::new_iri(value));
            }
            // 5.2.2.6.4
            if let Some(joined) = self
                .get_term(prefix)
                .and_then(|definition| definition.iri.as_ref())
                .and_then(|iri| iri.join(suffix))
            {
                return Some(joined);
            }
            // 5.2.2.6.5
            if is_absolute(value) {
                return Some(Term::new_iri(value));
            }
        }
        // 5.2.2.7
        if vocab {
            if let Some(joined) = self.vocab.as_ref().and_then(|v| v.join(value)) {
                return Some(joined);
            }
        }
        // 5.2.2.8
        if document_relative {
            return Some(Term::Iri(resolve(self.base.as_deref(), value).into()));
        }
        Some(Term::new_iri(value))
    }

    /// Expanded IRI as a plain string; keywords are returned verbatim.
    pub(crate) fn expand_str(&self, value: &str, document_relative: bool, vocab: bool) -> Option<String> {
        self.expand_iri(value, document_relative, vocab)
            .map(|term| term.as_str().to_owned())
    }

    /// Terms that alias `keyword`.
    pub(crate) fn aliases(&self, keyword: &str) -> impl Iterator<Item = &str> {
        self.terms.iter().filter_map(move |(term, definition)| {
            match &definition.iri {
                Some(Term::Keyword(k)) if k == keyword => Some(term.as_str()),
                _ => None,
            }
        })
    }

    /// Shortest alias of `keyword`, or the keyword itself.
    pub(crate) fn compact_keyword<'a>(&'a self, keyword: &'a str) -> &'a str {
        self.aliases(keyword)
            .min_by(|a, b| a.len().cmp(&b.len()).then(a.cmp(b)))
            .unwrap_or(keyword)
    }
}

fn process_context_definition(context: &Map<String, JsonValue>, result: &mut Context) -> Result<()> {
    let mut defined = BTreeMap::new();

    // 4.1.2.5.5
    match context.get("@version") {
        Some(JsonValue::Number(number)) if number.as_f64() == Some(1.1) => {}
        Some(value) => {
            syntax_error!("invalid @version value", "unsupported @version value {value}.")
        }
        None => {}
    }
    // skip @import

    // 4.1.2.5.7
    match context.get("@base") {
        Some(JsonValue::Null) => {
            result.base = None;
        }
        Some(JsonValue::String(value)) => {
            if is_absolute(value) || result.base.is_none() {
                result.base = Some(value.to_owned());
            } else {
                result.base = Some(resolve(result.base.as_deref(), value));
            }
        }
        Some(_) => syntax_error!(
            "invalid base IRI",
            "the value of \"@base\" in a @context must be a string or null."
        ),
        None => {}
    }
    // 4.1.2.5.8
    match context.get("@vocab") {
        Some(JsonValue::Null) => {
            result.vocab = None;
        }
        Some(JsonValue::String(value)) => {
            if !is_absolute(value) && !is_blank(value) {
                syntax_error!(
                    "invalid vocab mapping",
                    "the value of \"@vocab\" in a @context must be an absolute IRI."
                );
            }
            result.vocab = Some(Term::new_iri(value));
        }
        Some(_) => syntax_error!(
            "invalid vocab mapping",
            "the value of \"@vocab\" in a @context must be a string or null."
        ),
        None => {}
    }
    // 4.1.2.5.9
    match context.get("@language") {
        Some(JsonValue::Null) => {
            result.language = None;
        }
        Some(JsonValue::String(lang)) => {
            result.language = Some(lang.to_owned());
        }
        Some(_) => syntax_error!(
            "invalid default language",
            "the value of \"@language\" in a @context must be a string or null."
        ),
        None => {}
    }
    // skip @direction

    // skip @propagate

    // 4.1.2.5.13
    for (key, value) in context {
        if [
            "@base",
            "@direction",
            "@import",
            "@language",
            "@propagate",
            "@protected",
            "@version",
            "@vocab",
        ]
        .contains(&key.as_str())
        {
            continue;
        }
        create_term_definition(result, context, key, value, &mut defined)?;
    }

    Ok(())
}

fn create_term_definition(
    result: &mut Context,
    context: &Map<String, JsonValue>,
    term: &str,
    value: &JsonValue,
    defined: &mut BTreeMap<String, bool>,
) -> Result<()> {
    // 4.2.2.1
    match defined.get(term) {
        Some(true) => return Ok(()),
        Some(false) => syntax_error!("cyclic IRI mapping", "cyclic IRI mapping for term {term}."),
        _ => {}
    }
    // 4.2.2.2
    if term.is_empty() {
        syntax_error!("invalid term definition", "a term must not be an empty string.");
    }
    defined.insert(term.to_owned(), false);

    // 4.2.2.5
    if is_keyword(term) {
        syntax_error!("keyword redefinition", "{term} cannot be redefined.");
    }
    if looks_like_keyword(term) {
        defined.insert(term.to_owned(), true);
        return Ok(());
    }
    // 4.2.2.6
    result.terms.remove(term);

    let value = match value {
        // 4.2.2.7
        JsonValue::Null => json!({ "@id": null }),
        // 4.2.2.8
        JsonValue::String(string) => json!({ "@id": string }),
        // 4.2.2.9
        JsonValue::Object(_) => value.clone(),
        _ => syntax_error!(
            "invalid term definition",
            "the definition of {term} must be a string, an object or null."
        ),
    };
    let Some(value) = value.as_object() else {
        syntax_error!("invalid term definition", "term definition of {term} is not an object.");
    };

    // 4.2.2.11
    let mut definition = TermDefinition::default();

    // 4.2.2.13
    match value.get("@type") {
        Some(JsonValue::String(type_mapping)) => {
            let expanded = iri_expand(result, type_mapping, false, true, context, defined)?;
            match expanded {
                Some(Term::Keyword(keyword))
                    if ["@id", "@vocab", "@json", "@none"].contains(&keyword.as_ref()) =>
                {
                    definition.type_mapping = Some(keyword.into_owned());
                }
                Some(Term::Iri(iri)) if is_absolute(&iri) => {
                    definition.type_mapping = Some(iri.into_owned());
                }
                _ => syntax_error!("invalid type mapping", "invalid @type for term {term}."),
            }
        }
        Some(_) => syntax_error!("invalid type mapping", "@type of term {term} must be a string."),
        None => {}
    }

    // 4.2.2.14
    if let Some(reverse) = value.get("@reverse") {
        if value.contains_key("@id") {
            syntax_error!("invalid reverse property", "term {term} has both @id and @reverse.");
        }
        let Some(reverse) = reverse.as_str() else {
            syntax_error!("invalid IRI mapping", "@reverse of term {term} must be a string.");
        };
        match iri_expand(result, reverse, false, true, context, defined)? {
            Some(Term::Iri(iri)) if iri.contains(':') => {
                definition.iri = Some(Term::Iri(iri));
            }
            _ => syntax_error!("invalid IRI mapping", "@reverse of term {term} is not an IRI."),
        }
        definition.reverse = true;
    } else {
        match value.get("@id") {
            // 4.2.2.14.1
            Some(JsonValue::Null) => {}
            Some(JsonValue::String(id)) if id != term => {
                // 4.2.2.14.2.2
                if !is_keyword(id) && looks_like_keyword(id) {
                    defined.insert(term.to_owned(), true);
                    return Ok(());
                }
                // 4.2.2.14.2.3
                let iri = iri_expand(result, id, false, true, context, defined)?;
                if iri == Some(vocab::CONTEXT) {
                    syntax_error!("invalid keyword alias", "@context cannot be aliased.");
                }
                let Some(iri) = iri else {
                    syntax_error!("invalid IRI mapping", "@id of term {term} could not be expanded.");
                };
                if !iri.is_keyword() && !iri.as_str().contains(':') {
                    syntax_error!(
                        "invalid IRI mapping",
                        "@id of term {term} does not expand to an absolute IRI."
                    );
                }
                // 4.2.2.14.2.4
                if term.contains(':') || term.contains('/') {
                    // 4.2.2.14.2.4.1
                    defined.insert(term.to_owned(), true);
                    // 4.2.2.14.2.4.2
                    if Some(&iri) != iri_expand(result, term, false, true, context, defined)?.as_ref() {
                        syntax_error!("invalid IRI mapping", "term {term} conflicts with its @id.");
                    }
                // 4.2.2.14.2.5, expanded definitions included; @prefix overrides below
                } else {
                    definition.prefix = [':', '/', '?', '#', '[', ']', '@']
                        .iter()
                        .any(|gen_delim| iri.as_str().ends_with(*gen_delim));
                }
                definition.iri = Some(iri);
            }
            // 4.2.2.14.2.1
            Some(JsonValue::String(_)) | None => {
                // 4.2.2.15
                if let Some((term_prefix, suffix)) = term.split_once(':').filter(|(_, s)| !s.starts_with("//")) {
                    // 4.2.2.15.1
                    if let Some(prefix_value) = context.get(term_prefix) {
                        create_term_definition(result, context, term_prefix, prefix_value, defined)?;
                    }
                    // 4.2.2.15.2
                    definition.iri = match result.get_term(term_prefix).and_then(|d| d.iri.as_ref()) {
                        Some(prefix_iri) => prefix_iri.join(suffix),
                        // 4.2.2.15.3
                        None => Some(Term::new_iri(term)),
                    };
                } else if term.contains(':') {
                    definition.iri = Some(Term::new_iri(term));
                // 4.2.2.16
                } else if term.contains('/') {
                    definition.iri = iri_expand(result, term, false, true, context, defined)?;
                // 4.2.2.17
                } else if term == "@type" {
                    definition.iri = Some(vocab::TYPE);
                // 4.2.2.18
                } else if let Some(joined) = result.vocab.as_ref().and_then(|v| v.join(term)) {
                    definition.iri = Some(joined);
                } else {
                    syntax_error!(
                        "invalid IRI mapping",
                        "relative term {term} requires a vocabulary mapping."
                    );
                }
            }
            Some(_) => syntax_error!("invalid IRI mapping", "@id of term {term} must be a string."),
        }
    }

    // 4.2.2.19
    match value.get("@container") {
        Some(JsonValue::String(container)) => definition.container.push(container.to_owned()),
        Some(JsonValue::Array(containers)) => {
            for container in containers {
                let Some(container) = container.as_str() else {
                    syntax_error!("invalid container mapping", "@container of {term} must be strings.");
                };
                definition.container.push(container.to_owned());
            }
        }
        Some(JsonValue::Null) | None => {}
        Some(_) => syntax_error!("invalid container mapping", "invalid @container for term {term}."),
    }
    if let Some(container) = definition
        .container
        .iter()
        .find(|c| !CONTAINERS.contains(&c.as_str()))
    {
        syntax_error!("invalid container mapping", "unknown container {container} for term {term}.");
    }
    if definition.reverse
        && definition
            .container
            .iter()
            .any(|c| c != "@set" && c != "@index")
    {
        syntax_error!("invalid reverse property", "reverse term {term} cannot be a list.");
    }

    // 4.2.2.21
    if let Some(scoped) = value.get("@context") {
        definition.context = Some(scoped.clone());
    }

    // 4.2.2.22
    match value.get("@language") {
        Some(JsonValue::Null) if !value.contains_key("@type") => definition.language = Some(None),
        Some(JsonValue::String(lang)) if !value.contains_key("@type") => {
            definition.language = Some(Some(lang.to_owned()))
        }
        Some(JsonValue::Null | JsonValue::String(_)) | None => {}
        Some(_) => syntax_error!("invalid language mapping", "@language of {term} must be a string."),
    }

    // skip @direction
    // skip @nest

    // 4.2.2.25
    match value.get("@prefix") {
        Some(JsonValue::Bool(is_prefix)) => {
            definition.prefix = *is_prefix;
            if definition.prefix && definition.iri.as_ref().is_some_and(Term::is_keyword) {
                syntax_error!("invalid term definition", "keyword alias {term} cannot be a prefix.");
            }
        }
        Some(_) => syntax_error!("invalid @prefix value", "@prefix of {term} must be a boolean."),
        None => {}
    }

    for entry in value.keys() {
        if ![
            "@id",
            "@reverse",
            "@container",
            "@context",
            "@direction",
            "@index",
            "@language",
            "@nest",
            "@prefix",
            "@protected",
            "@type",
        ]
        .contains(&entry.as_str())
        {
            syntax_error!("invalid term definition", "unknown entry {entry} in term {term}.");
        }
    }

    result.insert(term, definition);
    defined.insert(term.to_owned(), true);

    Ok(())
}

fn iri_expand(
    active_context: &mut Context,
    value: &str,
    document_relative: bool,
    vocab: bool,
    local_context: &Map<String, JsonValue>,
    defined: &mut BTreeMap<String, bool>,
) -> Result<Option<Term>> {
    // 5.2.2.1
    if is_keyword(value) {
        return Ok(Some(Term::new_keyword(value)));
    }
    if looks_like_keyword(value) {
        return Ok(None);
    }
    // 5.2.2.3
    if let Some(entry_value) = local_context.get(value) {
        if defined.get(value) != Some(&true) {
            create_term_definition(active_context, local_context, value, entry_value, defined)?;
        }
    }
    if value.contains(':') {
        // 5.2.2.6.1
        if let Some((prefix, _)) = value.split_once(':') {
            // 5.2.2.6.3
            if let Some(prefix_value) = local_context.get(prefix) {
                if defined.get(prefix) != Some(&true) {
                    create_term_definition(
                        active_context,
                        local_context,
                        prefix,
                        prefix_value,
                        defined,
                    )?;
                }
            }
        }
    }
    Ok(active_context.expand_iri(value, document_relative, vocab))
}
