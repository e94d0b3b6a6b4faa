//! Compaction algorithm, https://www.w3.org/TR/json-ld11-api/#compaction-algorithm

use std::borrow::Cow;

use serde_json::{Map, Value};

use super::ContextLoader;
use super::context::{Context, TermDefinition};
use super::error::Result;
use super::expand::{force_array, is_value_object};
use super::iri::make_relative;
use super::vocab::is_keyword;

/// Compacts an expanded document. The result is always an object; several
/// top-level nodes end up under `@graph`.
pub(crate) fn compact(active: &Context, loader: &dyn ContextLoader, expanded: &Value) -> Result<Value> {
    let compactor = Compactor { loader };
    Ok(match compactor.compact_element(active, None, expanded)? {
        Value::Array(items) if items.is_empty() => Value::Object(Map::new()),
        Value::Array(items) => {
            let mut result = Map::new();
            result.insert(active.compact_keyword("@graph").to_owned(), Value::Array(items));
            Value::Object(result)
        }
        Value::Null => Value::Object(Map::new()),
        compacted => compacted,
    })
}

/// Adds `@context` to a compacted document unless the context is empty.
pub(crate) fn with_context(compacted: Value, local_context: Option<&Value>) -> Value {
    let Some(local_context) = local_context else {
        return compacted;
    };
    let empty = match local_context {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Null => true,
        _ => false,
    };
    match compacted {
        Value::Object(mut map) if !empty => {
            map.insert("@context".into(), local_context.clone());
            Value::Object(map)
        }
        compacted => compacted,
    }
}

struct Compactor<'a> {
    loader: &'a dyn ContextLoader,
}

impl Compactor<'_> {
    fn compact_element(&self, active: &Context, active_property: Option<&str>, element: &Value) -> Result<Value> {
        match element {
            Value::Array(items) => {
                let mut result = vec![];
                for item in items {
                    match self.compact_element(active, active_property, item)? {
                        Value::Null => {}
                        compacted => result.push(compacted),
                    }
                }
                let keep_array = match active_property {
                    None => false,
                    Some("@graph" | "@list" | "@set") => true,
                    Some(property) => active
                        .get_term(property)
                        .is_some_and(|d| d.has_container("@list") || d.has_container("@set")),
                };
                if result.len() == 1 && !keep_array {
                    return Ok(result.remove(0));
                }
                Ok(Value::Array(result))
            }
            Value::Object(map) => self.compact_object(active, active_property, map, false),
            scalar => Ok(scalar.clone()),
        }
    }

    fn compact_object(
        &self,
        active: &Context,
        active_property: Option<&str>,
        element: &Map<String, Value>,
        inside_reverse: bool,
    ) -> Result<Value> {
        let mut active = match active_property
            .and_then(|p| active.get_term(p))
            .and_then(|d| d.context.as_ref())
        {
            Some(scoped) => Cow::Owned(active.parse(scoped, self.loader)?),
            None => Cow::Borrowed(active),
        };

        // 7 values and node references that compact to a scalar
        let is_reference = element.contains_key("@id")
            && element.keys().all(|k| k == "@id" || k == "@index");
        if element.contains_key("@value") || is_reference {
            if let Some(scalar) = compact_value(&active, active_property, element) {
                return Ok(scalar);
            }
        }

        let container = |c: &str| {
            active_property
                .and_then(|p| active.get_term(p))
                .is_some_and(|d| d.has_container(c))
        };
        let index_container = container("@index");

        // 11 type-scoped contexts
        let mut types: Vec<String> = element
            .get("@type")
            .map(|types| {
                super::expand::as_slice(types)
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|t| compact_iri(&active, t, None, true, false))
                    .collect()
            })
            .unwrap_or_default();
        types.sort_unstable();
        if !element.contains_key("@value") {
            let type_scoping = active.clone().into_owned();
            for t in &types {
                if let Some(scoped) = type_scoping.get_term(t).and_then(|d| d.context.as_ref()) {
                    active = Cow::Owned(active.parse(scoped, self.loader)?);
                }
            }
        }

        let mut result = Map::new();
        for (expanded_property, expanded_value) in element {
            let alias = |keyword: &str| active.compact_keyword(keyword).to_owned();
            match expanded_property.as_str() {
                "@id" => {
                    let id = expanded_value.as_str().unwrap_or_default();
                    result.insert(alias("@id"), Value::String(compact_iri(&active, id, None, false, false)));
                }
                "@type" => {
                    let types: Vec<Value> = super::expand::as_slice(expanded_value)
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|t| Value::String(compact_iri(&active, t, None, true, false)))
                        .collect();
                    let alias = alias("@type");
                    let as_array = expanded_value.is_array()
                        && (types.len() != 1
                            || active.get_term(&alias).is_some_and(|d| d.has_container("@set")));
                    let value = if as_array {
                        Value::Array(types)
                    } else {
                        types.into_iter().next().unwrap_or(Value::Null)
                    };
                    result.insert(alias, value);
                }
                "@reverse" => {
                    let Some(reverse) = expanded_value.as_object() else {
                        continue;
                    };
                    if let Value::Object(mut compacted) =
                        self.compact_object(&active, Some("@reverse"), reverse, true)?
                    {
                        let keys: Vec<String> = compacted.keys().cloned().collect();
                        for key in keys {
                            let Some(definition) = active.get_term(&key).filter(|d| d.reverse) else {
                                continue;
                            };
                            let as_array = definition.has_container("@set");
                            if let Some(value) = compacted.remove(&key) {
                                add_compacted(&mut result, &key, value, as_array);
                            }
                        }
                        if !compacted.is_empty() {
                            result.insert(alias("@reverse"), Value::Object(compacted));
                        }
                    }
                }
                "@preserve" => {
                    let compacted = self.compact_element(&active, active_property, expanded_value)?;
                    if compacted.as_array().is_none_or(|items| !items.is_empty()) {
                        result.insert("@preserve".into(), compacted);
                    }
                }
                "@index" if index_container => {}
                "@index" | "@value" | "@language" => {
                    result.insert(alias(expanded_property), expanded_value.clone());
                }
                "@graph" => {
                    let compacted = self.compact_element(&active, Some("@graph"), expanded_value)?;
                    result.insert(alias("@graph"), force_array(compacted));
                }
                "@list" => {
                    let compacted = self.compact_element(&active, active_property, expanded_value)?;
                    result.insert(alias("@list"), force_array(compacted));
                }
                keyword if keyword.starts_with('@') => {
                    result.insert(keyword.to_owned(), expanded_value.clone());
                }
                property => {
                    self.compact_property(&active, property, expanded_value, inside_reverse, &mut result)?;
                }
            }
        }
        Ok(Value::Object(result))
    }

    fn compact_property(
        &self,
        active: &Context,
        expanded_property: &str,
        expanded_value: &Value,
        inside_reverse: bool,
        result: &mut Map<String, Value>,
    ) -> Result<()> {
        let items = super::expand::as_slice(expanded_value);
        // 12.7
        if items.is_empty() {
            let term = compact_iri(active, expanded_property, None, true, inside_reverse);
            result.entry(term).or_insert_with(|| Value::Array(vec![]));
            return Ok(());
        }
        // 12.8
        for item in items {
            let term = compact_iri(active, expanded_property, Some(item), true, inside_reverse);
            let definition = active.get_term(&term);
            let container = |c: &str| definition.is_some_and(|d| d.has_container(c));
            let as_array = container("@set") || container("@list");

            if let Some(list) = item.get("@list") {
                let compacted = force_array(self.compact_element(active, Some(&term), list)?);
                if container("@list") {
                    result.insert(term, compacted);
                } else {
                    let mut wrapper = Map::new();
                    wrapper.insert(active.compact_keyword("@list").to_owned(), compacted);
                    if let Some(index) = item.get("@index") {
                        wrapper.insert(active.compact_keyword("@index").to_owned(), index.clone());
                    }
                    add_compacted(result, &term, Value::Object(wrapper), as_array);
                }
                continue;
            }

            let compacted = self.compact_element(active, Some(&term), item)?;
            if container("@language") || container("@index") {
                let (key, compacted) = if container("@language") {
                    let key = item.get("@language").and_then(Value::as_str).unwrap_or("@none");
                    let value_alias = active.compact_keyword("@value");
                    let compacted = match compacted {
                        Value::Object(mut map) if map.contains_key(value_alias) => {
                            map.remove(value_alias).unwrap_or_default()
                        }
                        compacted => compacted,
                    };
                    (key, compacted)
                } else {
                    (item.get("@index").and_then(Value::as_str).unwrap_or("@none"), compacted)
                };
                let map_object = result
                    .entry(term.as_str())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(map_object) = map_object {
                    add_compacted(map_object, key, compacted, container("@set"));
                }
                continue;
            }
            add_compacted(result, &term, compacted, as_array);
        }
        Ok(())
    }
}

fn add_compacted(map: &mut Map<String, Value>, key: &str, value: Value, as_array: bool) {
    match map.get_mut(key) {
        None if as_array => {
            map.insert(key.to_owned(), force_array(value));
        }
        None => {
            map.insert(key.to_owned(), value);
        }
        Some(existing) => {
            if !existing.is_array() {
                *existing = Value::Array(vec![existing.take()]);
            }
            if let Value::Array(items) = existing {
                match value {
                    Value::Array(values) => items.extend(values),
                    value => items.push(value),
                }
            }
        }
    }
}

/// Value compaction, https://www.w3.org/TR/json-ld11-api/#value-compaction
///
/// `None` when the value has to stay an object.
fn compact_value(active: &Context, active_property: Option<&str>, value: &Map<String, Value>) -> Option<Value> {
    let definition = active_property.and_then(|p| active.get_term(p));
    let language = match definition.and_then(|d| d.language.clone()) {
        Some(language) => language,
        None => active.language.clone(),
    };
    let type_mapping = definition.and_then(|d| d.type_mapping.as_deref());
    if value.contains_key("@index") && !definition.is_some_and(|d| d.has_container("@index")) {
        return None;
    }

    if let Some(id) = value.get("@id").and_then(Value::as_str) {
        return match type_mapping {
            Some("@id") => Some(Value::String(compact_iri(active, id, None, false, false))),
            Some("@vocab") => Some(Value::String(compact_iri(active, id, None, true, false))),
            _ => None,
        };
    }

    let inner = value.get("@value")?;
    if let Some(datatype) = value.get("@type").and_then(Value::as_str) {
        return (Some(datatype) == type_mapping).then(|| inner.clone());
    }
    if type_mapping.is_some() {
        return None;
    }
    if let Some(tag) = value.get("@language").and_then(Value::as_str) {
        let matches = language
            .as_deref()
            .is_some_and(|language| language.eq_ignore_ascii_case(tag));
        return matches.then(|| inner.clone());
    }
    if !inner.is_string() || language.is_none() {
        return Some(inner.clone());
    }
    None
}

/// IRI compaction, https://www.w3.org/TR/json-ld11-api/#iri-compaction
pub(crate) fn compact_iri(
    active: &Context,
    iri: &str,
    value: Option<&Value>,
    vocab: bool,
    reverse: bool,
) -> String {
    if is_keyword(iri) {
        return active.compact_keyword(iri).to_owned();
    }
    if vocab {
        if let Some(term) = select_term(active, iri, value, reverse) {
            return term;
        }
        // 4.3 vocabulary-relative
        if let Some(vocab_iri) = active.vocab.as_ref().map(|v| v.as_str()) {
            if let Some(suffix) = iri.strip_prefix(vocab_iri) {
                if !suffix.is_empty() && !active.has_term(suffix) {
                    return suffix.to_owned();
                }
            }
        }
    }
    // 4.5 compact IRIs
    let mut best: Option<String> = None;
    for (term, definition) in &active.terms {
        let Some(prefix) = definition.iri.as_ref().filter(|t| !t.is_keyword()).map(|t| t.as_str()) else {
            continue;
        };
        if !definition.prefix || prefix == iri || !iri.starts_with(prefix) {
            continue;
        }
        let candidate = format!("{term}:{}", &iri[prefix.len()..]);
        let usable = match active.get_term(&candidate) {
            None => true,
            Some(existing) => existing.iri_str() == Some(iri) && value.is_none(),
        };
        let shorter = best
            .as_ref()
            .is_none_or(|best| (candidate.len(), &candidate) < (best.len(), best));
        if usable && shorter {
            best = Some(candidate);
        }
    }
    if let Some(best) = best {
        return best;
    }
    if !vocab {
        return make_relative(active.base.as_deref(), iri);
    }
    iri.to_owned()
}

/// Term selection over the terms mapped to `iri`, following the inverse
/// context lookup of the compaction algorithm.
fn select_term(active: &Context, iri: &str, value: Option<&Value>, reverse: bool) -> Option<String> {
    let mut candidates: Vec<(&String, &TermDefinition)> = active
        .terms
        .iter()
        .filter(|(_, d)| d.iri.as_ref().is_some_and(|t| !t.is_keyword() && t.as_str() == iri))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then(a.cmp(b)));

    // a preserved default compacts like its property
    let value = value.filter(|v| v.get("@preserve").is_none());
    let default_language = active.language.as_deref();

    let mut containers: Vec<&str> = vec![];
    let has_index = value.is_some_and(|v| v.get("@index").is_some());
    if has_index {
        containers.extend(["@index", "@index@set"]);
    }
    let (type_language, type_language_value): (&str, String) = if reverse {
        containers.push("@set");
        ("@type", "@reverse".into())
    } else if let Some(list) = value.and_then(|v| v.get("@list")).and_then(Value::as_array) {
        if !has_index {
            containers.push("@list");
        }
        common_list_type(list, default_language)
    } else {
        let selected = match value {
            Some(value) if is_value_object(value) => {
                if let (Some(language), false) = (value.get("@language").and_then(Value::as_str), has_index) {
                    containers.extend(["@language", "@language@set"]);
                    ("@language", language.to_owned())
                } else if let Some(datatype) = value.get("@type").and_then(Value::as_str) {
                    ("@type", datatype.to_owned())
                } else {
                    ("@language", "@null".to_owned())
                }
            }
            _ => {
                containers.extend(["@id", "@id@set", "@type", "@set@type"]);
                ("@type", "@id".to_owned())
            }
        };
        containers.push("@set");
        selected
    };
    containers.push("@none");
    if !has_index {
        containers.extend(["@index", "@index@set"]);
    }
    if value.is_some_and(|v| v.as_object().is_some_and(|m| m.len() == 1) && is_value_object(v)) {
        containers.extend(["@language", "@language@set"]);
    }

    let mut preferred: Vec<String> = vec![];
    if type_language_value == "@reverse" {
        preferred.push("@reverse".into());
    }
    let id = value.and_then(|v| v.get("@id")).and_then(Value::as_str);
    match id {
        Some(id) if type_language_value == "@id" || type_language_value == "@reverse" => {
            let as_vocab = compact_iri(active, id, None, true, false);
            let vocab_first = active.get_term(&as_vocab).and_then(TermDefinition::iri_str) == Some(id);
            let order = if vocab_first {
                ["@vocab", "@id", "@none"]
            } else {
                ["@id", "@vocab", "@none"]
            };
            preferred.extend(order.map(str::to_owned));
        }
        _ => {
            preferred.push(type_language_value);
            preferred.push("@none".into());
        }
    }
    preferred.push("@any".into());

    for container in containers {
        for wanted in &preferred {
            let found = candidates.iter().find(|(_, definition)| {
                container_key(definition) == container
                    && registered(definition, type_language, wanted, default_language)
            });
            if let Some((term, _)) = found {
                return Some((*term).clone());
            }
        }
    }
    None
}

fn common_list_type(list: &[Value], default_language: Option<&str>) -> (&'static str, String) {
    if list.is_empty() {
        return ("@language", default_language.unwrap_or("@none").to_owned());
    }
    let mut common_language: Option<String> = None;
    let mut common_type: Option<String> = None;
    for item in list {
        let (item_language, item_type) = if is_value_object(item) {
            if let Some(language) = item.get("@language").and_then(Value::as_str) {
                (language.to_owned(), "@none".to_owned())
            } else if let Some(datatype) = item.get("@type").and_then(Value::as_str) {
                ("@none".to_owned(), datatype.to_owned())
            } else {
                ("@null".to_owned(), "@none".to_owned())
            }
        } else {
            ("@none".to_owned(), "@id".to_owned())
        };
        match &common_language {
            None => common_language = Some(item_language),
            Some(common) if *common != item_language && is_value_object(item) => {
                common_language = Some("@none".into())
            }
            _ => {}
        }
        match &common_type {
            None => common_type = Some(item_type),
            Some(common) if *common != item_type => common_type = Some("@none".into()),
            _ => {}
        }
    }
    let common_type = common_type.unwrap_or_else(|| "@none".into());
    if common_type != "@none" {
        return ("@type", common_type);
    }
    ("@language", common_language.unwrap_or_else(|| "@none".into()))
}

fn container_key(definition: &TermDefinition) -> String {
    if definition.container.is_empty() {
        return "@none".to_owned();
    }
    let mut containers = definition.container.clone();
    containers.sort_unstable();
    containers.concat()
}

/// Whether the inverse context would list this term under
/// `[type_language][value]`.
fn registered(definition: &TermDefinition, type_language: &str, value: &str, default_language: Option<&str>) -> bool {
    if definition.reverse {
        return type_language == "@type" && value == "@reverse";
    }
    match (&definition.type_mapping, &definition.language) {
        (Some(mapping), _) if mapping == "@none" => value == "@any",
        (Some(mapping), _) => type_language == "@type" && mapping == value,
        (None, Some(language)) => {
            type_language == "@language"
                && language
                    .as_deref()
                    .map_or(value == "@null", |language| language.eq_ignore_ascii_case(value))
        }
        (None, None) => match type_language {
            "@language" => {
                value == "@none" || default_language.is_some_and(|l| l.eq_ignore_ascii_case(value))
            }
            _ => value == "@none",
        },
    }
}
