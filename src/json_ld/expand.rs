//! Expansion algorithm, https://www.w3.org/TR/json-ld11-api/#expansion-algorithm

use std::borrow::Cow;

use serde_json::{Map, Value, json};

use super::context::Context;
use super::error::{Result, syntax_error};
use super::vocab::{self, Term};
use super::ContextLoader;

const FRAMING_KEYWORDS: [&str; 5] = ["@default", "@embed", "@explicit", "@omitDefault", "@requireAll"];

/// Expands `document` into an array of node objects.
///
/// With `frame_expansion` the framing keywords are kept and empty objects or
/// arrays survive as wildcards and match-none patterns.
pub(crate) fn expand(
    active: &Context,
    document: &Value,
    loader: &dyn ContextLoader,
    frame_expansion: bool,
) -> Result<Value> {
    let expander = Expander {
        loader,
        frame_expansion,
    };
    let expanded = match expander.expand_element(active, None, document)? {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("@graph") => {
            map.remove("@graph").unwrap_or_default()
        }
        expanded => expanded,
    };
    Ok(match expanded {
        Value::Null => Value::Array(vec![]),
        Value::Array(items) => Value::Array(items),
        expanded => Value::Array(vec![expanded]),
    })
}

struct Expander<'a> {
    loader: &'a dyn ContextLoader,
    frame_expansion: bool,
}

impl Expander<'_> {
    fn expand_element(
        &self,
        active: &Context,
        active_property: Option<&str>,
        element: &Value,
    ) -> Result<Value> {
        match element {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => {
                let is_list = active_property
                    .and_then(|property| active.get_term(property))
                    .is_some_and(|definition| definition.has_container("@list"));
                let mut result = vec![];
                for item in items {
                    match self.expand_element(active, active_property, item)? {
                        Value::Array(nested) if is_list => result.push(json!({ "@list": nested })),
                        Value::Array(nested) => result.extend(nested),
                        Value::Null => {}
                        expanded => result.push(expanded),
                    }
                }
                Ok(Value::Array(result))
            }
            Value::Object(map) => self.expand_object(active, active_property, map),
            scalar => match active_property {
                // free-floating values are dropped
                None | Some("@graph") => Ok(Value::Null),
                Some(property) => {
                    let active = self.property_scoped(active, property)?;
                    Ok(expand_value(&active, property, scalar))
                }
            },
        }
    }

    fn property_scoped<'c>(&self, active: &'c Context, property: &str) -> Result<Cow<'c, Context>> {
        match active.get_term(property).and_then(|d| d.context.as_ref()) {
            Some(scoped) => Ok(Cow::Owned(active.parse(scoped, self.loader)?)),
            None => Ok(Cow::Borrowed(active)),
        }
    }

    fn expand_object(
        &self,
        active: &Context,
        active_property: Option<&str>,
        element: &Map<String, Value>,
    ) -> Result<Value> {
        // 8
        let mut active = match active_property {
            Some(property) => self.property_scoped(active, property)?,
            None => Cow::Borrowed(active),
        };
        // 9
        if let Some(local_context) = element.get("@context") {
            active = Cow::Owned(active.parse(local_context, self.loader)?);
        }
        // 11 type-scoped contexts, applied in lexicographical order of types
        let type_scoping = active.clone().into_owned();
        for (key, value) in element {
            if type_scoping.expand_iri(key, false, true) != Some(vocab::TYPE) {
                continue;
            }
            let mut types: Vec<&str> = match value {
                Value::String(t) => vec![t.as_str()],
                Value::Array(ts) => ts.iter().filter_map(Value::as_str).collect(),
                _ => vec![],
            };
            types.sort_unstable();
            for t in types {
                if let Some(scoped) = type_scoping.get_term(t).and_then(|d| d.context.as_ref()) {
                    active = Cow::Owned(active.parse(scoped, self.loader)?);
                }
            }
        }

        let mut result = Map::new();
        // 13
        for (key, value) in element {
            if key == "@context" {
                continue;
            }
            match active.expand_iri(key, false, true) {
                Some(Term::Keyword(keyword)) => {
                    self.expand_keyword(&active, active_property, &keyword, value, &mut result)?;
                }
                // terms that expand to neither an IRI nor a blank node are dropped
                Some(Term::Iri(iri)) if iri.contains(':') => {
                    self.expand_property(&active, key, &iri, value, &mut result)?;
                }
                _ => {}
            }
        }

        self.finish_object(active_property, result)
    }

    fn expand_keyword(
        &self,
        active: &Context,
        active_property: Option<&str>,
        keyword: &str,
        value: &Value,
        result: &mut Map<String, Value>,
    ) -> Result<()> {
        let frame = self.frame_expansion;
        // 13.4.1
        if active_property == Some("@reverse") {
            syntax_error!("invalid reverse property map", "a keyword cannot be used as a reverse property.");
        }
        // 13.4.2
        if result.contains_key(keyword) && keyword != "@type" {
            syntax_error!("colliding keywords", "{keyword} appears more than once in a node.");
        }
        let expanded = match keyword {
            // 13.4.3
            "@id" => match value {
                Value::String(id) => match active.expand_str(id, true, false) {
                    Some(id) => Value::String(id),
                    None => return Ok(()),
                },
                Value::Object(wildcard) if frame && wildcard.is_empty() => json!([{}]),
                Value::Array(ids) if frame && ids.iter().all(Value::is_string) => Value::Array(
                    ids.iter()
                        .filter_map(Value::as_str)
                        .filter_map(|id| active.expand_str(id, true, false))
                        .map(Value::String)
                        .collect(),
                ),
                _ => syntax_error!("invalid @id value", "the value of @id must be a string."),
            },
            // 13.4.4
            "@type" => {
                let expand_type = |t: &str| active.expand_str(t, true, true).map(Value::String);
                match value {
                    Value::String(t) => match expand_type(t) {
                        Some(t) => t,
                        None => return Ok(()),
                    },
                    Value::Array(ts) if ts.iter().all(Value::is_string) => Value::Array(
                        ts.iter()
                            .filter_map(Value::as_str)
                            .filter_map(expand_type)
                            .collect(),
                    ),
                    Value::Object(wildcard) if frame && wildcard.is_empty() => json!({}),
                    Value::Object(default) if frame && default.contains_key("@default") => {
                        value.clone()
                    }
                    _ => syntax_error!(
                        "invalid type value",
                        "the value of @type must be a string or an array of strings."
                    ),
                }
            }
            // 13.4.6
            "@graph" => force_array(self.expand_element(active, Some("@graph"), value)?),
            // 13.4.7
            "@value" => match value {
                Value::Null => Value::Null,
                Value::Object(_) | Value::Array(_) if !frame => syntax_error!(
                    "invalid value object value",
                    "the value of @value must be a scalar or null."
                ),
                value => value.clone(),
            },
            // 13.4.8
            "@language" => match value {
                Value::String(language) => Value::String(language.to_owned()),
                Value::Object(_) | Value::Array(_) if frame => value.clone(),
                _ => syntax_error!(
                    "invalid language-tagged string",
                    "the value of @language must be a string."
                ),
            },
            // 13.4.10
            "@index" => match value {
                Value::String(index) => Value::String(index.to_owned()),
                _ => syntax_error!("invalid @index value", "the value of @index must be a string."),
            },
            // 13.4.11
            "@list" => {
                if matches!(active_property, None | Some("@graph")) {
                    return Ok(());
                }
                force_array(self.expand_element(active, active_property, value)?)
            }
            // 13.4.12
            "@set" => self.expand_element(active, active_property, value)?,
            // 13.4.13
            "@reverse" => {
                if !value.is_object() {
                    syntax_error!("invalid @reverse value", "the value of @reverse must be an object.");
                }
                if let Value::Object(expanded) = self.expand_element(active, Some("@reverse"), value)? {
                    for (property, items) in expanded {
                        if property == "@reverse" {
                            if let Value::Object(forward) = items {
                                for (property, items) in forward {
                                    add_value(result, &property, items);
                                }
                            }
                            continue;
                        }
                        let reverse = result
                            .entry("@reverse")
                            .or_insert_with(|| Value::Object(Map::new()));
                        for item in as_vec(items) {
                            if is_value_object(&item) || is_list_object(&item) {
                                syntax_error!(
                                    "invalid reverse property value",
                                    "a reverse property cannot hold values or lists."
                                );
                            }
                            if let Value::Object(reverse) = reverse {
                                add_value(reverse, &property, item);
                            }
                        }
                    }
                }
                return Ok(());
            }
            keyword if frame && FRAMING_KEYWORDS.contains(&keyword) => value.clone(),
            // @nest, @included and the rest are not supported
            _ => return Ok(()),
        };
        result.insert(keyword.to_owned(), expanded);
        Ok(())
    }

    fn expand_property(
        &self,
        active: &Context,
        key: &str,
        iri: &str,
        value: &Value,
        result: &mut Map<String, Value>,
    ) -> Result<()> {
        let definition = active.get_term(key);
        let has_container = |container: &str| definition.is_some_and(|d| d.has_container(container));

        let expanded = match value {
            // 13.7 language maps
            Value::Object(languages) if has_container("@language") => {
                let mut items = vec![];
                for (language, values) in languages {
                    for item in as_slice(values) {
                        match item {
                            Value::Null => {}
                            Value::String(s) => {
                                let mut item = Map::new();
                                item.insert("@value".into(), Value::String(s.to_owned()));
                                if language != "@none" {
                                    item.insert("@language".into(), Value::String(language.to_owned()));
                                }
                                items.push(Value::Object(item));
                            }
                            _ => syntax_error!(
                                "invalid language map value",
                                "language map values must be strings."
                            ),
                        }
                    }
                }
                Value::Array(items)
            }
            // 13.8 index maps
            Value::Object(indexes) if has_container("@index") => {
                let mut items = vec![];
                for (index, values) in indexes {
                    for mut item in as_vec(self.expand_element(active, Some(key), values)?) {
                        if let Value::Object(item) = &mut item {
                            if index != "@none" && !item.contains_key("@index") {
                                item.insert("@index".into(), Value::String(index.to_owned()));
                            }
                        }
                        items.push(item);
                    }
                }
                Value::Array(items)
            }
            // 13.9
            value => self.expand_element(active, Some(key), value)?,
        };
        // 13.10
        if expanded.is_null() {
            return Ok(());
        }
        // 13.11
        let expanded = if has_container("@list") && !is_list_object(&expanded) {
            json!({ "@list": force_array(expanded) })
        } else {
            expanded
        };
        // 13.13
        if definition.is_some_and(|d| d.reverse) {
            let reverse = result
                .entry("@reverse")
                .or_insert_with(|| Value::Object(Map::new()));
            for item in as_vec(expanded) {
                if is_value_object(&item) || is_list_object(&item) {
                    syntax_error!(
                        "invalid reverse property value",
                        "a reverse property cannot hold values or lists."
                    );
                }
                if let Value::Object(reverse) = reverse {
                    add_value(reverse, iri, item);
                }
            }
        } else {
            add_value(result, iri, expanded);
        }
        Ok(())
    }

    fn finish_object(&self, active_property: Option<&str>, mut result: Map<String, Value>) -> Result<Value> {
        let frame = self.frame_expansion;
        // 15
        if let Some(value) = result.get("@value") {
            if result
                .keys()
                .any(|k| !["@value", "@language", "@type", "@index"].contains(&k.as_str()))
            {
                syntax_error!("invalid value object", "a value object has an unexpected entry.");
            }
            if result.contains_key("@language") && result.contains_key("@type") {
                syntax_error!("invalid value object", "a value object cannot have both @type and @language.");
            }
            if value.is_null() {
                return Ok(Value::Null);
            }
            if !frame && result.contains_key("@language") && !value.is_string() {
                syntax_error!(
                    "invalid language-tagged value",
                    "only strings can be language-tagged."
                );
            }
            if !frame && result.get("@type").is_some_and(|t| !t.is_string()) {
                syntax_error!("invalid typed value", "the @type of a value must be an IRI.");
            }
        // 16
        } else if let Some(types) = result.get_mut("@type") {
            if !types.is_array() {
                *types = Value::Array(vec![types.take()]);
            }
        // 17
        } else if result.contains_key("@set") || result.contains_key("@list") {
            if result.len() > 2 || (result.len() == 2 && !result.contains_key("@index")) {
                syntax_error!("invalid set or list object", "a list or set object has an unexpected entry.");
            }
            if let Some(set) = result.remove("@set") {
                return Ok(set);
            }
        }
        // 18
        if result.len() == 1 && result.contains_key("@language") {
            return Ok(Value::Null);
        }
        // 19
        if matches!(active_property, None | Some("@graph")) && !frame {
            if result.is_empty() || result.contains_key("@value") || result.contains_key("@list") {
                return Ok(Value::Null);
            }
            if result.len() == 1 && result.contains_key("@id") {
                return Ok(Value::Null);
            }
        }
        Ok(Value::Object(result))
    }
}

/// Value expansion, https://www.w3.org/TR/json-ld11-api/#value-expansion
fn expand_value(active: &Context, property: &str, value: &Value) -> Value {
    let definition = active.get_term(property);
    match (definition.and_then(|d| d.type_mapping.as_deref()), value) {
        (Some("@id"), Value::String(id)) => json!({ "@id": active.expand_str(id, true, false) }),
        (Some("@vocab"), Value::String(id)) => json!({ "@id": active.expand_str(id, true, true) }),
        (Some(datatype), _) if !["@id", "@vocab", "@none"].contains(&datatype) => {
            json!({ "@value": value, "@type": datatype })
        }
        (_, Value::String(_)) => {
            let language = match definition.and_then(|d| d.language.clone()) {
                Some(language) => language,
                None => active.language.clone(),
            };
            match language {
                Some(language) => json!({ "@value": value, "@language": language }),
                None => json!({ "@value": value }),
            }
        }
        _ => json!({ "@value": value }),
    }
}

pub(crate) fn is_value_object(value: &Value) -> bool {
    value.get("@value").is_some()
}

pub(crate) fn is_list_object(value: &Value) -> bool {
    value.get("@list").is_some()
}

pub(crate) fn force_array(value: Value) -> Value {
    match value {
        Value::Array(_) => value,
        Value::Null => Value::Array(vec![]),
        value => Value::Array(vec![value]),
    }
}

pub(crate) fn as_vec(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => vec![],
        value => vec![value],
    }
}

pub(crate) fn as_slice(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        value => std::slice::from_ref(value),
    }
}

/// Appends `value` (or each item of it) to the array under `key`.
pub(crate) fn add_value(map: &mut Map<String, Value>, key: &str, value: Value) {
    let entry = map
        .entry(key)
        .or_insert_with(|| Value::Array(vec![]));
    if !entry.is_array() {
        *entry = Value::Array(vec![entry.take()]);
    }
    if let Value::Array(items) = entry {
        match value {
            Value::Array(values) => items.extend(values),
            value => items.push(value),
        }
    }
}
