//! Framing algorithm, https://www.w3.org/TR/json-ld11-framing/#framing-algorithm
//!
//! Frames always match against the merged node map of every graph in the
//! input.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::{Map, Value, json};

use super::FrameOptions;
use super::error::{JsonLdError, Result};
use super::expand::{add_value, as_slice};
use super::iri::is_blank;
use super::node_map::{BlankNodeIssuer, merged_node_map};
use super::vocab::is_keyword;

/// Value of `@embed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Embed {
    /// Embed every match, breaking only circular references.
    #[default]
    Always,
    /// Embed the first match, refer to later ones by `@id`.
    Once,
    /// Only ever refer by `@id`.
    Never,
}

impl Embed {
    pub fn keyword(self) -> &'static str {
        match self {
            Embed::Always => "@always",
            Embed::Once => "@once",
            Embed::Never => "@never",
        }
    }

    /// Reads an `@embed` value from a frame.
    pub fn from_frame_value(value: &Value) -> Result<Embed> {
        match flag_value(value) {
            Value::Bool(true) => Ok(Embed::Once),
            Value::Bool(false) => Ok(Embed::Never),
            Value::String(embed) => match embed.as_str() {
                "@always" => Ok(Embed::Always),
                "@once" | "@first" | "@link" => Ok(Embed::Once),
                "@never" => Ok(Embed::Never),
                other => Err(JsonLdError::InvalidFrame {
                    message: format!("invalid @embed value {other}"),
                }),
            },
            other => Err(JsonLdError::InvalidFrame {
                message: format!("invalid @embed value {other}"),
            }),
        }
    }
}

/// Unwraps `[flag]` and `{"@value": flag}`.
fn flag_value(value: &Value) -> &Value {
    let value = match value {
        Value::Array(items) => items.first().unwrap_or(&Value::Null),
        value => value,
    };
    value.get("@value").unwrap_or(value)
}

#[derive(Debug, Clone, Copy)]
struct Flags {
    embed: Embed,
    explicit: bool,
    require_all: bool,
}

impl Flags {
    fn of(frame: &Map<String, Value>, options: &FrameOptions) -> Result<Flags> {
        let embed = match frame.get("@embed") {
            Some(value) => Embed::from_frame_value(value)?,
            None => options.embed,
        };
        Ok(Flags {
            embed,
            explicit: bool_flag(frame, "@explicit", options.explicit),
            require_all: bool_flag(frame, "@requireAll", options.require_all),
        })
    }

    /// Frame used for properties the frame does not mention.
    fn implicit_frame(self) -> Map<String, Value> {
        let mut frame = Map::new();
        frame.insert("@embed".into(), json!(self.embed.keyword()));
        frame.insert("@explicit".into(), json!(self.explicit));
        frame.insert("@requireAll".into(), json!(self.require_all));
        frame
    }
}

fn bool_flag(frame: &Map<String, Value>, flag: &str, default: bool) -> bool {
    frame
        .get(flag)
        .map(flag_value)
        .and_then(Value::as_bool)
        .unwrap_or(default)
}

/// First object of a frame entry; `[]` and non-objects give `None`.
fn first_frame(value: &Value) -> Option<&Map<String, Value>> {
    as_slice(value).first().and_then(Value::as_object)
}

/// Frames an expanded document with an expanded frame; the result is
/// expanded too, with missing properties as `{"@preserve": ...}` entries.
pub(crate) fn frame(expanded: &Value, expanded_frame: &Value, options: &FrameOptions) -> Result<Value> {
    let frame = match expanded_frame {
        Value::Array(frames) if frames.len() == 1 => frames[0].as_object(),
        Value::Object(frame) => Some(frame),
        _ => None,
    };
    let Some(frame) = frame else {
        return Err(JsonLdError::InvalidFrame {
            message: "a JSON-LD frame must be a single object.".into(),
        });
    };

    let mut issuer = BlankNodeIssuer::default();
    let subjects = merged_node_map(expanded, &mut issuer)?;
    let ids: Vec<String> = subjects.keys().cloned().collect();
    let mut framer = Framer {
        options,
        subjects,
        unique_embeds: HashSet::new(),
        subject_stack: vec![],
    };
    let mut framed = Value::Array(framer.frame_subjects(&ids, frame, false)?);

    if options.prune_blank_node_ids {
        let mut counts = HashMap::new();
        count_blank_ids(&framed, &mut counts);
        let once: HashSet<String> = counts
            .into_iter()
            .filter(|(_, count)| *count == 1)
            .map(|(id, _)| id)
            .collect();
        prune_blank_ids(&mut framed, &once);
    }
    Ok(framed)
}

struct Framer<'a> {
    options: &'a FrameOptions,
    subjects: BTreeMap<String, Map<String, Value>>,
    unique_embeds: HashSet<String>,
    subject_stack: Vec<String>,
}

impl Framer<'_> {
    fn frame_subjects(
        &mut self,
        ids: &[String],
        frame: &Map<String, Value>,
        embedded: bool,
    ) -> Result<Vec<Value>> {
        let flags = Flags::of(frame, self.options)?;
        let mut outputs = vec![];
        for id in ids {
            let Some(subject) = self.subjects.get(id) else {
                continue;
            };
            if !self.filter_subject(subject, frame, flags) {
                continue;
            }
            let subject = subject.clone();

            // each top-level match is framed on its own
            if !embedded {
                self.unique_embeds.clear();
            }
            if embedded && (flags.embed == Embed::Never || self.subject_stack.contains(id)) {
                outputs.push(json!({ "@id": id }));
                continue;
            }
            if embedded && flags.embed == Embed::Once && self.unique_embeds.contains(id) {
                outputs.push(json!({ "@id": id }));
                continue;
            }
            self.unique_embeds.insert(id.clone());
            self.subject_stack.push(id.clone());

            let mut output = Map::new();
            output.insert("@id".into(), Value::String(id.clone()));
            let implicit = flags.implicit_frame();
            for (property, values) in &subject {
                if is_keyword(property) {
                    output.insert(property.clone(), values.clone());
                    continue;
                }
                if flags.explicit && !frame.contains_key(property) {
                    continue;
                }
                let property_frame = frame.get(property).and_then(first_frame);
                let subframe = property_frame.unwrap_or(&implicit);
                for object in as_slice(values) {
                    if let Some(list) = object.get("@list") {
                        let list_frame = property_frame
                            .and_then(|f| f.get("@list"))
                            .and_then(first_frame)
                            .unwrap_or(&implicit);
                        let mut items = vec![];
                        for item in as_slice(list) {
                            match subject_reference(item) {
                                Some(item_id) => {
                                    items.extend(self.frame_subjects(&[item_id.to_owned()], list_frame, true)?)
                                }
                                None => items.push(item.clone()),
                            }
                        }
                        add_value(&mut output, property, json!([{ "@list": items }]));
                    } else if let Some(object_id) = subject_reference(object) {
                        let framed = self.frame_subjects(&[object_id.to_owned()], subframe, true)?;
                        if !framed.is_empty() {
                            add_value(&mut output, property, Value::Array(framed));
                        }
                    } else if value_match(subframe, object) {
                        add_value(&mut output, property, json!([object]));
                    }
                }
            }

            // defaults for properties the node does not have
            for (property, next) in frame {
                if is_keyword(property) {
                    continue;
                }
                let empty = Map::new();
                let next = first_frame(next).unwrap_or(&empty);
                let omit_default = bool_flag(next, "@omitDefault", self.options.omit_default);
                if !omit_default && !output.contains_key(property) {
                    let preserve = match next.get("@default") {
                        Some(Value::Array(default)) => Value::Array(default.clone()),
                        Some(default) => json!([default]),
                        None => json!(["@null"]),
                    };
                    output.insert(property.clone(), json!([{ "@preserve": preserve }]));
                }
            }

            // nodes pointing at this one through a reverse property
            if let Some(Value::Object(reverse)) = frame.get("@reverse") {
                for (reverse_property, subframe) in reverse {
                    let empty = Map::new();
                    let subframe = first_frame(subframe).unwrap_or(&empty);
                    let referencing: Vec<String> = self
                        .subjects
                        .iter()
                        .filter(|(_, node)| {
                            node.get(reverse_property).is_some_and(|values| {
                                as_slice(values)
                                    .iter()
                                    .any(|v| v.get("@id").and_then(Value::as_str) == Some(id))
                            })
                        })
                        .map(|(subject_id, _)| subject_id.clone())
                        .collect();
                    for subject_id in referencing {
                        let framed = self.frame_subjects(&[subject_id], subframe, true)?;
                        if framed.is_empty() {
                            continue;
                        }
                        let reverse_output = output
                            .entry("@reverse")
                            .or_insert_with(|| Value::Object(Map::new()));
                        if let Value::Object(reverse_output) = reverse_output {
                            add_value(reverse_output, reverse_property, Value::Array(framed));
                        }
                    }
                }
            }

            self.subject_stack.pop();
            outputs.push(Value::Object(output));
        }
        Ok(outputs)
    }

    fn filter_subject(&self, subject: &Map<String, Value>, frame: &Map<String, Value>, flags: Flags) -> bool {
        let mut wildcard = true;
        let mut matches_some = false;
        for (key, frame_values) in frame {
            let frame_values = as_slice(frame_values);
            let node_values = subject.get(key).map(as_slice).unwrap_or_default();
            let is_empty = frame_values.is_empty();
            let matched = match key.as_str() {
                "@id" => {
                    let matched = match frame_values.first() {
                        None => false,
                        Some(Value::Object(wildcard)) if wildcard.is_empty() => true,
                        Some(_) => node_values
                            .first()
                            .is_some_and(|id| frame_values.contains(id)),
                    };
                    if !flags.require_all {
                        return matched;
                    }
                    matched
                }
                "@type" => {
                    wildcard = false;
                    if is_empty {
                        if !node_values.is_empty() {
                            return false;
                        }
                        true
                    } else if frame_values.len() == 1 && is_empty_object(&frame_values[0]) {
                        !node_values.is_empty()
                    } else {
                        let matched = frame_values.iter().any(|t| {
                            t.get("@default").is_some() || node_values.contains(t)
                        });
                        if !flags.require_all {
                            return matched;
                        }
                        matched
                    }
                }
                key if is_keyword(key) => continue,
                _ => {
                    wildcard = false;
                    let this_frame = frame_values.first();
                    let has_default = this_frame.is_some_and(|f| f.get("@default").is_some());
                    if node_values.is_empty() && has_default {
                        continue;
                    }
                    if !node_values.is_empty() && is_empty {
                        return false;
                    }
                    match this_frame {
                        None => node_values.is_empty(),
                        Some(this_frame) if this_frame.get("@list").is_some() => {
                            let pattern = this_frame.get("@list").and_then(|l| as_slice(l).first());
                            let node_list = node_values.first().and_then(|v| v.get("@list"));
                            match (pattern, node_list) {
                                (Some(Value::Object(pattern)), Some(node_list)) if pattern.contains_key("@value") => {
                                    as_slice(node_list).iter().any(|item| value_match(pattern, item))
                                }
                                (Some(pattern), Some(node_list)) if pattern.is_object() => {
                                    as_slice(node_list).iter().any(|item| self.node_match(pattern, item, flags))
                                }
                                _ => false,
                            }
                        }
                        Some(Value::Object(pattern)) if pattern.contains_key("@value") => {
                            node_values.iter().any(|v| value_match(pattern, v))
                        }
                        Some(this_frame) if subject_reference(this_frame).is_some() => {
                            node_values.iter().any(|v| self.node_match(this_frame, v, flags))
                        }
                        Some(Value::Object(_)) => !node_values.is_empty(),
                        Some(_) => false,
                    }
                }
            };
            if !matched && flags.require_all {
                return false;
            }
            matches_some = matches_some || matched;
        }
        wildcard || matches_some
    }

    fn node_match(&self, pattern: &Value, value: &Value, flags: Flags) -> bool {
        let (Some(pattern), Some(id)) = (pattern.as_object(), value.get("@id").and_then(Value::as_str)) else {
            return false;
        };
        self.subjects
            .get(id)
            .is_some_and(|node| self.filter_subject(node, pattern, flags))
    }
}

/// The `@id` of an object that has nothing else.
fn subject_reference(value: &Value) -> Option<&str> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get("@id").and_then(Value::as_str)
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(Map::is_empty)
}

/// Value pattern matching, `{}` in a pattern entry is a wildcard.
fn value_match(pattern: &Map<String, Value>, value: &Value) -> bool {
    let entry = |key: &str| pattern.get(key).map(as_slice).unwrap_or_default();
    let (values, types, languages) = (entry("@value"), entry("@type"), entry("@language"));
    if values.is_empty() && types.is_empty() && languages.is_empty() {
        return true;
    }
    let accepts = |patterns: &[Value], actual: Option<&Value>, required: bool| match actual {
        None => !required && patterns.is_empty(),
        Some(actual) => {
            patterns.contains(actual) || patterns.first().is_some_and(is_empty_object)
        }
    };
    accepts(values, value.get("@value"), true)
        && accepts(types, value.get("@type"), false)
        && accepts(languages, value.get("@language"), false)
}

fn count_blank_ids(value: &Value, counts: &mut HashMap<String, usize>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| count_blank_ids(item, counts)),
        Value::Object(map) => {
            for (key, value) in map {
                match (key.as_str(), value) {
                    ("@id", Value::String(id)) if is_blank(id) => *counts.entry(id.clone()).or_default() += 1,
                    _ => count_blank_ids(value, counts),
                }
            }
        }
        _ => {}
    }
}

fn prune_blank_ids(value: &mut Value, once: &HashSet<String>) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(|item| prune_blank_ids(item, once)),
        Value::Object(map) => {
            if map.get("@id").and_then(Value::as_str).is_some_and(|id| once.contains(id)) {
                map.remove("@id");
            }
            map.values_mut().for_each(|value| prune_blank_ids(value, once));
        }
        _ => {}
    }
}

/// Replaces `{"@preserve": v}` with `v` and `"@null"` with `null` in a
/// compacted framing result.
pub(crate) fn cleanup_preserve(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(cleanup_preserve).collect()),
        Value::Object(mut map) => {
            if let Some(preserved) = map.remove("@preserve") {
                return cleanup_preserve(preserved);
            }
            let cleaned = map
                .into_iter()
                .map(|(key, value)| (key, cleanup_preserve(value)))
                .collect();
            Value::Object(cleaned)
        }
        Value::String(s) if s == "@null" => Value::Null,
        value => value,
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;

    use crate::json_ld::{FrameOptions, JsonLdProcessor, Processor};

    use super::Embed;

    fn library() -> serde_json::Value {
        json!({
            "@context": {
                "@vocab": "http://example.org/vocab#",
                "contains": { "@type": "@id" }
            },
            "@graph": [
                { "@id": "http://example.org/library", "@type": "Library", "contains": "http://example.org/book" },
                { "@id": "http://example.org/book", "@type": "Book", "title": "Moby Dick", "contains": "http://example.org/chapter" },
                { "@id": "http://example.org/chapter", "@type": "Chapter", "title": "Loomings" }
            ]
        })
    }

    #[test]
    fn embeds_matches_by_type() -> Result<()> {
        let processor = Processor::default();
        let framed = processor.frame(
            &library(),
            &json!({
                "@context": { "@vocab": "http://example.org/vocab#" },
                "@type": "Library",
                "contains": { "@type": "Book", "contains": { "@type": "Chapter" } }
            }),
            &FrameOptions::default(),
        )?;
        assert_eq!(
            framed,
            json!({
                "@context": { "@vocab": "http://example.org/vocab#" },
                "@id": "http://example.org/library",
                "@type": "Library",
                "contains": {
                    "@id": "http://example.org/book",
                    "@type": "Book",
                    "title": "Moby Dick",
                    "contains": {
                        "@id": "http://example.org/chapter",
                        "@type": "Chapter",
                        "title": "Loomings"
                    }
                }
            })
        );
        Ok(())
    }

    #[test]
    fn never_embed_leaves_reference() -> Result<()> {
        let processor = Processor::default();
        let framed = processor.frame(
            &library(),
            &json!({
                "@context": { "@vocab": "http://example.org/vocab#" },
                "@id": "http://example.org/library",
                "contains": { "@embed": "@never" }
            }),
            &FrameOptions::default(),
        )?;
        assert_eq!(framed["contains"], json!({ "@id": "http://example.org/book" }));
        Ok(())
    }

    #[test]
    fn missing_properties_get_defaults() -> Result<()> {
        let processor = Processor::default();
        let framed = processor.frame(
            &library(),
            &json!({
                "@context": { "@vocab": "http://example.org/vocab#" },
                "@requireAll": true,
                "title": {},
                "author": {}
            }),
            &FrameOptions::default(),
        )?;
        // nothing has both a title and an author
        assert_eq!(framed, json!({ "@context": { "@vocab": "http://example.org/vocab#" } }));

        let framed = processor.frame(
            &library(),
            &json!({
                "@context": { "@vocab": "http://example.org/vocab#" },
                "@type": "Chapter",
                "pages": { "@default": 0 },
                "author": { "@omitDefault": false, "@default": "@null" }
            }),
            &FrameOptions::default(),
        )?;
        assert_eq!(framed["pages"], json!(0));
        assert_eq!(framed["author"], json!(null));
        assert_eq!(framed["title"], json!("Loomings"));
        Ok(())
    }

    #[test]
    fn circular_references_become_stubs() -> Result<()> {
        let processor = Processor::default();
        let framed = processor.frame(
            &json!({
                "@context": { "@vocab": "http://ex.org/", "knows": { "@type": "@id" } },
                "@graph": [
                    { "@id": "http://ex.org/a", "knows": "http://ex.org/b" },
                    { "@id": "http://ex.org/b", "knows": "http://ex.org/a" }
                ]
            }),
            &json!({
                "@context": { "@vocab": "http://ex.org/", "knows": { "@type": "@id" } },
                "@id": "http://ex.org/a",
                "@embed": "@always"
            }),
            &FrameOptions {
                embed: Embed::Always,
                ..Default::default()
            },
        )?;
        assert_eq!(framed["knows"]["@id"], json!("http://ex.org/b"));
        assert_eq!(framed["knows"]["knows"], json!("http://ex.org/a"));
        Ok(())
    }

    #[test]
    fn blank_ids_used_once_are_pruned() -> Result<()> {
        let processor = Processor::default();
        let document = json!({
            "@context": { "@vocab": "http://ex.org/" },
            "@id": "http://ex.org/car",
            "owner": { "name": "Elon" }
        });
        let frame = json!({ "@context": { "@vocab": "http://ex.org/" }, "@id": "http://ex.org/car" });
        let framed = processor.frame(&document, &frame, &FrameOptions::default())?;
        assert_eq!(framed["owner"], json!({ "name": "Elon" }));

        let kept = processor.frame(
            &document,
            &frame,
            &FrameOptions {
                prune_blank_node_ids: false,
                ..Default::default()
            },
        )?;
        assert_eq!(kept["owner"]["@id"], json!("_:b0"));
        Ok(())
    }

    #[test]
    fn invalid_embed_value() -> Result<()> {
        let processor = Processor::default();
        let result = processor.frame(
            &library(),
            &json!({ "@embed": "@sometimes" }),
            &FrameOptions::default(),
        );
        assert!(result.is_err());
        Ok(())
    }
}
