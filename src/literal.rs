//! Literal codec
//!
//! Literals are stored as a quoted lexical form followed by either nothing
//! (`xsd:string`), a language tag (`"chat"@fr`) or a datatype IRI
//! (`"42"^^http://www.w3.org/2001/XMLSchema#integer`).

use serde_json::{Map, Number, Value, json};
use thiserror::Error;

use crate::json_ld::RdfTerm;
use crate::json_ld::vocab::{
    RDF_LANG_STRING, RDF_PLAIN_LITERAL, XSD_BOOLEAN, XSD_DOUBLE, XSD_INTEGER, XSD_STRING,
};
use crate::term;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiteralError {
    #[error("value not boolean: {0}")]
    NotBoolean(String),
}

/// A stored term split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredTerm<'a> {
    Iri(&'a str),
    Blank(&'a str),
    Literal {
        lexical: &'a str,
        language: Option<&'a str>,
        datatype: &'a str,
    },
}

pub fn encode(lexical: &str, datatype: &str, language: Option<&str>) -> String {
    match language {
        Some(language) if datatype == RDF_LANG_STRING => format!("\"{lexical}\"@{language}"),
        _ if datatype == XSD_STRING => format!("\"{lexical}\""),
        _ => format!("\"{lexical}\"^^{datatype}"),
    }
}

/// Stored form of an object term. Blank nodes are returned as labelled by
/// the processor.
pub fn encode_term(term: &RdfTerm) -> String {
    match term {
        RdfTerm::Iri(iri) | RdfTerm::Blank(iri) => iri.clone(),
        RdfTerm::Literal {
            value,
            datatype,
            language,
        } => encode(value, datatype, language.as_deref()),
    }
}

pub fn parse(stored: &str) -> StoredTerm<'_> {
    if term::is_blank(stored) {
        return StoredTerm::Blank(stored);
    }
    let Some(quoted) = stored.strip_prefix('"') else {
        return StoredTerm::Iri(stored);
    };
    // Tags and datatype IRIs never contain a quote, so the last one closes
    // the lexical form.
    let Some(end) = quoted.rfind('"') else {
        return StoredTerm::Literal {
            lexical: quoted,
            language: None,
            datatype: XSD_STRING,
        };
    };
    let (lexical, rest) = (&quoted[..end], &quoted[end + 1..]);
    if let Some(language) = rest.strip_prefix('@') {
        StoredTerm::Literal {
            lexical,
            language: Some(language),
            datatype: RDF_LANG_STRING,
        }
    } else if let Some(datatype) = rest.strip_prefix("^^") {
        StoredTerm::Literal {
            lexical,
            language: None,
            datatype,
        }
    } else {
        StoredTerm::Literal {
            lexical,
            language: None,
            datatype: XSD_STRING,
        }
    }
}

/// Expanded JSON-LD value of a stored object.
///
/// Integers, doubles and booleans become native JSON values. Numeric
/// lexical forms that do not fit a JSON number keep their datatype.
pub fn decode(stored: &str) -> Result<Value, LiteralError> {
    let (lexical, language, datatype) = match parse(stored) {
        StoredTerm::Iri(id) | StoredTerm::Blank(id) => return Ok(json!({ "@id": id })),
        StoredTerm::Literal {
            lexical,
            language,
            datatype,
        } => (lexical, language, datatype),
    };

    let mut coerced = Map::new();
    match datatype {
        XSD_STRING | RDF_PLAIN_LITERAL => {
            coerced.insert("@value".into(), lexical.into());
        }
        RDF_LANG_STRING => {
            coerced.insert("@value".into(), lexical.into());
            if let Some(language) = language {
                coerced.insert("@language".into(), language.into());
            }
        }
        XSD_INTEGER => match lexical.trim().parse::<i64>() {
            Ok(n) => {
                coerced.insert("@value".into(), n.into());
            }
            Err(_) => return Ok(typed(lexical, datatype)),
        },
        XSD_DOUBLE => match lexical.trim().parse::<f64>().ok().and_then(Number::from_f64) {
            Some(n) => {
                coerced.insert("@value".into(), Value::Number(n));
            }
            None => return Ok(typed(lexical, datatype)),
        },
        XSD_BOOLEAN => {
            let value = match lexical {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(LiteralError::NotBoolean(lexical.to_owned())),
            };
            coerced.insert("@value".into(), value.into());
        }
        _ => return Ok(typed(lexical, datatype)),
    }
    Ok(Value::Object(coerced))
}

fn typed(lexical: &str, datatype: &str) -> Value {
    json!({ "@value": lexical, "@type": datatype })
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    const XSD_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";

    #[test]
    fn encodes_three_forms() {
        assert_eq!(encode("Manu", XSD_STRING, None), "\"Manu\"");
        assert_eq!(encode("chat", RDF_LANG_STRING, Some("fr")), "\"chat\"@fr");
        assert_eq!(
            encode("42", XSD_INTEGER, None),
            "\"42\"^^http://www.w3.org/2001/XMLSchema#integer"
        );
        assert_eq!(
            encode_term(&RdfTerm::literal("true", XSD_BOOLEAN)),
            "\"true\"^^http://www.w3.org/2001/XMLSchema#boolean"
        );
        assert_eq!(
            encode_term(&RdfTerm::Iri("http://ex.org/a".into())),
            "http://ex.org/a"
        );
    }

    #[test]
    fn parses_quotes_inside_lexical_form() {
        assert_eq!(
            parse("\"say \"hi\"\"@en"),
            StoredTerm::Literal {
                lexical: "say \"hi\"",
                language: Some("en"),
                datatype: RDF_LANG_STRING,
            }
        );
        assert_eq!(parse("_:abc"), StoredTerm::Blank("_:abc"));
        assert_eq!(parse("http://ex.org/a"), StoredTerm::Iri("http://ex.org/a"));
    }

    #[test]
    fn decodes_native_values() -> Result<()> {
        assert_eq!(decode("\"Manu\"")?, json!({ "@value": "Manu" }));
        assert_eq!(
            decode("\"chat\"@fr")?,
            json!({ "@value": "chat", "@language": "fr" })
        );
        assert_eq!(decode(&encode("42", XSD_INTEGER, None))?, json!({ "@value": 42 }));
        assert_eq!(decode(&encode("5.3E0", XSD_DOUBLE, None))?, json!({ "@value": 5.3 }));
        assert_eq!(decode(&encode("1", XSD_BOOLEAN, None))?, json!({ "@value": true }));
        assert_eq!(decode(&encode("false", XSD_BOOLEAN, None))?, json!({ "@value": false }));
        assert_eq!(
            decode(&encode("2020-01-01", XSD_DATE, None))?,
            json!({ "@value": "2020-01-01", "@type": XSD_DATE })
        );
        assert_eq!(
            decode(&encode("x", RDF_PLAIN_LITERAL, None))?,
            json!({ "@value": "x" })
        );
        assert_eq!(decode("http://ex.org/a")?, json!({ "@id": "http://ex.org/a" }));
        Ok(())
    }

    #[test]
    fn malformed_boolean_fails() {
        let err = decode(&encode("yes", XSD_BOOLEAN, None)).unwrap_err();
        assert_eq!(err, LiteralError::NotBoolean("yes".into()));
    }

    #[test]
    fn unparsable_numbers_keep_datatype() -> Result<()> {
        assert_eq!(
            decode(&encode("99999999999999999999", XSD_INTEGER, None))?,
            json!({ "@value": "99999999999999999999", "@type": XSD_INTEGER })
        );
        assert_eq!(
            decode(&encode("INF", XSD_DOUBLE, None))?,
            json!({ "@value": "INF", "@type": XSD_DOUBLE })
        );
        Ok(())
    }
}
