use std::borrow::Cow;

/// An expanded IRI or a JSON-LD keyword produced by IRI expansion.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Term {
    Iri(Cow<'static, str>),
    Keyword(Cow<'static, str>),
}

impl Term {
    pub(crate) fn new_keyword(keyword: &str) -> Term {
        Term::Keyword(Cow::Owned(keyword.to_owned()))
    }

    pub(crate) const fn const_keyword(keyword: &'static str) -> Term {
        Term::Keyword(Cow::Borrowed(keyword))
    }

    pub(crate) fn new_iri(iri: &str) -> Term {
        Term::Iri(Cow::Owned(iri.to_owned()))
    }

    pub(crate) fn as_str(&self) -> &str {
        match self {
            Term::Iri(iri) => iri,
            Term::Keyword(keyword) => keyword,
        }
    }

    pub(crate) fn is_keyword(&self) -> bool {
        matches!(self, Term::Keyword(_))
    }

    /// Appends `suffix` to an IRI. Keywords cannot be used as a prefix.
    pub(crate) fn join(&self, suffix: &str) -> Option<Term> {
        match self {
            Term::Iri(iri) => Some(Term::Iri(Cow::Owned(format!("{iri}{suffix}")))),
            Term::Keyword(_) => None,
        }
    }
}

pub(crate) const CONTEXT: Term = Term::const_keyword("@context");
pub(crate) const TYPE: Term = Term::const_keyword("@type");

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
pub const RDF_REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
pub const RDF_NIL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
pub const RDF_PLAIN_LITERAL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#PlainLiteral";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";

const KEYWORDS: [&str; 28] = [
    "@base",
    "@container",
    "@context",
    "@default",
    "@direction",
    "@embed",
    "@explicit",
    "@graph",
    "@id",
    "@import",
    "@included",
    "@index",
    "@json",
    "@language",
    "@list",
    "@nest",
    "@none",
    "@omitDefault",
    "@prefix",
    "@preserve",
    "@propagate",
    "@protected",
    "@requireAll",
    "@reverse",
    "@set",
    "@type",
    "@value",
    "@version",
];

pub(crate) fn is_keyword(value: &str) -> bool {
    value == "@vocab" || KEYWORDS.contains(&value)
}

/// `@` followed by ASCII letters only; such values are reserved and ignored.
pub(crate) fn looks_like_keyword(value: &str) -> bool {
    value
        .strip_prefix('@')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphabetic()))
}
