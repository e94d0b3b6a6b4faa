//! Classification of stored terms.
//!
//! A stored term is an IRI, a blank node reference (`_:` prefix) or an
//! encoded literal (leading `"`).

pub fn is_literal(term: &str) -> bool {
    term.starts_with('"')
}

pub fn is_blank(term: &str) -> bool {
    term.starts_with("_:")
}

pub fn is_iri(term: &str) -> bool {
    !term.is_empty() && !is_literal(term) && !is_blank(term)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_terms() {
        assert!(is_iri("http://manu.sporny.org/"));
        assert!(is_blank("_:0193b6a2c4"));
        assert!(is_literal("\"Manu Sporny\""));
        assert!(is_literal("\"42\"^^http://www.w3.org/2001/XMLSchema#integer"));
        assert!(!is_iri("_:b0"));
        assert!(!is_iri("\"x\"@en"));
        assert!(!is_iri(""));
    }
}
