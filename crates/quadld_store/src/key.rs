use anyhow::{Result, bail};
use fjall::{Slice, UserKey};

use crate::{Quad, QuadPattern};

/// Term order of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Permutation {
    Spo,
    Pos,
    Osp,
}

impl Permutation {
    pub(crate) const ALL: [Permutation; 3] = [Permutation::Spo, Permutation::Pos, Permutation::Osp];

    pub(crate) fn partition_name(self) -> &'static str {
        match self {
            Permutation::Spo => "quad_spo",
            Permutation::Pos => "quad_pos",
            Permutation::Osp => "quad_osp",
        }
    }

    fn order(self, quad: &Quad) -> [&str; 3] {
        let Quad {
            subject,
            predicate,
            object,
            ..
        } = quad;
        match self {
            Permutation::Spo => [subject, predicate, object],
            Permutation::Pos => [predicate, object, subject],
            Permutation::Osp => [object, subject, predicate],
        }
    }

    /// Picks the index whose key starts with the most bound terms of the
    /// pattern, and returns those terms in key order.
    pub(crate) fn for_pattern(pattern: &QuadPattern) -> (Permutation, Vec<&str>) {
        let s = pattern.subject.as_deref();
        let p = pattern.predicate.as_deref();
        let o = pattern.object.as_deref();
        match (s, p, o) {
            (Some(s), Some(p), Some(o)) => (Permutation::Spo, vec![s, p, o]),
            (Some(s), Some(p), None) => (Permutation::Spo, vec![s, p]),
            (Some(s), None, Some(o)) => (Permutation::Osp, vec![o, s]),
            (None, Some(p), Some(o)) => (Permutation::Pos, vec![p, o]),
            (Some(s), None, None) => (Permutation::Spo, vec![s]),
            (None, Some(p), None) => (Permutation::Pos, vec![p]),
            (None, None, Some(o)) => (Permutation::Osp, vec![o]),
            (None, None, None) => (Permutation::Spo, vec![]),
        }
    }
}

/// NUL delimited index key: three terms in permutation order, then the graph
/// name (empty for the default graph).
#[derive(Clone)]
pub(crate) struct QuadKey(Slice);

impl QuadKey {
    pub(crate) fn new(permutation: Permutation, quad: &Quad) -> Result<QuadKey> {
        let mut key = vec![];
        for term in permutation.order(quad) {
            push_term(&mut key, term)?;
        }
        if let Some(graph) = &quad.graph {
            if graph.is_empty() {
                bail!("graph name of quad must not be empty");
            }
            if graph.as_bytes().contains(&0) {
                bail!("graph name must not contain a NUL byte");
            }
            key.extend_from_slice(graph.as_bytes());
        }
        Ok(QuadKey(key.into()))
    }
}

impl From<QuadKey> for UserKey {
    fn from(value: QuadKey) -> Self {
        value.0
    }
}

impl AsRef<[u8]> for QuadKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Scan prefix for the bound leading terms of a key.
pub(crate) fn prefix(terms: &[&str]) -> Result<Vec<u8>> {
    let mut prefix = vec![];
    for term in terms {
        push_term(&mut prefix, term)?;
    }
    Ok(prefix)
}

fn push_term(key: &mut Vec<u8>, term: &str) -> Result<()> {
    if term.as_bytes().contains(&0) {
        bail!("quad term must not contain a NUL byte: {term:?}");
    }
    key.extend_from_slice(term.as_bytes());
    key.push(0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    #[test]
    fn prefix_is_term_bounded() -> Result<()> {
        let quad = Quad::new("http://ex.org/ab", "http://ex.org/p", "x");
        let key: UserKey = QuadKey::new(Permutation::Spo, &quad)?.into();
        assert!(key.starts_with(&prefix(&["http://ex.org/ab"])?));
        assert!(!key.starts_with(&prefix(&["http://ex.org/a"])?));
        Ok(())
    }

    #[test]
    fn picks_index_by_bound_terms() {
        let pattern = QuadPattern::default()
            .with_predicate("p")
            .with_object("o");
        let (permutation, terms) = Permutation::for_pattern(&pattern);
        assert_eq!(permutation, Permutation::Pos);
        assert_eq!(terms, vec!["p", "o"]);
    }

    #[test]
    fn rejects_nul() {
        let quad = Quad::new("a\0b", "p", "o");
        assert!(QuadKey::new(Permutation::Osp, &quad).is_err());
    }
}
