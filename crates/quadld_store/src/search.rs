use std::collections::BTreeMap;

use crate::{GraphSelector, Quad, QuadPattern};

/// Variable bindings of one search result.
pub type Solution = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PatternTerm {
    #[default]
    Any,
    Value(String),
    Var(String),
}

impl PatternTerm {
    pub fn value(value: impl Into<String>) -> PatternTerm {
        PatternTerm::Value(value.into())
    }
    pub fn var(name: impl Into<String>) -> PatternTerm {
        PatternTerm::Var(name.into())
    }

    fn bind(&self, solution: &Solution) -> Option<String> {
        match self {
            PatternTerm::Any => None,
            PatternTerm::Value(value) => Some(value.clone()),
            PatternTerm::Var(name) => solution.get(name).cloned(),
        }
    }

    fn unify(&self, actual: &str, solution: &mut Solution) -> bool {
        match self {
            PatternTerm::Any => true,
            PatternTerm::Value(value) => value == actual,
            PatternTerm::Var(name) => match solution.get(name) {
                Some(bound) => bound == actual,
                None => {
                    solution.insert(name.clone(), actual.to_owned());
                    true
                }
            },
        }
    }
}

/// A quad pattern whose positions may be variables shared with other patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
    pub graph: GraphSelector,
}

impl SearchPattern {
    pub fn new(subject: PatternTerm, predicate: PatternTerm, object: PatternTerm) -> SearchPattern {
        SearchPattern {
            subject,
            predicate,
            object,
            graph: GraphSelector::Any,
        }
    }

    /// The store lookup for this pattern under the bindings found so far.
    pub(crate) fn bind(&self, solution: &Solution) -> QuadPattern {
        QuadPattern {
            subject: self.subject.bind(solution),
            predicate: self.predicate.bind(solution),
            object: self.object.bind(solution),
            graph: self.graph.clone(),
        }
    }

    pub(crate) fn unify(&self, quad: &Quad, solution: &Solution) -> Option<Solution> {
        let mut extended = solution.clone();
        let matched = self.subject.unify(&quad.subject, &mut extended)
            && self.predicate.unify(&quad.predicate, &mut extended)
            && self.object.unify(&quad.object, &mut extended);
        matched.then_some(extended)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use fjall::Config;
    use tempfile::tempdir;

    use crate::{FjallQuadStore, Quad, QuadStore};

    use super::*;

    #[tokio::test]
    async fn join_on_shared_variable() -> Result<()> {
        let tmp_dir = tempdir()?;
        let keyspace = Config::new(tmp_dir.path()).temporary(true).open()?;
        let store = FjallQuadStore::new(keyspace)?;
        store
            .put(vec![
                Quad::new("http://ex.org/ann", "http://xmlns.com/foaf/0.1/knows", "http://ex.org/bob"),
                Quad::new("http://ex.org/bob", "http://xmlns.com/foaf/0.1/name", "\"Bob\""),
                Quad::new("http://ex.org/ann", "http://xmlns.com/foaf/0.1/name", "\"Ann\""),
            ])
            .await?;

        let solutions = store
            .search(vec![
                SearchPattern::new(
                    PatternTerm::value("http://ex.org/ann"),
                    PatternTerm::value("http://xmlns.com/foaf/0.1/knows"),
                    PatternTerm::var("friend"),
                ),
                SearchPattern::new(
                    PatternTerm::var("friend"),
                    PatternTerm::value("http://xmlns.com/foaf/0.1/name"),
                    PatternTerm::var("name"),
                ),
            ])
            .await?;

        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0]["friend"], "http://ex.org/bob");
        assert_eq!(solutions[0]["name"], "\"Bob\"");
        Ok(())
    }

    #[test]
    fn repeated_variable_must_agree() {
        let pattern = SearchPattern::new(PatternTerm::var("x"), PatternTerm::Any, PatternTerm::var("x"));
        let looping = Quad::new("http://ex.org/a", "http://ex.org/p", "http://ex.org/a");
        let other = Quad::new("http://ex.org/a", "http://ex.org/p", "http://ex.org/b");
        assert!(pattern.unify(&looping, &Solution::new()).is_some());
        assert!(pattern.unify(&other, &Solution::new()).is_none());
    }
}
