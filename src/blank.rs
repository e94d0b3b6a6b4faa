use std::collections::HashMap;

use uuid::Uuid;

/// Maps the blank node labels of one operation to store scoped identifiers.
///
/// Every label the processor produces gets a fresh `_:<uuid>` the first time
/// it is resolved, and the same identifier afterwards. A map lives for a
/// single write and is dropped with it.
#[derive(Debug, Default)]
pub struct BlankNodeMap {
    ids: HashMap<String, String>,
}

impl BlankNodeMap {
    pub fn new() -> BlankNodeMap {
        BlankNodeMap::default()
    }

    pub fn resolve(&mut self, label: &str) -> &str {
        self.ids
            .entry(label.to_owned())
            .or_insert_with(|| format!("_:{}", Uuid::now_v7().simple()))
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.ids.get(label).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// `(label, store id)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.ids.iter().map(|(label, id)| (label.as_str(), id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::BlankNodeMap;

    #[test]
    fn same_label_same_id() {
        let mut blanks = BlankNodeMap::new();
        let first = blanks.resolve("_:b0").to_owned();
        let second = blanks.resolve("_:b1").to_owned();
        assert!(first.starts_with("_:"));
        assert_ne!(first, second);
        assert_eq!(blanks.resolve("_:b0"), first);
        assert_eq!(blanks.len(), 2);
        assert_eq!(blanks.get("_:b1"), Some(second.as_str()));
    }

    #[test]
    fn maps_are_independent() {
        let mut one = BlankNodeMap::new();
        let mut two = BlankNodeMap::new();
        assert_ne!(one.resolve("_:b0"), two.resolve("_:b0"));
    }
}
