use anyhow::{Context, Result};
use fjall::{Batch, Keyspace, PartitionCreateOptions, PartitionHandle};

use crate::key::{Permutation, QuadKey, prefix};
use crate::{Quad, QuadPattern};

/// One permutation of the quad table. Values hold the encoded quad.
#[derive(Clone)]
pub(crate) struct QuadIndex {
    permutation: Permutation,
    index: PartitionHandle,
}

impl QuadIndex {
    pub(crate) fn open(keyspace: &Keyspace, permutation: Permutation) -> Result<QuadIndex> {
        let index = keyspace
            .open_partition(permutation.partition_name(), PartitionCreateOptions::default())
            .with_context(|| format!("unable to open {}", permutation.partition_name()))?;
        Ok(QuadIndex { permutation, index })
    }
    pub(crate) fn permutation(&self) -> Permutation {
        self.permutation
    }
    pub(crate) fn insert(&self, b: &mut Batch, quad: &Quad, value: &[u8]) -> Result<()> {
        b.insert(&self.index, QuadKey::new(self.permutation, quad)?, value);
        Ok(())
    }
    pub(crate) fn remove(&self, b: &mut Batch, quad: &Quad) -> Result<()> {
        b.remove(&self.index, QuadKey::new(self.permutation, quad)?);
        Ok(())
    }
    pub(crate) fn contains(&self, quad: &Quad) -> Result<bool> {
        let key = QuadKey::new(self.permutation, quad)?;
        self.index
            .contains_key(key)
            .context("unable to read quad index")
    }
    /// Quads under the key prefix built from `terms`, filtered by `pattern`.
    pub(crate) fn scan(&self, terms: &[&str], pattern: &QuadPattern) -> Result<Vec<Quad>> {
        let mut quads = vec![];
        for item in self.index.prefix(prefix(terms)?) {
            let (_, value) = item.context("unable to scan quad index")?;
            let quad = Quad::from_bytes(&value)?;
            if pattern.matches(&quad) {
                quads.push(quad);
            }
        }
        Ok(quads)
    }
}
