use std::sync::Arc;

use anyhow::{Context, Result};
use blocking::unblock;
use fjall::{Keyspace, PersistMode};
use tracing::{debug, trace};

use crate::index::QuadIndex;
use crate::key::Permutation;
use crate::stream::QuadWriter;
use crate::{Quad, QuadPattern, QuadStore};

/// Quad store over three fjall partitions, one per term permutation.
#[derive(Clone)]
pub struct FjallQuadStore {
    keyspace: Keyspace,
    indexes: Arc<[QuadIndex]>,
}

impl FjallQuadStore {
    pub fn new(keyspace: Keyspace) -> Result<FjallQuadStore> {
        let indexes = Permutation::ALL
            .into_iter()
            .map(|permutation| QuadIndex::open(&keyspace, permutation))
            .collect::<Result<Vec<_>>>()?;
        Ok(FjallQuadStore {
            keyspace,
            indexes: indexes.into(),
        })
    }

    /// Persists the journal to disk.
    pub fn flush(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("unable to persist quad store")
    }

    fn put_blocking(&self, quads: &[Quad]) -> Result<()> {
        let mut b = self.keyspace.batch();
        for quad in quads {
            let value = quad.to_bytes()?;
            for index in self.indexes.iter() {
                index.insert(&mut b, quad, &value)?;
            }
        }
        b.commit().context("failed to write quads")
    }

    fn del_blocking(&self, quads: &[Quad]) -> Result<()> {
        let mut b = self.keyspace.batch();
        for quad in quads {
            for index in self.indexes.iter() {
                index.remove(&mut b, quad)?;
            }
        }
        b.commit().context("failed to delete quads")
    }

    fn get_blocking(&self, pattern: &QuadPattern) -> Result<Vec<Quad>> {
        let (permutation, terms) = Permutation::for_pattern(pattern);
        let index = self
            .indexes
            .iter()
            .find(|index| index.permutation() == permutation)
            .context("quad index is missing")?;
        index.scan(&terms, pattern)
    }

    /// Whether the exact quad is stored.
    pub fn contains(&self, quad: &Quad) -> Result<bool> {
        self.indexes
            .first()
            .context("quad index is missing")?
            .contains(quad)
    }
}

impl QuadStore for FjallQuadStore {
    async fn put(&self, quads: Vec<Quad>) -> Result<()> {
        debug!(target: "quadld::store", count = quads.len(), "put quads");
        let store = self.clone();
        unblock(move || store.put_blocking(&quads))
            .await
            .context("Failed to put quads")
    }

    async fn put_stream(&self) -> Result<QuadWriter> {
        let store = self.clone();
        Ok(QuadWriter::spawn(move |quad| {
            trace!(target: "quadld::store", ?quad, "stream put");
            store.put_blocking(std::slice::from_ref(&quad))
        }))
    }

    async fn del(&self, quads: Vec<Quad>) -> Result<()> {
        debug!(target: "quadld::store", count = quads.len(), "delete quads");
        let store = self.clone();
        unblock(move || store.del_blocking(&quads))
            .await
            .context("Failed to delete quads")
    }

    async fn del_stream(&self) -> Result<QuadWriter> {
        let store = self.clone();
        Ok(QuadWriter::spawn(move |quad| {
            trace!(target: "quadld::store", ?quad, "stream delete");
            store.del_blocking(std::slice::from_ref(&quad))
        }))
    }

    async fn get(&self, pattern: QuadPattern) -> Result<Vec<Quad>> {
        let store = self.clone();
        unblock(move || store.get_blocking(&pattern))
            .await
            .context("Failed to get quads")
    }
}
