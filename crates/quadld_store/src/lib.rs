//! Quad model and a fjall backed quad store.

mod fjall_store;
mod index;
mod key;
mod quad;
mod search;
mod stream;

use std::future::Future;

use anyhow::Result;

pub use self::fjall_store::FjallQuadStore;
pub use self::quad::{GraphSelector, Quad, QuadPattern};
pub use self::search::{PatternTerm, SearchPattern, Solution};
pub use self::stream::QuadWriter;

/// Backing store for quads.
///
/// `put` and `del` apply the whole list as one batch. The stream variants
/// apply quads one at a time and make no promise about what concurrent
/// readers observe before the writer is closed.
pub trait QuadStore: Clone + Send + Sync + 'static {
    fn put(&self, quads: Vec<Quad>) -> impl Future<Output = Result<()>> + Send;

    fn put_stream(&self) -> impl Future<Output = Result<QuadWriter>> + Send;

    fn del(&self, quads: Vec<Quad>) -> impl Future<Output = Result<()>> + Send;

    fn del_stream(&self) -> impl Future<Output = Result<QuadWriter>> + Send;

    fn get(&self, pattern: QuadPattern) -> impl Future<Output = Result<Vec<Quad>>> + Send;

    /// Nested loop join of `patterns`, binding variables left to right.
    fn search(
        &self,
        patterns: Vec<SearchPattern>,
    ) -> impl Future<Output = Result<Vec<Solution>>> + Send {
        async move {
            let mut solutions = vec![Solution::new()];
            for pattern in &patterns {
                let mut next = vec![];
                for solution in &solutions {
                    for quad in self.get(pattern.bind(solution)).await? {
                        if let Some(extended) = pattern.unify(&quad, solution) {
                            next.push(extended);
                        }
                    }
                }
                solutions = next;
                if solutions.is_empty() {
                    break;
                }
            }
            Ok(solutions)
        }
    }
}
