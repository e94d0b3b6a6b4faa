//! One writer at a time.
//!
//! [`GraphWorker`] owns a [`GraphDb`] and handles one request to
//! completion before taking the next, which makes `check_and_put` atomic
//! with respect to every other request sent through the same
//! [`SerialGraph`].

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde_json::Value;
use store::{Quad, QuadStore};
use tracing::{debug, info};

use crate::check::{CheckOutcome, Verdict};
use crate::error::{Error, Result};
use crate::graph::GraphDb;
use crate::options::Options;

/// A policy that can be sent to the worker.
pub type Policy = Box<dyn FnMut(&Quad) -> Verdict + Send>;

pub struct GraphWorker<S>(std::marker::PhantomData<fn() -> S>);

impl<S> Default for GraphWorker<S> {
    fn default() -> Self {
        Self(std::marker::PhantomData)
    }
}

pub enum GraphMsg {
    Put(Value, Options, RpcReplyPort<Result<Option<Value>>>),
    Post(Value, Options, RpcReplyPort<Result<Option<Value>>>),
    Check(Value, Options, Policy, RpcReplyPort<Result<CheckOutcome>>),
    CheckAndPut(Value, Options, Policy, RpcReplyPort<Result<CheckOutcome>>),
    Del(Value, Options, RpcReplyPort<Result<()>>),
    Cut(Value, Options, RpcReplyPort<Result<()>>),
    Get(Value, Option<Value>, Options, RpcReplyPort<Result<Option<Value>>>),
}

impl<S: QuadStore> Actor for GraphWorker<S> {
    type Msg = GraphMsg;
    type State = GraphDb<S>;
    type Arguments = GraphDb<S>;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        db: Self::Arguments,
    ) -> std::result::Result<Self::State, ActorProcessingErr> {
        info!(target: "lifecycle", "graph worker started");
        Ok(db)
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        db: &mut Self::State,
    ) -> std::result::Result<(), ActorProcessingErr> {
        // A dropped reply port only means the caller went away.
        let sent = match message {
            GraphMsg::Put(document, options, reply) => {
                reply.send(db.put(document, &options).await).is_ok()
            }
            GraphMsg::Post(document, options, reply) => {
                reply.send(db.post(document, &options).await).is_ok()
            }
            GraphMsg::Check(document, options, policy, reply) => {
                reply.send(db.check(document, &options, policy).await).is_ok()
            }
            GraphMsg::CheckAndPut(document, options, policy, reply) => {
                reply.send(db.check_and_put(document, &options, policy).await).is_ok()
            }
            GraphMsg::Del(document, options, reply) => {
                reply.send(db.del(document, &options).await).is_ok()
            }
            GraphMsg::Cut(document, options, reply) => {
                reply.send(db.cut(document, &options).await).is_ok()
            }
            GraphMsg::Get(target, context, options, reply) => {
                reply.send(db.get(target, context.as_ref(), &options).await).is_ok()
            }
        };
        if !sent {
            debug!(target: "quadld::serial", "caller dropped before reply");
        }
        Ok(())
    }
}

/// Handle to a running [`GraphWorker`].
#[derive(Clone)]
pub struct SerialGraph {
    worker: ActorRef<GraphMsg>,
}

impl SerialGraph {
    pub async fn spawn<S: QuadStore>(db: GraphDb<S>) -> Result<SerialGraph> {
        let (worker, _) = Actor::spawn(None, GraphWorker::<S>::default(), db)
            .await
            .map_err(|e| Error::Worker(e.to_string()))?;
        Ok(SerialGraph { worker })
    }

    pub fn stop(&self) {
        self.worker.stop(None);
    }

    pub async fn put(&self, document: Value, options: Options) -> Result<Option<Value>> {
        ractor::call!(self.worker, GraphMsg::Put, document, options).map_err(worker_error)?
    }

    pub async fn post(&self, document: Value, options: Options) -> Result<Option<Value>> {
        ractor::call!(self.worker, GraphMsg::Post, document, options).map_err(worker_error)?
    }

    pub async fn check(
        &self,
        document: Value,
        options: Options,
        policy: impl FnMut(&Quad) -> Verdict + Send + 'static,
    ) -> Result<CheckOutcome> {
        let policy: Policy = Box::new(policy);
        ractor::call!(self.worker, GraphMsg::Check, document, options, policy)
            .map_err(worker_error)?
    }

    pub async fn check_and_put(
        &self,
        document: Value,
        options: Options,
        policy: impl FnMut(&Quad) -> Verdict + Send + 'static,
    ) -> Result<CheckOutcome> {
        let policy: Policy = Box::new(policy);
        ractor::call!(self.worker, GraphMsg::CheckAndPut, document, options, policy)
            .map_err(worker_error)?
    }

    pub async fn del(&self, document: Value, options: Options) -> Result<()> {
        ractor::call!(self.worker, GraphMsg::Del, document, options).map_err(worker_error)?
    }

    pub async fn cut(&self, document: Value, options: Options) -> Result<()> {
        ractor::call!(self.worker, GraphMsg::Cut, document, options).map_err(worker_error)?
    }

    pub async fn get(
        &self,
        target: Value,
        context: Option<Value>,
        options: Options,
    ) -> Result<Option<Value>> {
        ractor::call!(self.worker, GraphMsg::Get, target, context, options)
            .map_err(worker_error)?
    }
}

fn worker_error<E: std::fmt::Display>(e: E) -> Error {
    Error::Worker(e.to_string())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;
    use store::{QuadPattern, QuadStore};
    use tempfile::tempdir;

    use super::SerialGraph;
    use crate::Options;
    use crate::check::policy;
    use crate::testing::{chain_context, manu, open_db};

    #[tokio::test]
    async fn requests_round_trip_through_the_worker() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        let graph = SerialGraph::spawn(db).await?;
        graph.put(manu(), Options::default()).await?;
        let found = graph
            .get(
                json!("http://manu.sporny.org#person"),
                Some(manu()["@context"].clone()),
                Options::default(),
            )
            .await?;
        assert_eq!(found, Some(manu()));
        graph.stop();
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_check_and_put_keeps_one_value() -> Result<()> {
        let dir = tempdir()?;
        let db = open_db(dir.path())?;
        let store = db.store().clone();
        let graph = SerialGraph::spawn(db).await?;

        let mut tasks = vec![];
        for k in 0..8 {
            let graph = graph.clone();
            tasks.push(tokio::spawn(async move {
                let doc = json!({
                    "@context": chain_context(),
                    "@id": "0",
                    "value": k.to_string()
                });
                graph
                    .check_and_put(doc, Options::default(), policy::unique_subject_predicate)
                    .await
            }));
        }
        let mut conflicted = 0;
        for task in tasks {
            if task.await??.has_conflicts() {
                conflicted += 1;
            }
        }
        assert_eq!(conflicted, 7);
        let stored = store.get(QuadPattern::default()).await?;
        assert_eq!(stored.len(), 1);
        graph.stop();
        Ok(())
    }
}
