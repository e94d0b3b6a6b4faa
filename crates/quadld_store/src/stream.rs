use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, spawn_blocking};

use crate::Quad;

const WRITE_BUFFER: usize = 256;

/// Streaming quad sink.
///
/// Every quad is applied on its own as it arrives, so readers may observe a
/// partially written stream. `close` waits until all sent quads are applied.
pub struct QuadWriter {
    tx: Option<mpsc::Sender<Quad>>,
    task: Option<JoinHandle<Result<usize>>>,
}

impl QuadWriter {
    pub(crate) fn spawn<F>(mut apply: F) -> QuadWriter
    where
        F: FnMut(Quad) -> Result<()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<Quad>(WRITE_BUFFER);
        let task = spawn_blocking(move || {
            let mut applied = 0;
            while let Some(quad) = rx.blocking_recv() {
                apply(quad)?;
                applied += 1;
            }
            Ok(applied)
        });
        QuadWriter {
            tx: Some(tx),
            task: Some(task),
        }
    }

    pub async fn write(&mut self, quad: Quad) -> Result<()> {
        let tx = self.tx.as_ref().context("quad writer is already closed")?;
        if tx.send(quad).await.is_ok() {
            return Ok(());
        }
        // The receiving task stopped early, surface its failure.
        self.tx = None;
        match self.task.take() {
            Some(task) => {
                task.await.context("quad writer task panicked")??;
                bail!("quad writer stopped before the stream was closed")
            }
            None => bail!("quad writer is already closed"),
        }
    }

    /// Finishes the stream and returns the number of applied quads.
    pub async fn close(mut self) -> Result<usize> {
        drop(self.tx.take());
        let task = self.task.take().context("quad writer is already closed")?;
        task.await.context("quad writer task panicked")?
    }
}
