use std::any::Any;

use diesel::SqliteConnection;
use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};

use boursomatic_core::errors::{DatabaseError, Result};

use super::{get_connection, DbPool};
use crate::errors::StorageError;

// Jobs run on the writer's connection; results are type-erased for the channel.
type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;
type AnyResult = Result<Box<dyn Any + Send + 'static>>;

const QUEUE_DEPTH: usize = 1024;

/// Handle for sending jobs to the writer actor.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<(Job<Box<dyn Any + Send + 'static>>, oneshot::Sender<AnyResult>)>,
}

impl WriteHandle {
    /// Run `job` inside an immediate transaction on the writer's connection.
    ///
    /// A stopped writer surfaces as [`DatabaseError::Unavailable`].
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (ret_tx, ret_rx) = oneshot::channel();

        self.tx
            .send((
                Box::new(move |c| job(c).map(|v| Box::new(v) as Box<dyn Any + Send>)),
                ret_tx,
            ))
            .await
            .map_err(|_| DatabaseError::Unavailable("writer actor stopped".to_string()))?;

        let boxed = ret_rx.await.map_err(|_| {
            DatabaseError::Unavailable("writer actor dropped the reply".to_string())
        })??;

        boxed.downcast::<T>().map(|v| *v).map_err(|_| {
            DatabaseError::Internal("unexpected writer result type".to_string()).into()
        })
    }
}

/// Spawn the single writer. It holds one pooled connection for its lifetime
/// and runs jobs one at a time, each in an immediate transaction.
pub fn spawn_writer(pool: &DbPool) -> Result<WriteHandle> {
    let mut conn = get_connection(pool)?;
    let (tx, mut rx) = mpsc::channel::<(
        Job<Box<dyn Any + Send + 'static>>,
        oneshot::Sender<AnyResult>,
    )>(QUEUE_DEPTH);

    tokio::spawn(async move {
        while let Some((job, reply_tx)) = rx.recv().await {
            let result: AnyResult = conn
                .immediate_transaction::<_, StorageError, _>(|c| job(c).map_err(StorageError::from))
                .map_err(Into::into);
            if let Err(e) = &result {
                warn!("Write job failed: {}", e);
            }
            let _ = reply_tx.send(result);
        }
        debug!("Writer actor stopped");
    });

    Ok(WriteHandle { tx })
}
