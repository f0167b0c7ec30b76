use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

/// A long-lived, passively refreshed view of some ledger state.
///
/// The backing task fetches once when created and again on every
/// [`Invalidator::invalidate`]; values are delivered only when they differ
/// from the previous delivery. Dropping the subscription stops the task.
pub struct Subscription<T> {
    updates: mpsc::UnboundedReceiver<T>,
    invalidator: Invalidator,
    task: JoinHandle<()>,
}

#[derive(Clone, Default)]
pub struct Invalidator {
    refresh: Arc<Notify>,
}

impl Invalidator {
    /// Fire-and-forget: fresh state, if any, arrives through the subscription.
    pub fn invalidate(&self) {
        self.refresh.notify_one();
    }
}

impl<T> Subscription<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub fn passive<F, Fut>(label: &'static str, mut fetch: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let (tx, updates) = mpsc::unbounded_channel();
        let invalidator = Invalidator::default();
        let refresh = Arc::clone(&invalidator.refresh);

        let task = tokio::spawn(async move {
            let mut last: Option<T> = None;
            loop {
                match fetch().await {
                    Ok(value) => {
                        if last.as_ref() != Some(&value) {
                            last = Some(value.clone());
                            if tx.send(value).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(subscription = label, error = %e, "refresh failed");
                    }
                }

                tokio::select! {
                    _ = refresh.notified() => {}
                    _ = tx.closed() => break,
                }
            }
            tracing::debug!(subscription = label, "subscription closed");
        });

        Self {
            updates,
            invalidator,
            task,
        }
    }
}

impl<T> Subscription<T> {
    pub fn invalidator(&self) -> Invalidator {
        self.invalidator.clone()
    }

    pub fn invalidate(&self) {
        self.invalidator.invalidate();
    }

    /// Next changed value; `None` once the backing task has stopped.
    pub async fn next(&mut self) -> Option<T> {
        self.updates.recv().await
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
