use futures::stream::{ BoxStream, StreamExt };
use std::sync::{ Arc, Mutex, MutexGuard };
use tokio::task::JoinHandle;

trait CallbackSlot: Send + Sync {
    fn clear(&self);
    fn is_set(&self) -> bool;
}

impl<F: Send> CallbackSlot for Mutex<Option<F>> {
    fn clear(&self) {
        lock(self).take();
    }

    fn is_set(&self) -> bool {
        lock(self).is_some()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle for a callback-driven live query.
///
/// The callback runs on a spawned task while holding the slot lock, and
/// `unsubscribe` clears the slot under that same lock, so once `unsubscribe`
/// returns the callback never runs again. Calling `unsubscribe` from inside
/// the callback deadlocks; drop the handle from another task instead.
#[must_use = "dropping a Subscription unsubscribes it"]
pub struct Subscription {
    slot: Arc<dyn CallbackSlot>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn unsubscribe(&mut self) {
        self.slot.clear();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot.is_set() && self.task.as_ref().map_or(false, |t| !t.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Drives `on_update` with every item of `stream` until the stream ends or
/// the returned handle is unsubscribed.
pub fn spawn_subscription<T, F>(stream: BoxStream<'static, T>, on_update: F) -> Subscription
    where T: Send + 'static, F: FnMut(T) + Send + 'static
{
    let slot = Arc::new(Mutex::new(Some(on_update)));
    let deliver = slot.clone();

    let task = tokio::spawn(async move {
        let mut stream = stream;
        while let Some(item) = stream.next().await {
            let mut guard = lock(&deliver);
            match guard.as_mut() {
                Some(callback) => callback(item),
                None => break,
            }
        }
    });

    Subscription {
        slot,
        task: Some(task),
    }
}
