//! Request-scoped batch loading
//!
//! A [`Coalescer`] gathers the keys that independent callers submit while
//! one resolution pass runs, calls its batch function once for all of
//! them, and hands each caller the result at its key's position. Keys
//! submitted twice before the batch flushes share one result. Nothing is
//! memoized once a batch has flushed.
//!
//! The first caller of a fresh batch dispatches it: it yields to the
//! scheduler until no more sibling keys arrive, then runs the batch
//! function. Dependent lookups issued after a batch resolves land in the
//! next batch.
//!
//! A [`BatchRegistry`] maps a loader id such as `"Pokemon.types"` to its
//! coalescer. Each [`RequestScope`] owns one registry.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::channel::oneshot;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use crate::error::{BatchError, KeyError, LoadError, LoadResult, ScopeError};
use crate::scope::RequestScope;

/// Upper bound on scheduler turns a dispatcher waits for siblings.
const MAX_SETTLE_ROUNDS: usize = 16;

/// What a batch function returns: one value-or-error per key, in key order.
pub type BatchResult<V> = Result<Vec<Result<V, KeyError>>, BatchError>;

type BatchFn<K, V> = dyn Fn(Vec<K>) -> BoxFuture<'static, BatchResult<V>> + Send + Sync;
type Waiter<V> = Shared<oneshot::Receiver<LoadResult<V>>>;

/// Bounds for coalescer keys. Equality decides deduplication.
pub trait BatchKey: Hash + Eq + Clone + Send + Sync + 'static {}
impl<T> BatchKey for T where T: Hash + Eq + Clone + Send + Sync + 'static {}

/// Bounds for coalescer values. Deduplicated callers each get a clone.
pub trait BatchValue: Clone + Send + Sync + 'static {}
impl<T> BatchValue for T where T: Clone + Send + Sync + 'static {}

/// Key wrapper comparing by allocation, not by value.
///
/// Two `ByAddress` keys are equal only when they point at the same `Arc`
/// allocation, so equal-looking source objects are still loaded separately.
pub struct ByAddress<T: ?Sized>(pub Arc<T>);

impl<T: ?Sized> Clone for ByAddress<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> PartialEq for ByAddress<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Eq for ByAddress<T> {}

impl<T: ?Sized> Hash for ByAddress<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0).cast::<()>(), state);
    }
}

impl<T: ?Sized> Deref for ByAddress<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized + std::fmt::Debug> std::fmt::Debug for ByAddress<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ByAddress").field(&&*self.0).finish()
    }
}

/// Batches and deduplicates keyed lookups submitted in the same tick
pub struct Coalescer<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for Coalescer<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<K, V> {
    id: Arc<str>,
    batch_fn: Box<BatchFn<K, V>>,
    state: Mutex<State<K, V>>,
}

struct State<K, V> {
    generation: u64,
    pending: Option<PendingBatch<K, V>>,
}

struct PendingBatch<K, V> {
    generation: u64,
    keys: Vec<K>,
    senders: Vec<oneshot::Sender<LoadResult<V>>>,
    waiters: HashMap<K, Waiter<V>>,
}

impl<K: BatchKey, V: BatchValue> PendingBatch<K, V> {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            keys: Vec::new(),
            senders: Vec::new(),
            waiters: HashMap::new(),
        }
    }

    fn push(&mut self, key: K) -> Waiter<V> {
        let (sender, receiver) = oneshot::channel();
        let waiter = receiver.shared();
        self.keys.push(key.clone());
        self.senders.push(sender);
        self.waiters.insert(key, waiter.clone());
        waiter
    }
}

impl<K, V> Inner<K, V> {
    fn lock(&self) -> MutexGuard<'_, State<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_len(&self, generation: u64) -> Option<usize> {
        self.lock()
            .pending
            .as_ref()
            .filter(|batch| batch.generation == generation)
            .map(|batch| batch.keys.len())
    }

    fn take_pending(&self, generation: u64) -> Option<PendingBatch<K, V>> {
        let mut state = self.lock();
        let current = state
            .pending
            .as_ref()
            .is_some_and(|batch| batch.generation == generation);
        if current {
            state.pending.take()
        } else {
            None
        }
    }
}

impl<K: BatchKey, V: BatchValue> Coalescer<K, V> {
    /// Create a coalescer named `id` around `batch_fn`.
    ///
    /// `batch_fn` receives the distinct keys of one batch in submission
    /// order and must return exactly one result per key, in the same order.
    pub fn new<F, Fut>(id: impl Into<Arc<str>>, batch_fn: F) -> Self
    where
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BatchResult<V>> + Send + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                id: id.into(),
                batch_fn: Box::new(move |keys| batch_fn(keys).boxed()),
                state: Mutex::new(State {
                    generation: 0,
                    pending: None,
                }),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Load one key through the next batch.
    pub async fn load(&self, key: K) -> LoadResult<V> {
        let (waiter, ticket) = self.enqueue(key);
        if let Some(ticket) = ticket {
            ticket.settle_and_dispatch().await;
        }
        match waiter.await {
            Ok(result) => result,
            Err(oneshot::Canceled) => Err(LoadError::abandoned(self.inner.id.clone())),
        }
    }

    /// Load several keys into the same batch; results follow key order.
    pub async fn load_many(&self, keys: impl IntoIterator<Item = K>) -> Vec<LoadResult<V>> {
        join_all(keys.into_iter().map(|key| self.load(key))).await
    }

    fn enqueue(&self, key: K) -> (Waiter<V>, Option<FlushTicket<K, V>>) {
        let mut state = self.inner.lock();

        if let Some(batch) = state.pending.as_mut() {
            let waiter = match batch.waiters.get(&key) {
                Some(waiter) => waiter.clone(),
                None => batch.push(key),
            };
            return (waiter, None);
        }

        state.generation += 1;
        let generation = state.generation;
        let mut batch = PendingBatch::new(generation);
        let waiter = batch.push(key);
        state.pending = Some(batch);

        let ticket = FlushTicket {
            inner: Some(Arc::clone(&self.inner)),
            generation,
        };
        (waiter, Some(ticket))
    }
}

/// Held by the caller that opened a batch; dispatches it exactly once.
///
/// Dropping an armed ticket hands the dispatch to a spawned task so the
/// other waiters of the batch still complete.
struct FlushTicket<K: BatchKey, V: BatchValue> {
    inner: Option<Arc<Inner<K, V>>>,
    generation: u64,
}

impl<K: BatchKey, V: BatchValue> FlushTicket<K, V> {
    async fn settle_and_dispatch(mut self) {
        let mut seen = self.current_len();
        for _ in 0..MAX_SETTLE_ROUNDS {
            tokio::task::yield_now().await;
            let len = self.current_len();
            if len == seen {
                break;
            }
            seen = len;
        }

        if let Some(inner) = self.inner.take() {
            dispatch(inner, self.generation).await;
        }
    }

    fn current_len(&self) -> usize {
        self.inner
            .as_ref()
            .and_then(|inner| inner.pending_len(self.generation))
            .unwrap_or(0)
    }
}

impl<K: BatchKey, V: BatchValue> Drop for FlushTicket<K, V> {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        let generation = self.generation;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(loader = %inner.id, "dispatcher dropped, flushing batch in background");
                handle.spawn(dispatch(inner, generation));
            }
            Err(_) => {
                warn!(loader = %inner.id, "dispatcher dropped outside a runtime, abandoning batch");
                inner.take_pending(generation);
            }
        }
    }
}

async fn dispatch<K: BatchKey, V: BatchValue>(inner: Arc<Inner<K, V>>, generation: u64) {
    let Some(batch) = inner.take_pending(generation) else {
        return;
    };
    let PendingBatch { keys, senders, .. } = batch;
    let size = keys.len();
    debug!(loader = %inner.id, size, "dispatching batch");

    let outcome = match (inner.batch_fn)(keys).await {
        Ok(results) if results.len() == size => Ok(results),
        Ok(results) => Err(BatchError::length_mismatch(size, results.len())),
        Err(err) => Err(err),
    };

    match outcome {
        Ok(results) => {
            for (sender, result) in senders.into_iter().zip(results) {
                // receiver gone means the caller stopped waiting
                let _ = sender.send(result.map_err(LoadError::from));
            }
        }
        Err(err) => {
            warn!(loader = %inner.id, size, error = %err, "batch failed");
            let err = LoadError::batch(Arc::clone(&inner.id), err);
            for sender in senders {
                let _ = sender.send(Err(err.clone()));
            }
        }
    }
}

/// Coalescers of one request, keyed by loader id
#[derive(Default)]
pub struct BatchRegistry {
    loaders: Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coalescer registered under `id`, creating it around `batch_fn` on first use.
    ///
    /// On later calls `batch_fn` is ignored: the first registration decides
    /// how `id` is batched for the rest of the request.
    pub fn get_or_create<K, V, F, Fut>(&self, id: &str, batch_fn: F) -> Result<Coalescer<K, V>, ScopeError>
    where
        K: BatchKey,
        V: BatchValue,
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BatchResult<V>> + Send + 'static,
    {
        let mut loaders = self.loaders.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = loaders.get(id) {
            return existing
                .downcast_ref::<Coalescer<K, V>>()
                .cloned()
                .ok_or_else(|| ScopeError::loader_type_mismatch(id));
        }

        let coalescer = Coalescer::new(id, batch_fn);
        loaders.insert(id.to_owned(), Box::new(coalescer.clone()));
        debug!(loader = id, "registered loader");
        Ok(coalescer)
    }

    /// Number of registered loaders.
    pub fn len(&self) -> usize {
        self.loaders.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Load `key` through the current request's loader `id`.
///
/// The usual entry point for field resolution: every call site resolving
/// the same field passes the same `id`, and all of them share one batch.
pub async fn load_batched<K, V, F, Fut>(id: &str, key: K, batch_fn: F) -> LoadResult<V>
where
    K: BatchKey,
    V: BatchValue,
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BatchResult<V>> + Send + 'static,
{
    let scope = RequestScope::current()?;
    let coalescer = scope.registry().get_or_create(id, batch_fn)?;
    coalescer.load(key).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::{ready, Ready};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Calls = Arc<Mutex<Vec<Vec<u32>>>>;

    fn recording_loader(id: &str) -> (Coalescer<u32, String>, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let log = calls.clone();
        let coalescer = Coalescer::new(id, move |keys: Vec<u32>| {
            log.lock().unwrap().push(keys.clone());
            let results: BatchResult<String> =
                Ok(keys.iter().map(|k| Ok(format!("value-{}", k))).collect());
            ready(results)
        });
        (coalescer, calls)
    }

    fn batches(calls: &Calls) -> Vec<Vec<u32>> {
        calls.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn duplicate_keys_share_one_submission() {
        let (loader, calls) = recording_loader("Pokemon.name");

        let (a, b) = tokio::join!(loader.load(7), loader.load(7));

        assert_eq!(batches(&calls), vec![vec![7]]);
        assert_eq!(a.unwrap(), "value-7");
        assert_eq!(b.unwrap(), "value-7");
    }

    #[tokio::test]
    async fn siblings_coalesce_into_one_batch() {
        let (loader, calls) = recording_loader("Pokemon.name");

        let results = loader.load_many(1..=50).await;

        assert_eq!(batches(&calls), vec![(1..=50).collect::<Vec<_>>()]);
        assert_eq!(results[0].as_deref(), Ok("value-1"));
        assert_eq!(results[49].as_deref(), Ok("value-50"));
    }

    #[tokio::test]
    async fn sequential_loads_are_separate_batches() {
        let (loader, calls) = recording_loader("Pokemon.name");

        loader.load(1).await.unwrap();
        loader.load(1).await.unwrap();

        assert_eq!(batches(&calls), vec![vec![1], vec![1]]);
    }

    #[tokio::test]
    async fn per_key_errors_fail_only_their_key() {
        let loader = Coalescer::new("Pokemon.maxHp", |keys: Vec<u32>| {
            let results: BatchResult<u32> = Ok(keys
                .iter()
                .map(|&k| {
                    if k == 2 {
                        Err(KeyError::new("pokemon 2 not found"))
                    } else {
                        Ok(k * 100)
                    }
                })
                .collect());
            ready(results)
        });

        let (k1, k2, k3) = tokio::join!(loader.load(1), loader.load(2), loader.load(3));

        assert_eq!(k1, Ok(100));
        assert_eq!(k2, Err(LoadError::from(KeyError::new("pokemon 2 not found"))));
        assert_eq!(k3, Ok(300));
    }

    #[tokio::test]
    async fn batch_failure_fails_every_waiter() {
        let loader: Coalescer<u32, u32> = Coalescer::new("Pokemon.maxCp", |_keys: Vec<u32>| {
            let results: BatchResult<u32> = Err(BatchError::new("store offline"));
            ready(results)
        });

        let (a, b) = tokio::join!(loader.load(1), loader.load(2));

        let expected = LoadError::batch("Pokemon.maxCp".into(), BatchError::new("store offline"));
        assert_eq!(a, Err(expected.clone()));
        assert_eq!(b, Err(expected));
    }

    #[tokio::test]
    async fn wrong_result_length_fails_the_batch() {
        let loader: Coalescer<u32, u32> = Coalescer::new("Pokemon.fleeRate", |_keys: Vec<u32>| {
            let results: BatchResult<u32> = Ok(vec![Ok(1)]);
            ready(results)
        });

        let (a, b) = tokio::join!(loader.load(1), loader.load(2));

        assert!(matches!(a, Err(LoadError::Batch { .. })));
        assert!(matches!(b, Err(LoadError::Batch { .. })));
    }

    #[tokio::test]
    async fn dropped_dispatcher_still_flushes() {
        let (loader, calls) = recording_loader("Pokemon.name");

        let mut dispatcher = Box::pin(loader.load(1));
        assert!(futures::poll!(dispatcher.as_mut()).is_pending());
        let follower = loader.load(2);
        drop(dispatcher);

        assert_eq!(follower.await.unwrap(), "value-2");
        assert_eq!(batches(&calls), vec![vec![1, 2]]);
    }

    #[tokio::test]
    async fn by_address_keys_compare_by_allocation() {
        let (loader, calls) = {
            let calls: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
            let log = calls.clone();
            let loader = Coalescer::new("Pokemon.types", move |keys: Vec<ByAddress<String>>| {
                log.lock().unwrap().push(keys.len());
                let results: BatchResult<String> =
                    Ok(keys.iter().map(|k| Ok(k.to_uppercase())).collect());
                ready(results)
            });
            (loader, calls)
        };

        let first = Arc::new("pikachu".to_owned());
        let lookalike = Arc::new("pikachu".to_owned());

        let (a, b, c) = tokio::join!(
            loader.load(ByAddress(first.clone())),
            loader.load(ByAddress(first.clone())),
            loader.load(ByAddress(lookalike)),
        );

        assert_eq!(*calls.lock().unwrap(), vec![2]);
        assert_eq!(a.unwrap(), "PIKACHU");
        assert_eq!(b.unwrap(), "PIKACHU");
        assert_eq!(c.unwrap(), "PIKACHU");
    }

    fn counting(counter: Arc<AtomicUsize>) -> impl Fn(Vec<u32>) -> Ready<BatchResult<u32>> + Send + Sync + 'static {
        move |keys: Vec<u32>| {
            counter.fetch_add(1, Ordering::SeqCst);
            ready(Ok(keys.into_iter().map(Ok).collect()))
        }
    }

    #[tokio::test]
    async fn registry_reuses_first_registration() {
        let registry = BatchRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let a = registry.get_or_create("Pokemon.code", counting(first.clone())).unwrap();
        let b = registry.get_or_create("Pokemon.code", counting(second.clone())).unwrap();
        assert_eq!(registry.len(), 1);

        let (x, y) = tokio::join!(a.load(1), b.load(2));
        assert_eq!((x, y), (Ok(1), Ok(2)));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn registry_rejects_mismatched_types() {
        let registry = BatchRegistry::new();
        registry
            .get_or_create("Pokemon.code", counting(Arc::new(AtomicUsize::new(0))))
            .unwrap();

        let err = registry
            .get_or_create("Pokemon.code", |keys: Vec<String>| {
                let results: BatchResult<String> = Ok(keys.into_iter().map(Ok).collect());
                ready(results)
            })
            .err()
            .unwrap();
        assert_eq!(err, ScopeError::loader_type_mismatch("Pokemon.code"));
    }

    #[tokio::test]
    async fn load_batched_requires_a_scope() {
        let err = load_batched("Pokemon.code", 1u32, counting(Arc::new(AtomicUsize::new(0))))
            .await
            .unwrap_err();
        assert_eq!(err, LoadError::Scope(ScopeError::NoActiveScope));
    }

    #[tokio::test]
    async fn load_batched_coalesces_within_scope() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scope = RequestScope::new("req-batch");

        let results = scope
            .run(async {
                let resolve = |key: u32| load_batched("Pokemon.code", key, counting(counter.clone()));
                tokio::join!(resolve(1), resolve(1), resolve(2))
            })
            .await;

        assert_eq!(results, (Ok(1), Ok(1), Ok(2)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
