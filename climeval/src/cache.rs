//! A size limited LRU (least recently used) cache for decoded array chunks.
//!
use std::{collections::HashMap, fmt::Debug, hash::Hash, sync::Arc};

use futures::{
    channel::oneshot::{channel, Sender},
    future::BoxFuture,
};
use parking_lot::Mutex;

use crate::errors::{Error, Result};

/// A trait for objects that can be cached
///
/// Cacheable objects must be able to self report their size via the ``size`` method.
///
pub trait Cacheable: Sized {
    /// Return the approximate number of bytes this object occupies in RAM
    fn size(&self) -> u64;
}

/// An LRU cache shared by every reader of a store.
///
/// The total of the sizes of the objects held is kept at or below ``limit``. When an insertion
/// pushes the total over the limit, objects are evicted starting with the one used longest ago.
/// An object larger than the limit is handed to its caller but never retained.
///
/// On a miss, ``get`` runs the supplied loader. Concurrent requests for a key that is already
/// being loaded wait for that load instead of starting another one, so every chunk is read and
/// decoded once no matter how many tasks ask for it.
///
pub struct Cache<K, V>
where
    K: Eq + Hash + Copy + Debug,
    V: Cacheable,
{
    recent: Mutex<Recency<K, V>>,
    loading: Mutex<HashMap<K, Arc<Pending<V>>>>,
}

/// A load in progress, and the tasks waiting on it
struct Pending<V>
where
    V: Cacheable,
{
    outcome: Mutex<Option<Result<Arc<V>>>>,
    waiters: Mutex<Vec<Sender<Result<Arc<V>>>>>,
}

/// Cached objects, threaded on a doubly linked list from most to least recently used.
///
struct Recency<K, V>
where
    K: Eq + Hash + Copy + Debug,
    V: Cacheable,
{
    limit: u64,
    size: u64,
    map: HashMap<K, Slot<K, V>>,
    head: Option<K>,
    tail: Option<K>,
}

struct Slot<K, V>
where
    K: Eq + Hash + Copy + Debug,
    V: Cacheable,
{
    object: Arc<V>,
    size: u64,

    /// Neighbor used more recently, towards ``head``
    newer: Option<K>,

    /// Neighbor used less recently, towards ``tail``
    older: Option<K>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Copy + Debug,
    V: Cacheable,
{
    /// Instantiate an empty cache with given size limit, in bytes.
    ///
    pub fn new(limit: u64) -> Self {
        Self {
            recent: Mutex::new(Recency {
                limit,
                size: 0,
                map: HashMap::new(),
                head: None,
                tail: None,
            }),
            loading: Mutex::new(HashMap::new()),
        }
    }

    /// Get an object by key, calling ``load`` on a cache miss.
    ///
    /// ``load`` returning ``Ok(None)`` means the object doesn't exist, which is reported as
    /// ``Error::Load``.
    ///
    pub async fn get<L>(&self, key: &K, load: L) -> Result<Arc<V>>
    where
        L: FnOnce(K) -> BoxFuture<'static, Result<Option<V>>>,
    {
        if let Some(object) = self.recent.lock().touch(key) {
            return Ok(object);
        }

        self.load(*key, load).await
    }

    /// Number of bytes currently held
    pub fn size(&self) -> u64 {
        self.recent.lock().size
    }

    async fn load<L>(&self, key: K, load: L) -> Result<Arc<V>>
    where
        L: FnOnce(K) -> BoxFuture<'static, Result<Option<V>>>,
    {
        let (first, pending) = {
            let mut loading = self.loading.lock();
            match loading.get(&key) {
                Some(pending) => (false, Arc::clone(pending)),
                None => {
                    let pending = Arc::new(Pending::new());
                    loading.insert(key, Arc::clone(&pending));

                    (true, pending)
                }
            }
        };

        if !first {
            return pending.wait().await;
        }

        let result = match load(key).await {
            Ok(Some(object)) => {
                let object = Arc::new(object);
                self.recent.lock().insert(key, &object);

                Ok(object)
            }
            Ok(None) => Err(Error::Load),
            Err(err) => Err(err),
        };

        pending.finish(&result);
        self.loading.lock().remove(&key);

        result
    }
}

impl<V> Pending<V>
where
    V: Cacheable,
{
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            waiters: Mutex::new(Vec::new()),
        }
    }

    fn share(result: &Result<Arc<V>>) -> Result<Arc<V>> {
        match result {
            Ok(object) => Ok(Arc::clone(object)),
            Err(_) => Err(Error::Load),
        }
    }

    /// Record the outcome of the load and wake everyone waiting on it.
    ///
    fn finish(&self, result: &Result<Arc<V>>) {
        let mut waiters = self.waiters.lock();
        *self.outcome.lock() = Some(Self::share(result));
        for waiter in waiters.drain(..) {
            // A waiter that has gone away doesn't need to hear about it
            let _ = waiter.send(Self::share(result));
        }
    }

    async fn wait(&self) -> Result<Arc<V>> {
        let receive = {
            let mut waiters = self.waiters.lock();
            if let Some(outcome) = &*self.outcome.lock() {
                return Self::share(outcome);
            }
            let (send, receive) = channel::<Result<Arc<V>>>();
            waiters.push(send);

            receive
        };

        receive.await.unwrap_or(Err(Error::Load))
    }
}

impl<K, V> Recency<K, V>
where
    K: Eq + Hash + Copy + Debug,
    V: Cacheable,
{
    /// Look up an object and, if present, mark it as most recently used.
    ///
    fn touch(&mut self, key: &K) -> Option<Arc<V>> {
        let slot = self.unlink(key)?;
        let object = Arc::clone(&slot.object);
        self.push_head(*key, slot);

        Some(object)
    }

    fn insert(&mut self, key: K, object: &Arc<V>) {
        if let Some(old) = self.unlink(&key) {
            self.size -= old.size;
        }

        let size = object.size();
        self.size += size;
        let slot = Slot {
            object: Arc::clone(object),
            size,
            newer: None,
            older: None,
        };
        self.push_head(key, slot);

        while self.size > self.limit {
            let Some(tail) = self.tail else { break };
            if let Some(evicted) = self.unlink(&tail) {
                self.size -= evicted.size;
            }
        }
    }

    /// Remove a slot from the map and splice its neighbors together.
    ///
    fn unlink(&mut self, key: &K) -> Option<Slot<K, V>> {
        let slot = self.map.remove(key)?;

        match slot.newer {
            Some(newer) => {
                if let Some(neighbor) = self.map.get_mut(&newer) {
                    neighbor.older = slot.older;
                }
            }
            None => self.head = slot.older,
        }

        match slot.older {
            Some(older) => {
                if let Some(neighbor) = self.map.get_mut(&older) {
                    neighbor.newer = slot.newer;
                }
            }
            None => self.tail = slot.newer,
        }

        Some(slot)
    }

    fn push_head(&mut self, key: K, mut slot: Slot<K, V>) {
        slot.newer = None;
        slot.older = self.head;
        if let Some(old_head) = self.head {
            if let Some(neighbor) = self.map.get_mut(&old_head) {
                neighbor.newer = Some(key);
            }
        }
        self.head = Some(key);
        if self.tail.is_none() {
            self.tail = Some(key);
        }
        self.map.insert(key, slot);
    }
}
