use std::sync::{Arc, RwLock, Weak};

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct ObservableInner<T> {
    value: T,
    observers: Vec<(u64, Observer<T>)>,
    next_id: u64,
    /// Bumped on every `set`.
    version: u64,
}

/// A value that notifies observers whenever it is replaced.
///
/// Observers run after the internal lock is released, so they may read or
/// even set the observable again. A value replaced by an observer is not
/// delivered to the remaining observers, which only get the newer one.
pub struct Observable<T> {
    inner: Arc<RwLock<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Detaches its observer when dropped or explicitly unsubscribed.
pub struct ObserverHandle {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ObserverHandle {
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl<T> Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ObservableInner {
                value,
                observers: Vec::new(),
                next_id: 0,
                version: 0,
            })),
        }
    }

    pub fn get(&self) -> T {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).value.clone()
    }

    pub fn set(&self, value: T) {
        let (version, observers) = {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            inner.value = value.clone();
            inner.version += 1;
            let observers = inner.observers.iter().map(|(_, o)| o.clone()).collect::<Vec<_>>();
            (inner.version, observers)
        };
        for observer in observers {
            if self.version() != version {
                // superseded by a nested `set`, which already notified everybody
                break;
            }
            observer(&value);
        }
    }

    fn version(&self) -> u64 {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).version
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut value = self.get();
        f(&mut value);
        self.set(value);
    }

    /// Registers `observer` and immediately calls it with the current value.
    pub fn subscribe(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> ObserverHandle {
        let observer: Observer<T> = Arc::new(observer);
        let (handle, current) = self.attach(observer.clone());
        observer(&current);
        handle
    }

    /// Registers `observer` for future values only.
    pub fn on_change(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> ObserverHandle {
        self.attach(Arc::new(observer)).0
    }

    pub fn observer_count(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).observers.len()
    }

    fn attach(&self, observer: Observer<T>) -> (ObserverHandle, T) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let id = inner.next_id;
        inner.next_id += 1;
        inner.observers.push((id, observer));

        let weak: Weak<RwLock<ObservableInner<T>>> = Arc::downgrade(&self.inner);
        let handle = ObserverHandle {
            detach: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let mut inner = inner.write().unwrap_or_else(|e| e.into_inner());
                    inner.observers.retain(|(other, _)| *other != id);
                }
            })),
        };
        (handle, inner.value.clone())
    }
}

/// A value computed from two observables and recomputed whenever either changes.
///
/// Recomputation always reads both sources, so the derived value matches their
/// current values even when a notification arrives late.
pub struct Derived<T> {
    value: Observable<T>,
    _sources: [ObserverHandle; 2],
}

impl<T> Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<A, B, F>(a: &Observable<A>, b: &Observable<B>, derive: F) -> Self
    where
        A: Clone + Send + Sync + 'static,
        B: Clone + Send + Sync + 'static,
        F: Fn(&A, &B) -> T + Send + Sync + 'static,
    {
        let value = Observable::new(derive(&a.get(), &b.get()));

        let recompute = {
            let (a, b) = (a.clone(), b.clone());
            Arc::new(move || derive(&a.get(), &b.get()))
        };
        let on_a = {
            let (recompute, value) = (recompute.clone(), value.clone());
            a.on_change(move |_| value.set(recompute()))
        };
        let on_b = {
            let value = value.clone();
            b.on_change(move |_| value.set(recompute()))
        };

        Self {
            value,
            _sources: [on_a, on_b],
        }
    }

    pub fn get(&self) -> T {
        self.value.get()
    }

    pub fn subscribe(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> ObserverHandle {
        self.value.subscribe(observer)
    }

    pub fn on_change(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> ObserverHandle {
        self.value.on_change(observer)
    }
}
