//! Auth state change subscribers

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, Weak,
    },
};

use entities::User;

/// Callback invoked with the current user on every session change.
pub type Listener = Arc<dyn Fn(Option<&User>) + Send + Sync>;

struct Entry {
    id: u64,
    /// Session version the listener was registered at.
    since: u64,
    listener: Listener,
}

type ListenerList = Mutex<Vec<Entry>>;

/// Ordered registry of session listeners
#[derive(Default)]
pub struct Subscribers {
    listeners: Arc<ListenerList>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.len())
            .finish()
    }
}

impl Subscribers {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener at the end of the dispatch order
    ///
    /// The listener only receives versions newer than `since`.
    pub fn add(&self, listener: Listener, since: u64) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Entry {
                id,
                since,
                listener,
            });
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Returns true if no listener is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke, in registration order, every listener registered before
    /// `version`
    ///
    /// Listeners run outside the registry lock, so a listener may subscribe
    /// or unsubscribe. A panicking listener is logged and skipped.
    pub fn dispatch(&self, version: u64, user: Option<&User>) {
        let targets: Vec<(u64, Listener)> = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|entry| entry.since < version)
            .map(|entry| (entry.id, Arc::clone(&entry.listener)))
            .collect();

        for (id, listener) in targets {
            invoke(id, &listener, user);
        }
    }

    /// Invoke a single listener, if it is still registered
    pub fn dispatch_to(&self, id: u64, user: Option<&User>) {
        let target = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| Arc::clone(&entry.listener));

        if let Some(listener) = target {
            invoke(id, &listener, user);
        }
    }
}

fn invoke(id: u64, listener: &Listener, user: Option<&User>) {
    if catch_unwind(AssertUnwindSafe(|| listener(user))).is_err() {
        tracing::error!(subscriber_id = id, "Auth state listener panicked");
    }
}

/// Handle returned by a registration; removes the listener on `unsubscribe`
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerList>,
}

impl Subscription {
    /// Registration id, unique within its registry
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the listener. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|entry| entry.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Listener {
        let log = Arc::clone(log);
        Arc::new(move |user: Option<&User>| {
            let who = user.map(|u| u.email.clone()).unwrap_or_default();
            log.lock().unwrap().push(format!("{}:{}", name, who));
        })
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let subscribers = Subscribers::new();
        let _a = subscribers.add(recorder(&log, "a"), 0);
        let _b = subscribers.add(recorder(&log, "b"), 0);

        let user = User::demo();
        subscribers.dispatch(1, Some(&user));
        subscribers.dispatch(1, None);

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:demo@discoveryai.com",
                "b:demo@discoveryai.com",
                "a:",
                "b:"
            ]
        );
    }

    #[test]
    fn test_unsubscribe_only_removes_own_listener() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let subscribers = Subscribers::new();
        let a = subscribers.add(recorder(&log, "a"), 0);
        let _b = subscribers.add(recorder(&log, "b"), 0);
        assert_eq!(subscribers.len(), 2);

        a.unsubscribe();
        a.unsubscribe();
        assert_eq!(subscribers.len(), 1);

        subscribers.dispatch(1, None);
        assert_eq!(*log.lock().unwrap(), vec!["b:"]);
    }

    #[test]
    fn test_same_callback_registered_twice() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let subscribers = Subscribers::new();
        let listener = recorder(&log, "x");
        let first = subscribers.add(Arc::clone(&listener), 0);
        let _second = subscribers.add(listener, 0);

        first.unsubscribe();
        subscribers.dispatch(1, None);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let subscribers = Subscribers::new();
        let _bad = subscribers.add(Arc::new(|_: Option<&User>| panic!("listener failure")), 0);
        let _good = subscribers.add(recorder(&log, "good"), 0);

        subscribers.dispatch(1, None);
        assert_eq!(*log.lock().unwrap(), vec!["good:"]);
    }

    #[test]
    fn test_dispatch_skips_listeners_registered_at_or_after_version() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let subscribers = Subscribers::new();
        let _old = subscribers.add(recorder(&log, "old"), 2);
        let _new = subscribers.add(recorder(&log, "new"), 3);

        subscribers.dispatch(3, None);
        subscribers.dispatch(4, None);

        assert_eq!(*log.lock().unwrap(), vec!["old:", "old:", "new:"]);
    }

    #[test]
    fn test_dispatch_to_single_listener() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let subscribers = Subscribers::new();
        let _a = subscribers.add(recorder(&log, "a"), 0);
        let b = subscribers.add(recorder(&log, "b"), 0);

        subscribers.dispatch_to(b.id(), None);
        b.unsubscribe();
        subscribers.dispatch_to(b.id(), None);

        assert_eq!(*log.lock().unwrap(), vec!["b:"]);
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped() {
        let subscribers = Subscribers::new();
        let sub = subscribers.add(Arc::new(|_: Option<&User>| {}), 0);
        drop(subscribers);
        sub.unsubscribe();
    }
}
