//! Session store
//!
//! [`SessionStore`] is the single source of truth for "who is logged in". It
//! holds an in-memory user directory, the current user and a listener list,
//! and mirrors the current user into a [`SessionStorage`] slot so a session
//! survives restarts. Signup and signin simulate remote latency.
//!
//! Every successful mutation writes storage first and only then updates
//! memory, so the two never disagree. Each mutation queues exactly one
//! notification while still holding the state lock, so notifications are
//! delivered in commit order; failed calls queue nothing. Listeners run with
//! no store lock held.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use entities::{ProfileUpdate, User};
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::{AuthError, AuthResult, SessionStorage, Subscribers, Subscription};

/// Default simulated latency of signup and signin.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(1000);

/// Default storage slot holding the session snapshot.
pub const DEFAULT_SESSION_SLOT: &str = "auth_user";

/// Session store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Delay applied before signup and signin take effect.
    pub latency: Duration,
    /// Storage slot name.
    pub slot: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            latency: DEFAULT_LATENCY,
            slot: DEFAULT_SESSION_SLOT.to_string(),
        }
    }
}

impl StoreConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the simulated latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Sets the storage slot.
    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = slot.into();
        self
    }
}

/// Logical session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated(User),
}

impl AuthState {
    /// Returns the authenticated user, if any.
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(user),
        }
    }

    /// Returns true if a user is authenticated.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl From<Option<User>> for AuthState {
    fn from(user: Option<User>) -> Self {
        user.map_or(Self::Anonymous, Self::Authenticated)
    }
}

#[derive(Debug)]
struct Inner {
    directory: Vec<User>,
    current: Option<User>,
    /// Bumped on every committed mutation.
    version: u64,
}

impl Inner {
    fn find(&self, email: &str) -> Option<&User> {
        self.directory.iter().find(|u| u.email == email)
    }
}

#[derive(Debug)]
enum Delivery {
    /// A committed change, for every listener registered before `version`.
    Broadcast { version: u64, user: Option<User> },
    /// The registration-time callback of one listener.
    Initial { id: u64, user: Option<User> },
}

/// Notifications waiting for delivery, in commit order.
#[derive(Debug, Default)]
struct Outbox {
    pending: VecDeque<Delivery>,
    draining: bool,
}

/// In-memory session store with a durable session mirror
#[derive(Debug)]
pub struct SessionStore<S: SessionStorage> {
    config: StoreConfig,
    storage: S,
    inner: Mutex<Inner>,
    /// Lock order is `inner` before `outbox`; neither is held while
    /// listeners run.
    outbox: Mutex<Outbox>,
    subscribers: Subscribers,
    watch_tx: watch::Sender<Option<User>>,
}

impl<S: SessionStorage> SessionStore<S> {
    /// Creates a store whose directory holds only the demo account.
    pub fn new(storage: S, config: StoreConfig) -> Self {
        Self::with_directory(storage, config, vec![User::demo()])
    }

    /// Creates a store with an explicit initial directory.
    ///
    /// Entries with an email already seen earlier in `directory` are dropped.
    /// The persisted session is read here and nowhere else.
    pub fn with_directory(storage: S, config: StoreConfig, directory: Vec<User>) -> Self {
        let mut unique: Vec<User> = Vec::with_capacity(directory.len());
        for user in directory {
            if unique.iter().any(|u| u.email == user.email) {
                warn!(email = %user.email, "Dropping duplicate directory entry");
                continue;
            }
            unique.push(user);
        }

        let current = restore_session(&storage, &config.slot);
        let (watch_tx, _) = watch::channel(current.clone());

        Self {
            config,
            storage,
            inner: Mutex::new(Inner {
                directory: unique,
                current,
                version: 0,
            }),
            outbox: Mutex::new(Outbox::default()),
            subscribers: Subscribers::new(),
            watch_tx,
        }
    }

    /// Wraps the store in an [`Arc`] for sharing with consumers.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Registers a new account and makes it the current user.
    ///
    /// The password is accepted for interface parity and otherwise ignored.
    pub async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        full_name: &str,
        company_name: Option<&str>,
    ) -> AuthResult<User> {
        tokio::time::sleep(self.config.latency).await;

        let mut inner = self.lock()?;
        if inner.find(email).is_some() {
            warn!(email, "Signup rejected: user already exists");
            return Err(AuthError::UserExists);
        }

        let mut user = User::new(email, full_name);
        if let Some(company_name) = company_name {
            user = user.with_company_name(company_name);
        }

        self.persist(Some(&user))?;
        inner.directory.push(user.clone());
        inner.current = Some(user.clone());
        debug!(user_id = %user.id, email, "User signed up");

        self.commit(&mut inner);
        drop(inner);
        self.drain();
        Ok(user)
    }

    /// Makes the directory entry for `email` the current user.
    ///
    /// Only the email is checked; the password is ignored.
    pub async fn sign_in(&self, email: &str, _password: &str) -> AuthResult<User> {
        tokio::time::sleep(self.config.latency).await;

        let mut inner = self.lock()?;
        let user = match inner.find(email) {
            Some(user) => user.clone(),
            None => {
                warn!(email, "Signin rejected: unknown email");
                return Err(AuthError::InvalidCredentials);
            }
        };

        self.persist(Some(&user))?;
        inner.current = Some(user.clone());
        debug!(user_id = %user.id, email, "User signed in");

        self.commit(&mut inner);
        drop(inner);
        self.drain();
        Ok(user)
    }

    /// Clears the session. Succeeds whether or not a user was signed in.
    pub fn sign_out(&self) -> AuthResult<()> {
        let mut inner = self.lock()?;

        self.persist(None)?;
        if let Some(user) = inner.current.take() {
            debug!(user_id = %user.id, "User signed out");
        }

        self.commit(&mut inner);
        drop(inner);
        self.drain();
        Ok(())
    }

    /// Merges `update` into the current user.
    ///
    /// The directory entry with the same id is rewritten as well, so a later
    /// signin returns the updated profile.
    pub fn update_profile(&self, update: ProfileUpdate) -> AuthResult<User> {
        let mut inner = self.lock()?;
        let Some(current) = inner.current.as_ref() else {
            warn!("Profile update rejected: no user logged in");
            return Err(AuthError::NoUserLoggedIn);
        };

        let updated = update.apply(current);
        self.persist(Some(&updated))?;

        if let Some(entry) = inner.directory.iter_mut().find(|u| u.id == updated.id) {
            *entry = updated.clone();
        }
        inner.current = Some(updated.clone());
        debug!(user_id = %updated.id, "Profile updated");

        self.commit(&mut inner);
        drop(inner);
        self.drain();
        Ok(updated)
    }

    /// Returns the current user without consulting storage.
    pub fn get_current_user(&self) -> Option<User> {
        self.lock_recover().current.clone()
    }

    /// Returns the logical session state.
    pub fn state(&self) -> AuthState {
        self.get_current_user().into()
    }

    /// Looks up a directory entry by exact email.
    pub fn find_user(&self, email: &str) -> Option<User> {
        self.lock_recover().find(email).cloned()
    }

    /// Returns a snapshot of the directory.
    pub fn directory(&self) -> Vec<User> {
        self.lock_recover().directory.clone()
    }

    /// Registers `callback` and immediately invokes it with the current user.
    ///
    /// Callbacks run synchronously on the calling thread with no store lock
    /// held, so they may call any store method, including this one. A
    /// notification raised from inside a callback is delivered once that
    /// callback returns. If another thread is already delivering, that thread
    /// runs the callback instead.
    pub fn on_auth_state_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&User>) + Send + Sync + 'static,
    {
        let inner = self.lock_recover();
        let subscription = self.subscribers.add(Arc::new(callback), inner.version);
        self.enqueue(Delivery::Initial {
            id: subscription.id(),
            user: inner.current.clone(),
        });
        drop(inner);

        self.drain();
        subscription
    }

    /// Returns a receiver that always holds the latest current user.
    pub fn watch(&self) -> watch::Receiver<Option<User>> {
        self.watch_tx.subscribe()
    }

    /// Number of registered callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn lock(&self) -> AuthResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| AuthError::unexpected(format!("Lock poisoned: {}", e)))
    }

    fn lock_recover(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, user: Option<&User>) -> AuthResult<()> {
        let result = match user {
            Some(user) => serde_json::to_string(user)
                .map_err(AuthError::from)
                .and_then(|json| {
                    self.storage
                        .write(&self.config.slot, &json)
                        .map_err(AuthError::from)
                }),
            None => self
                .storage
                .remove(&self.config.slot)
                .map_err(AuthError::from),
        };

        if let Err(e) = &result {
            error!(
                slot = %self.config.slot,
                error = ?e,
                "Failed to persist session"
            );
        }
        result
    }

    /// Records a committed mutation. Must be called with the state lock held.
    fn commit(&self, inner: &mut Inner) {
        inner.version += 1;
        self.watch_tx.send_replace(inner.current.clone());
        self.enqueue(Delivery::Broadcast {
            version: inner.version,
            user: inner.current.clone(),
        });
    }

    fn enqueue(&self, delivery: Delivery) {
        self.lock_outbox().pending.push_back(delivery);
    }

    fn lock_outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Delivers queued notifications until the outbox is empty. Returns at
    /// once if a delivery loop is already running; that loop picks up
    /// whatever was queued.
    fn drain(&self) {
        {
            let mut outbox = self.lock_outbox();
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }

        loop {
            let next = {
                let mut outbox = self.lock_outbox();
                match outbox.pending.pop_front() {
                    Some(delivery) => delivery,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };

            match next {
                Delivery::Broadcast { version, user } => {
                    self.subscribers.dispatch(version, user.as_ref())
                }
                Delivery::Initial { id, user } => self.subscribers.dispatch_to(id, user.as_ref()),
            }
        }
    }
}

fn restore_session<S: SessionStorage>(storage: &S, slot: &str) -> Option<User> {
    let raw = match storage.read(slot) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(slot, error = %e, "Failed to read persisted session");
            return None;
        }
    };

    match serde_json::from_str::<User>(&raw) {
        Ok(user) => {
            debug!(user_id = %user.id, "Restored persisted session");
            Some(user)
        }
        Err(e) => {
            warn!(slot, error = %e, "Ignoring malformed persisted session");
            None
        }
    }
}
