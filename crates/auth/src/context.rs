//! View-layer boundary over the session store
//!
//! [`AuthContext`] is what UI code talks to: a `{ user, loading }` snapshot
//! plus the four session operations. Every operation returns either its
//! result or an [`ErrorBody`]; internal faults and panics are reported with
//! the generic unexpected-error message and never escape.

use std::{
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use entities::{ProfileUpdate, User};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::watch;
use tracing::error;

use crate::{AuthError, ErrorBody, SessionStorage, SessionStore, Subscription};

/// What the view layer renders from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSnapshot {
    /// The signed-in user, if any.
    pub user: Option<User>,
    /// True until the context has attached and while an operation is in flight.
    pub loading: bool,
}

impl AuthSnapshot {
    fn initial() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }
}

#[derive(Debug)]
struct Shared {
    tx: watch::Sender<AuthSnapshot>,
    in_flight: AtomicUsize,
}

impl Shared {
    fn refresh_loading(&self) {
        let loading = self.in_flight.load(Ordering::SeqCst) > 0;
        self.tx.send_if_modified(|s| {
            let changed = s.loading != loading;
            s.loading = loading;
            changed
        });
    }
}

/// Marks an operation as in flight until dropped.
struct InFlight<'a>(&'a Shared);

impl<'a> InFlight<'a> {
    fn start(shared: &'a Shared) -> Self {
        shared.in_flight.fetch_add(1, Ordering::SeqCst);
        shared.refresh_loading();
        Self(shared)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.0.refresh_loading();
    }
}

/// Consumer handle over a shared [`SessionStore`]
pub struct AuthContext<S: SessionStorage + 'static> {
    store: Arc<SessionStore<S>>,
    shared: Arc<Shared>,
    subscription: Subscription,
}

impl<S: SessionStorage + 'static> std::fmt::Debug for AuthContext<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("snapshot", &self.snapshot())
            .field("subscription", &self.subscription)
            .finish()
    }
}

impl<S: SessionStorage + 'static> AuthContext<S> {
    /// Attaches to `store` and starts tracking its current user.
    pub fn attach(store: Arc<SessionStore<S>>) -> Self {
        let (tx, _) = watch::channel(AuthSnapshot::initial());
        let shared = Arc::new(Shared {
            tx,
            in_flight: AtomicUsize::new(0),
        });

        let listener = Arc::clone(&shared);
        let subscription = store.on_auth_state_change(move |user| {
            let loading = listener.in_flight.load(Ordering::SeqCst) > 0;
            listener.tx.send_replace(AuthSnapshot {
                user: user.cloned(),
                loading,
            });
        });

        Self {
            store,
            shared,
            subscription,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<SessionStore<S>> {
        &self.store
    }

    /// Returns the current `{ user, loading }` snapshot.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.shared.tx.borrow().clone()
    }

    /// Returns the signed-in user, if any.
    pub fn user(&self) -> Option<User> {
        self.shared.tx.borrow().user.clone()
    }

    /// Returns true while an operation is in flight.
    pub fn loading(&self) -> bool {
        self.shared.tx.borrow().loading
    }

    /// Returns a receiver notified on every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.shared.tx.subscribe()
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        company_name: Option<&str>,
    ) -> Result<User, ErrorBody> {
        let _loading = InFlight::start(&self.shared);
        guarded(
            "sign_up",
            self.store.sign_up(email, password, full_name, company_name),
        )
        .await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, ErrorBody> {
        let _loading = InFlight::start(&self.shared);
        guarded("sign_in", self.store.sign_in(email, password)).await
    }

    pub async fn sign_out(&self) -> Result<(), ErrorBody> {
        let _loading = InFlight::start(&self.shared);
        guarded("sign_out", async move { self.store.sign_out() }).await
    }

    /// Applies a profile update. Does not toggle `loading`.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User, ErrorBody> {
        if self.user().is_none() {
            return Err(AuthError::NoUserLoggedIn.to_body());
        }
        guarded("update_profile", async move { self.store.update_profile(update) }).await
    }
}

impl<S: SessionStorage + 'static> Drop for AuthContext<S> {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

/// Runs a store call, mapping errors and panics to an [`ErrorBody`].
async fn guarded<T, F>(operation: &'static str, fut: F) -> Result<T, ErrorBody>
where
    F: Future<Output = Result<T, AuthError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            if let AuthError::Unexpected(source) = &e {
                error!(operation, error = %source, "Auth operation failed");
            }
            Err(e.to_body())
        }
        Err(_) => {
            error!(operation, "Auth operation panicked");
            Err(ErrorBody::unexpected())
        }
    }
}
