//! Locking service for topology elements
//!
//! A lock gives one client exclusive access to a topology element for a
//! lease. The lease counts down in real time; when it runs out the service
//! releases the lock itself and publishes [`LockEvent::Expired`].
//!
//! # Methods
//!
//! - InitLock(Context) - take the lock for the calling client
//! - RenewLock() - restart the lease, owner only
//! - ExitLock() - release the lock, owner only
//! - BreakLock() - release the lock regardless of owner
//!
//! Every method reports an Int32 status: [`STATUS_OK`], [`STATUS_CONFLICT`]
//! for AlreadyLocked/NotLocked and [`STATUS_ACCESS_DENIED`].

use di_core::{DiError, DiResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const STATUS_OK: i32 = 0;
pub const STATUS_CONFLICT: i32 = -1;
pub const STATUS_ACCESS_DENIED: i32 = -2;

/// Default lease of a lock
pub const DEFAULT_LEASE: Duration = Duration::from_secs(30);

const EVENT_CAPACITY: usize = 16;

/// Identity of the calling client, supplied by the session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerIdentity {
    pub client_id: String,
    pub user_id: String,
}

impl CallerIdentity {
    pub fn new(client_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// Snapshot of a lock, as exposed by the LockingServices variables
#[derive(Debug, Clone, PartialEq)]
pub struct LockState {
    pub locked: bool,
    pub locking_client: String,
    pub locking_user: String,
    pub remaining_lock_time: Duration,
    pub context: String,
}

impl LockState {
    fn unlocked() -> Self {
        Self {
            locked: false,
            locking_client: String::new(),
            locking_user: String::new(),
            remaining_lock_time: Duration::ZERO,
            context: String::new(),
        }
    }
}

/// Lock lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    Acquired { client_id: String, user_id: String },
    Renewed { client_id: String },
    Released { client_id: String },
    Broken { client_id: String, broken_by: String },
    /// The lease ran out and the service released the lock
    Expired { client_id: String },
}

#[derive(Debug)]
struct Holder {
    client_id: String,
    user_id: String,
    context: String,
    deadline: Instant,
}

#[derive(Debug, Default)]
struct LockInner {
    holder: Option<Holder>,
    /// Bumped on every acquire, renew and release; an expiry timer only
    /// fires if the generation it was armed with is still current
    generation: u64,
    expiry_task: Option<JoinHandle<()>>,
}

impl LockInner {
    fn release(&mut self) -> Option<Holder> {
        self.generation = self.generation.wrapping_add(1);
        if let Some(task) = self.expiry_task.take() {
            task.abort();
        }
        self.holder.take()
    }

    /// Release the lock if its lease has run out
    fn expire_if_due(&mut self, name: &str, events: &broadcast::Sender<LockEvent>) {
        let due = self
            .holder
            .as_ref()
            .is_some_and(|h| Instant::now() >= h.deadline);
        if due {
            if let Some(holder) = self.release() {
                log::info!("Lock {} held by {} expired", name, holder.client_id);
                let _ = events.send(LockEvent::Expired {
                    client_id: holder.client_id,
                });
            }
        }
    }
}

/// Lock of one topology element
///
/// Each element owns its own service; state is guarded by one mutex so
/// concurrent callers are serialized.
#[derive(Debug)]
pub struct LockingService {
    name: String,
    lease: Duration,
    inner: Arc<Mutex<LockInner>>,
    events: broadcast::Sender<LockEvent>,
}

impl LockingService {
    /// Create an unlocked service
    ///
    /// # Arguments
    /// * `name` - Name used in log output, usually the element's browse path
    /// * `lease` - Time a lock stays valid without renewal
    pub fn new(name: impl Into<String>, lease: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            name: name.into(),
            lease,
            inner: Arc::new(Mutex::new(LockInner::default())),
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// Subscribe to lock lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<LockEvent> {
        self.events.subscribe()
    }

    /// Current lock state
    pub async fn state(&self) -> LockState {
        let mut inner = self.inner.lock().await;
        inner.expire_if_due(&self.name, &self.events);
        match &inner.holder {
            Some(holder) => LockState {
                locked: true,
                locking_client: holder.client_id.clone(),
                locking_user: holder.user_id.clone(),
                remaining_lock_time: holder.deadline.saturating_duration_since(Instant::now()),
                context: holder.context.clone(),
            },
            None => LockState::unlocked(),
        }
    }

    /// Check whether `client_id` currently holds the lock
    pub async fn is_locked_by(&self, client_id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        inner.expire_if_due(&self.name, &self.events);
        inner
            .holder
            .as_ref()
            .is_some_and(|h| h.client_id == client_id)
    }

    /// Take the lock
    ///
    /// Calling again as the owner succeeds without restarting the lease.
    ///
    /// # Errors
    /// Returns `DiError::AlreadyLocked` if another client holds the lock
    pub async fn init_lock(&self, caller: &CallerIdentity, context: &str) -> DiResult<()> {
        let mut inner = self.inner.lock().await;
        inner.expire_if_due(&self.name, &self.events);

        if let Some(holder) = &inner.holder {
            if holder.client_id == caller.client_id {
                log::debug!("Lock {} re-entered by {}", self.name, caller.client_id);
                return Ok(());
            }
            return Err(DiError::AlreadyLocked(holder.client_id.clone()));
        }

        inner.holder = Some(Holder {
            client_id: caller.client_id.clone(),
            user_id: caller.user_id.clone(),
            context: context.to_string(),
            deadline: Instant::now() + self.lease,
        });
        self.arm_expiry(&mut inner);

        log::info!(
            "Lock {} acquired by {} (user {})",
            self.name,
            caller.client_id,
            caller.user_id
        );
        let _ = self.events.send(LockEvent::Acquired {
            client_id: caller.client_id.clone(),
            user_id: caller.user_id.clone(),
        });
        Ok(())
    }

    /// Restart the lease
    ///
    /// # Errors
    /// Returns `DiError::NotLocked` if the element is unlocked and
    /// `DiError::AccessDenied` if the caller does not hold the lock
    pub async fn renew_lock(&self, caller: &CallerIdentity) -> DiResult<()> {
        let mut inner = self.inner.lock().await;
        inner.expire_if_due(&self.name, &self.events);

        let lease = self.lease;
        let holder = Self::owned_holder(&mut inner, caller)?;
        holder.deadline = Instant::now() + lease;
        self.arm_expiry(&mut inner);

        log::debug!("Lock {} renewed by {}", self.name, caller.client_id);
        let _ = self.events.send(LockEvent::Renewed {
            client_id: caller.client_id.clone(),
        });
        Ok(())
    }

    /// Release the lock as its owner
    ///
    /// # Errors
    /// Returns `DiError::NotLocked` if the element is unlocked and
    /// `DiError::AccessDenied` if the caller does not hold the lock
    pub async fn exit_lock(&self, caller: &CallerIdentity) -> DiResult<()> {
        let mut inner = self.inner.lock().await;
        inner.expire_if_due(&self.name, &self.events);

        Self::owned_holder(&mut inner, caller)?;
        inner.release();

        log::info!("Lock {} released by {}", self.name, caller.client_id);
        let _ = self.events.send(LockEvent::Released {
            client_id: caller.client_id.clone(),
        });
        Ok(())
    }

    /// Release the lock regardless of who holds it
    ///
    /// # Errors
    /// Returns `DiError::NotLocked` if the element is unlocked
    pub async fn break_lock(&self, caller: &CallerIdentity) -> DiResult<()> {
        let mut inner = self.inner.lock().await;
        inner.expire_if_due(&self.name, &self.events);

        let holder = inner.release().ok_or(DiError::NotLocked)?;

        log::warn!(
            "Lock {} held by {} broken by {}",
            self.name,
            holder.client_id,
            caller.client_id
        );
        let _ = self.events.send(LockEvent::Broken {
            client_id: holder.client_id,
            broken_by: caller.client_id.clone(),
        });
        Ok(())
    }

    fn owned_holder<'a>(inner: &'a mut LockInner, caller: &CallerIdentity) -> DiResult<&'a mut Holder> {
        match inner.holder.as_mut() {
            None => Err(DiError::NotLocked),
            Some(holder) if holder.client_id != caller.client_id => Err(DiError::AccessDenied(format!(
                "lock is held by {}",
                holder.client_id
            ))),
            Some(holder) => Ok(holder),
        }
    }

    /// Replace the expiry timer with one for the current holder's deadline
    fn arm_expiry(&self, inner: &mut LockInner) {
        if let Some(task) = inner.expiry_task.take() {
            task.abort();
        }
        let Some(deadline) = inner.holder.as_ref().map(|h| h.deadline) else {
            return;
        };
        inner.generation = inner.generation.wrapping_add(1);
        let generation = inner.generation;

        let shared = Arc::clone(&self.inner);
        let events = self.events.clone();
        let name = self.name.clone();
        inner.expiry_task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let mut inner = shared.lock().await;
            if inner.generation == generation {
                inner.expire_if_due(&name, &events);
            }
        }));
    }
}

impl Drop for LockingService {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_lock() {
            if let Some(task) = inner.expiry_task.take() {
                task.abort();
            }
        }
    }
}

/// Map the outcome of a lock operation to its method status code
///
/// # Errors
/// Errors other than AlreadyLocked, NotLocked and AccessDenied are passed through
pub fn status_code(result: DiResult<()>) -> DiResult<i32> {
    match result {
        Ok(()) => Ok(STATUS_OK),
        Err(DiError::AlreadyLocked(_)) | Err(DiError::NotLocked) => Ok(STATUS_CONFLICT),
        Err(DiError::AccessDenied(_)) => Ok(STATUS_ACCESS_DENIED),
        Err(e) => Err(e),
    }
}
