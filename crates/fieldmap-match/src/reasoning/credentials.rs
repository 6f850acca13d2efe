//! Per-credential quota and failure tracking.
//!
//! ```text
//! Active ──(quota used up | failure limit reached)──▶ Standby
//!    ▲                                                   │
//!    └──────────────(calendar day rolls over)────────────┘
//! ```
//!
//! Each credential's counters live behind their own mutex, so concurrent runs
//! never double-count a request and never block on unrelated credentials.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::provider::Credential;

/// Source of the current day for quota resets.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// UTC calendar day from the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialState {
    Active,
    Standby,
}

/// Point-in-time view of one credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialStatus {
    pub id: String,
    pub state: CredentialState,
    pub used_today: u32,
    pub daily_quota: u32,
    pub consecutive_failures: u32,
    pub failure_limit: u32,
}

/// A counted request slot on one credential.
#[derive(Debug, Clone)]
pub struct Lease {
    index: usize,
    credential: Credential,
}

impl Lease {
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn id(&self) -> &str {
        &self.credential.id
    }
}

#[derive(Debug)]
struct Usage {
    day: NaiveDate,
    used: u32,
    failures: u32,
    /// Set once the credential leaves Active; only a new day clears it.
    standby: bool,
}

impl Usage {
    fn fresh(day: NaiveDate) -> Self {
        Self {
            day,
            used: 0,
            failures: 0,
            standby: false,
        }
    }
}

#[derive(Debug)]
struct Slot {
    credential: Credential,
    usage: Mutex<Usage>,
}

impl Slot {
    /// Lock the counters, resetting them first if the day changed.
    fn usage(&self, today: NaiveDate) -> MutexGuard<'_, Usage> {
        let mut usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        if usage.day != today {
            if usage.used > 0 || usage.failures > 0 || usage.standby {
                info!(credential = %self.credential.id, "new day, credential counters reset");
            }
            *usage = Usage::fresh(today);
        }
        usage
    }

    fn eligible(&self, usage: &Usage) -> bool {
        !usage.standby
            && usage.used < self.credential.daily_quota
            && usage.failures < self.credential.failure_limit
    }
}

/// Ordered credentials for the reasoning service.
pub struct CredentialPool {
    slots: Vec<Slot>,
    clock: Arc<dyn Clock>,
}

impl CredentialPool {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self::with_clock(credentials, Arc::new(SystemClock))
    }

    pub fn with_clock(credentials: Vec<Credential>, clock: Arc<dyn Clock>) -> Self {
        let today = clock.today();
        let slots = credentials
            .into_iter()
            .map(|credential| Slot {
                credential,
                usage: Mutex::new(Usage::fresh(today)),
            })
            .collect();
        Self { slots, clock }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Take a request slot on the first eligible credential.
    ///
    /// The eligibility check and the usage increment happen under the same
    /// lock. Returns `None` when every credential is on standby.
    pub fn acquire(&self) -> Option<Lease> {
        let today = self.clock.today();
        for (index, slot) in self.slots.iter().enumerate() {
            let mut usage = slot.usage(today);
            if slot.eligible(&usage) {
                usage.used += 1;
                if usage.used >= slot.credential.daily_quota {
                    usage.standby = true;
                }
                debug!(credential = %slot.credential.id, used = usage.used, "acquired credential");
                return Some(Lease {
                    index,
                    credential: slot.credential.clone(),
                });
            }
        }
        None
    }

    /// Whether the credential could take another request right now.
    ///
    /// Uses the same day-reset path as [`acquire`](Self::acquire) but does
    /// not count a request. Unknown ids are never eligible.
    pub fn is_eligible(&self, id: &str) -> bool {
        let today = self.clock.today();
        self.slots
            .iter()
            .find(|slot| slot.credential.id == id)
            .is_some_and(|slot| slot.eligible(&slot.usage(today)))
    }

    /// The call succeeded; consecutive failures start over unless the
    /// credential is already on standby for the day.
    pub fn record_success(&self, lease: &Lease) {
        if let Some(slot) = self.slots.get(lease.index) {
            let mut usage = slot.usage(self.clock.today());
            if !usage.standby {
                usage.failures = 0;
            }
        }
    }

    /// The call failed for a reason not tied to quota or auth.
    pub fn record_failure(&self, lease: &Lease) {
        if let Some(slot) = self.slots.get(lease.index) {
            let mut usage = slot.usage(self.clock.today());
            usage.failures = usage.failures.saturating_add(1);
            if usage.failures >= slot.credential.failure_limit && !usage.standby {
                usage.standby = true;
                warn!(
                    credential = %slot.credential.id,
                    failures = usage.failures,
                    "credential on standby after repeated failures"
                );
            }
        }
    }

    /// The service reported the credential over quota; standby until the
    /// day rolls over.
    pub fn mark_exhausted(&self, lease: &Lease) {
        if let Some(slot) = self.slots.get(lease.index) {
            let mut usage = slot.usage(self.clock.today());
            usage.used = usage.used.max(slot.credential.daily_quota);
            usage.standby = true;
            warn!(credential = %slot.credential.id, "credential quota exhausted");
        }
    }

    /// The service rejected the credential; standby until the day rolls over.
    pub fn mark_unauthorized(&self, lease: &Lease) {
        if let Some(slot) = self.slots.get(lease.index) {
            let mut usage = slot.usage(self.clock.today());
            usage.failures = usage.failures.max(slot.credential.failure_limit);
            usage.standby = true;
            warn!(credential = %slot.credential.id, "credential rejected by provider");
        }
    }

    /// Current state of every credential, in pool order.
    pub fn snapshot(&self) -> Vec<CredentialStatus> {
        let today = self.clock.today();
        self.slots
            .iter()
            .map(|slot| {
                let usage = slot.usage(today);
                CredentialStatus {
                    id: slot.credential.id.clone(),
                    state: if slot.eligible(&usage) {
                        CredentialState::Active
                    } else {
                        CredentialState::Standby
                    },
                    used_today: usage.used,
                    daily_quota: slot.credential.daily_quota,
                    consecutive_failures: usage.failures,
                    failure_limit: slot.credential.failure_limit,
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPool")
            .field("credentials", &self.slots.len())
            .finish_non_exhaustive()
    }
}
