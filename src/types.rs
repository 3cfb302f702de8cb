// 1.0: primitives shared by every module. addresses, slots, timestamps, amounts.
// each is a newtype or alias so the compiler catches mixups between raw units.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ledger time unit. roughly 400ms, the ledger rounds it to 2 per second for rates
pub type Slot = u64;

pub const SLOTS_PER_SECOND: u64 = 2;
pub const SLOTS_PER_MINUTE: u64 = SLOTS_PER_SECOND * 60;
pub const SLOTS_PER_HOUR: u64 = SLOTS_PER_MINUTE * 60;
pub const SLOTS_PER_DAY: u64 = SLOTS_PER_HOUR * 24;
pub const SLOTS_PER_YEAR: u64 = SLOTS_PER_DAY * 365;

// the ledger reads this amount as "everything" for repay and withdraw
pub const U64_MAX_SENTINEL: u64 = u64::MAX;

static UNIQUE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// 32-byte ledger address. The all-zero value stands for "unset".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Address([u8; 32]);

impl Address {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Fresh address for fixtures. Distinct within a process, not derived from anything.
    pub fn new_unique() -> Self {
        let n = UNIQUE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut bytes = [0u8; 32];
        bytes[0] = 0xa5;
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // first 4 bytes are enough to tell fixtures apart in assertion output
        write!(f, "Address(")?;
        for b in &self.0[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "..")?;
        for b in &self.0[28..] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

// 1.1: unix timestamp in seconds. oracle prices carry one for staleness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp())
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    pub fn elapsed_secs(&self, later: &Timestamp) -> u64 {
        (later.0 - self.0).max(0) as u64
    }
}

// 1.2: requested amount in raw base units. Max resolves to the whole position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionAmount {
    Exact(u64),
    Max,
}

impl ActionAmount {
    pub fn is_max(&self) -> bool {
        matches!(self, ActionAmount::Max)
    }

    pub fn exact(&self) -> Option<u64> {
        match self {
            ActionAmount::Exact(v) => Some(*v),
            ActionAmount::Max => None,
        }
    }
}

// 1.3: error taxonomy every module error maps onto. callers branch on this,
// e.g. retry with a lower amount on LimitExceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    LimitExceeded,
    InvalidState,
    TierMismatch,
    Configuration,
    External,
}
