//! # Audit Events
//!
//! Every state transition emits an [`Event`]. Nothing inside the ledger
//! reads them back; they exist for off-chain auditors and indexers.
//!
//! Events are committed into an [`EventLog`] only when the top-level call
//! that produced them succeeds. Each entry is chained to its predecessor:
//!
//! ```text
//! hash_n = BLAKE3(hash_{n-1} || seq_n || timestamp_n || json(event_n))
//! ```
//!
//! so two auditors holding the same head hash hold the same history.

use serde::{Deserialize, Serialize};

use crate::access::Role;
use crate::address::Address;

/// A single audit event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Deposit {
        caller: Address,
        receiver: Address,
        assets: u128,
        shares: u128,
        fee: u128,
    },
    SharesTransferred {
        from: Address,
        to: Address,
        shares: u128,
    },
    RedeemRequested {
        request_id: u64,
        owner: Address,
        shares: u128,
        min_base_received: u128,
    },
    MinBaseReceivedUpdated {
        request_id: u64,
        old: u128,
        new: u128,
    },
    RequestLocked {
        request_id: u64,
    },
    RequestUnlocked {
        request_id: u64,
    },
    RequestProcessed {
        request_id: u64,
        proceeds: u128,
    },
    BatchProcessed {
        request_ids: Vec<u64>,
        total_shares: u128,
        total_proceeds: u128,
        total_yield_sold: u128,
        execution_price: u128,
        dust: u128,
    },
    RequestClaimed {
        request_id: u64,
        owner: Address,
        amount: u128,
    },
    TicketTransferred {
        request_id: u64,
        from: Address,
        to: Address,
    },
    RequestSeized {
        request_id: u64,
        from: Address,
        to: Address,
    },
    ProceedsSeized {
        request_id: u64,
        from: Address,
        to: Address,
        amount: u128,
    },
    QueuedSharesBurned {
        shares: u128,
        yield_amount: u128,
    },
    SettlementDustReturned {
        amount: u128,
    },
    ConvertedFromBase {
        base_amount: u128,
        yield_amount: u128,
        execution_price: u128,
    },
    ConvertedFromYield {
        yield_amount: u128,
        base_amount: u128,
        execution_price: u128,
    },
    RewardsReceived {
        amount: u128,
        vesting_start: u64,
        vesting_period: u64,
    },
    BlacklistUpdated {
        address: Address,
        blacklisted: bool,
    },
    LockedSharesRedistributed {
        from: Address,
        to: Option<Address>,
        shares: u128,
    },
    ParameterChanged {
        name: String,
        value: String,
    },
    RoleChanged {
        role: Role,
        account: Address,
        granted: bool,
    },
    PauseChanged {
        component: String,
        paused: bool,
        by: Address,
    },
}

/// A committed event with its position and chain hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub seq: u64,
    pub timestamp: u64,
    pub event: Event,
    /// Hex-encoded BLAKE3 chain hash through this entry.
    pub hash: String,
}

/// Append-only, hash-chained event history.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventLog {
    entries: Vec<LoggedEvent>,
    #[serde(with = "hex_bytes")]
    head: [u8; 32],
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `event` stamped with `timestamp`.
    pub fn append(&mut self, event: Event, timestamp: u64) {
        let seq = self.entries.len() as u64;
        let head = chain_hash(&self.head, seq, timestamp, &event);
        tracing::debug!(seq, ?event, "event committed");
        self.entries.push(LoggedEvent {
            seq,
            timestamp,
            event,
            hash: hex::encode(head),
        });
        self.head = head;
    }

    /// Appends a batch in order.
    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>, timestamp: u64) {
        for event in events {
            self.append(event, timestamp);
        }
    }

    pub fn entries(&self) -> &[LoggedEvent] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hex-encoded hash of the latest entry (all zeros when empty).
    pub fn head_hash(&self) -> String {
        hex::encode(self.head)
    }

    /// Recomputes the chain from scratch and compares every stored hash.
    pub fn verify(&self) -> bool {
        let mut head = [0u8; 32];
        for entry in &self.entries {
            head = chain_hash(&head, entry.seq, entry.timestamp, &entry.event);
            if hex::encode(head) != entry.hash {
                return false;
            }
        }
        head == self.head
    }
}

fn chain_hash(prev: &[u8; 32], seq: u64, timestamp: u64, event: &Event) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(prev);
    hasher.update(&seq.to_be_bytes());
    hasher.update(&timestamp.to_be_bytes());
    // Serializing a plain data enum cannot fail.
    hasher.update(&serde_json::to_vec(event).unwrap_or_default());
    *hasher.finalize().as_bytes()
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let raw = hex::decode(&s).map_err(serde::de::Error::custom)?;
        raw.try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}
