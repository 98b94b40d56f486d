//! d20 core.
//!
//! Everything the table needs that is not HTTP glue:
//!
//! ```text
//! d20-core
//!   ├─ Environment     (time + secure randomness)
//!   ├─ DiceEngine      (threshold-flagged rolls)
//!   ├─ SessionCodec    (stateless sealed participant tokens)
//!   ├─ TableState      (roll ledger + facilitator stats)
//!   ├─ BroadcastHub    (best-effort snapshot fan-out)
//!   └─ Observer        (per-connection driver)
//! ```
//!
//! ## Flow
//!
//! A state change mutates [`TableState`] under its lock, releases it, then
//! calls [`BroadcastHub::publish`]. The hub renders the new state once and
//! offers the same payload to every observer queue without blocking.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dice;
pub mod env;
pub mod hub;
pub mod observer;
pub mod participant;
pub mod session;
pub mod table;

pub use dice::{DiceEngine, DiceError, DieOutcome, Roll, RollRequest};
pub use env::{EntropyError, Environment};
pub use hub::{
    BroadcastHub, EventKind, HubConfig, JsonRenderer, ObserverId, PublishReport, RenderError,
    SnapshotRenderer, Subscription, TableEvent,
};
pub use observer::{EventSink, Observer, ObserverExit, ObserverState, SinkClosed};
pub use participant::{Participant, mask_origin};
pub use session::{SessionCodec, SessionError, SessionKey};
pub use table::{StatsUpdate, TableState, TableStats, parse_trait_list};
