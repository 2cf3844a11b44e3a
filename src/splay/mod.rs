//! Splaying Module
//!
//! Keeps frequently read keys near the top of the LSM tree using nothing but
//! the engine's own write path and compaction callbacks.
//!
//! ## Responsibilities
//! - Tag every stored value with a one-byte header (`codec`)
//! - Drop legacy placeholder values during compaction (`filter`)
//! - Fold record generations during compaction, marking them merged (`merge`)
//! - Rewrite merged records on read so they land in the memtable (`policy`)
//! - Wrap all of the above in a plain key-value store (`store`)
//!
//! ## Lifecycle of a key
//!
//! ```text
//!   insert ──► [00|v] ──flush/compact──► [02|v] ──get──► [01|v] (memtable)
//!                                          ▲                │
//!                                          └──flush/compact─┘
//! ```

mod codec;
mod filter;
mod merge;
mod policy;
mod store;

pub use codec::{decode_tagged, encode_tagged, DecodeError, Tag, LEGACY_SENTINEL, TAG_SIZE};
pub use filter::SplayFilter;
pub use merge::SplayMerge;
pub use policy::{ReadDecision, SplayMetrics, SplayPolicy, SplayStats};
pub use store::SplayStore;
