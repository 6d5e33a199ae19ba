//! Memory management: per-owner pooled arenas.

pub mod arena;

pub use arena::{Arena, ArenaConfig, ArenaLease, ArenaStats, PooledBuf};
