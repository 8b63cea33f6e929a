//! Token ring implementation.
//!
//! The ring maps every point of the hash space to the first entry whose
//! token is greater than or equal to it, wrapping to the first entry.

pub mod ring;

pub use ring::{RingBuilder, RingEntry, TokenRing};
