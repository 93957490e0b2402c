//! Order-book reconstruction from snapshots and incremental updates.
//!
//! The stream delivers one trusted snapshot per subscription followed by
//! incremental updates. [`OrderBook`] holds the reconstructed state of a
//! single market; [`OrderBookManager`] owns one book per subscribed
//! market behind read-write locks.
//!
//! Prices and sizes stay opaque decimal strings end to end. Books are
//! ordered with a string comparator that treats a longer string as
//! larger and otherwise compares lexicographically, which is valid for
//! the same-precision decimals the server emits per market.
//!
//! State handed to callers is always a deep copy; nothing returned from
//! this module aliases the live books.

mod book;
mod manager;

pub use book::OrderBook;
pub use manager::OrderBookManager;
