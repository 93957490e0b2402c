//! Order-book state for a single market.
//!
//! Price levels are keyed by their opaque decimal-string price in a
//! `BTreeMap`, giving O(log n) updates and O(1) best-price reads via
//! `first_key_value` / `last_key_value`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::ws::message::{OrderBookPayload, PriceLevel};

/// Ordering wrapper for opaque decimal-string prices.
///
/// A longer string is larger; equal-length strings compare
/// lexicographically. This holds only for same-precision decimals, which
/// is what the server emits per market.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PriceKey(String);

impl PartialOrd for PriceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.0.len().cmp(&other.0.len()) {
            Ordering::Equal => self.0.cmp(&other.0),
            unequal => unequal,
        }
    }
}

/// Reconstructed order book for one market.
///
/// Built from one trusted snapshot plus incremental updates. The
/// `sequence` field is `0` until a snapshot or delta stamps it; while it
/// is `0`, deltas are accepted without a gap check.
///
/// # Thread Safety
///
/// `Send + Sync` but not internally synchronized; the
/// [`OrderBookManager`](super::OrderBookManager) wraps each book in a
/// read-write lock.
#[derive(Debug, Clone)]
pub struct OrderBook {
    market_index: i16,
    sequence: i64,
    bids: BTreeMap<PriceKey, PriceLevel>,
    asks: BTreeMap<PriceKey, PriceLevel>,
    last_update: DateTime<Utc>,
}

impl OrderBook {
    /// Create a new empty book for the given market.
    #[must_use]
    pub fn new(market_index: i16) -> Self {
        Self {
            market_index,
            sequence: 0,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            last_update: Utc::now(),
        }
    }

    /// The market this book tracks.
    #[must_use]
    pub const fn market_index(&self) -> i16 {
        self.market_index
    }

    /// The current sequence number (`0` = uninitialised).
    #[must_use]
    pub const fn sequence(&self) -> i64 {
        self.sequence
    }

    /// Timestamp of the last applied snapshot or update.
    #[must_use]
    pub const fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    /// Replace the entire book with a snapshot.
    ///
    /// Snapshots are trusted: levels are inserted verbatim, including
    /// any with empty or `"0"` sizes.
    pub fn apply_snapshot(&mut self, snapshot: &OrderBookPayload) {
        self.bids.clear();
        self.asks.clear();
        for level in &snapshot.bids {
            self.bids
                .insert(PriceKey(level.price.clone()), level.clone());
        }
        for level in &snapshot.asks {
            self.asks
                .insert(PriceKey(level.price.clone()), level.clone());
        }
        self.sequence = snapshot.sequence;
        self.last_update = Utc::now();
    }

    /// Apply a sequenced delta.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SequenceGap`] without mutating the book when the
    /// delta's sequence is not exactly one past the current sequence.
    /// The check is skipped while the book is uninitialised
    /// (`sequence == 0`).
    pub fn apply_delta(&mut self, delta: &OrderBookPayload) -> Result<()> {
        if self.sequence != 0 && delta.sequence != self.sequence + 1 {
            return Err(Error::SequenceGap {
                expected: self.sequence + 1,
                got: delta.sequence,
            });
        }

        Self::merge_side(&mut self.bids, &delta.bids);
        Self::merge_side(&mut self.asks, &delta.asks);
        self.sequence = delta.sequence;
        self.last_update = Utc::now();
        Ok(())
    }

    /// Apply unsequenced updates: upsert levels, removing those whose
    /// size is `""` or `"0"`.
    ///
    /// Used for wire updates that omit a usable sequence; the book's
    /// sequence is left untouched.
    pub fn merge_updates(&mut self, bids: &[PriceLevel], asks: &[PriceLevel]) {
        Self::merge_side(&mut self.bids, bids);
        Self::merge_side(&mut self.asks, asks);
        self.last_update = Utc::now();
    }

    fn merge_side(side: &mut BTreeMap<PriceKey, PriceLevel>, updates: &[PriceLevel]) {
        for level in updates {
            let key = PriceKey(level.price.clone());
            if level.is_removal() {
                side.remove(&key);
            } else {
                side.insert(key, level.clone());
            }
        }
    }

    /// The highest-priced bid, or `None` on an empty side.
    #[must_use]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.last_key_value().map(|(_, level)| level.clone())
    }

    /// The lowest-priced ask, or `None` on an empty side.
    #[must_use]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first_key_value().map(|(_, level)| level.clone())
    }

    /// All bid levels sorted by price descending (best first).
    #[must_use]
    pub fn bids_sorted(&self) -> Vec<PriceLevel> {
        self.bids.values().rev().cloned().collect()
    }

    /// All ask levels sorted by price ascending (best first).
    #[must_use]
    pub fn asks_sorted(&self) -> Vec<PriceLevel> {
        self.asks.values().cloned().collect()
    }

    /// Number of (bid, ask) price levels.
    #[must_use]
    pub fn depth(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }

    /// True when both sides are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(price: &str, size: &str) -> PriceLevel {
        PriceLevel::new(price, size)
    }

    fn snapshot(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>, sequence: i64) -> OrderBookPayload {
        OrderBookPayload {
            bids,
            asks,
            sequence,
        }
    }

    #[test]
    fn price_key_orders_decimal_strings() {
        let mut keys = [
            PriceKey("99.5".to_string()),
            PriceKey("101.0".to_string()),
            PriceKey("100.0".to_string()),
        ];
        keys.sort();
        let order: Vec<&str> = keys.iter().map(|k| k.0.as_str()).collect();
        assert_eq!(order, ["99.5", "100.0", "101.0"]);
    }

    #[test]
    fn snapshot_replaces_book_and_sets_sequence() {
        let mut book = OrderBook::new(0);
        book.apply_snapshot(&snapshot(
            vec![level("99", "5")],
            vec![level("101", "2")],
            50,
        ));
        book.apply_snapshot(&snapshot(
            vec![level("100", "10"), level("98", "7")],
            vec![level("102", "5")],
            100,
        ));

        assert_eq!(book.sequence(), 100);
        assert_eq!(book.depth(), (2, 1));
        assert_eq!(book.best_bid().unwrap().price, "100");
        assert_eq!(book.best_ask().unwrap().price, "102");
        // Prior levels are gone entirely.
        assert!(!book.bids_sorted().iter().any(|l| l.price == "99"));
    }

    #[test]
    fn snapshot_inserts_zero_sizes_verbatim() {
        let mut book = OrderBook::new(0);
        book.apply_snapshot(&snapshot(vec![level("100", "0")], vec![], 1));
        assert_eq!(book.depth(), (1, 0));
    }

    #[test]
    fn sorted_views_are_strictly_ordered() {
        let mut book = OrderBook::new(0);
        book.apply_snapshot(&snapshot(
            vec![level("98", "1"), level("100", "1"), level("99", "1")],
            vec![level("103", "1"), level("101", "1"), level("102", "1")],
            1,
        ));

        let bids = book.bids_sorted();
        let bid_prices: Vec<&str> = bids.iter().map(|l| l.price.as_str()).collect();
        assert_eq!(bid_prices, ["100", "99", "98"]);

        let asks = book.asks_sorted();
        let ask_prices: Vec<&str> = asks.iter().map(|l| l.price.as_str()).collect();
        assert_eq!(ask_prices, ["101", "102", "103"]);
    }

    #[test]
    fn in_sequence_delta_applies() {
        let mut book = OrderBook::new(0);
        book.apply_snapshot(&snapshot(vec![level("100", "10")], vec![], 100));

        let delta = snapshot(vec![level("99", "7")], vec![level("101", "5")], 101);
        book.apply_delta(&delta).unwrap();

        assert_eq!(book.sequence(), 101);
        assert_eq!(book.depth(), (2, 1));
    }

    #[test]
    fn gapped_delta_is_refused_and_book_unchanged() {
        let mut book = OrderBook::new(0);
        book.apply_snapshot(&snapshot(vec![level("100", "10")], vec![], 100));

        let delta = snapshot(vec![level("99", "7")], vec![], 103);
        let err = book.apply_delta(&delta).unwrap_err();
        assert!(matches!(
            err,
            Error::SequenceGap {
                expected: 101,
                got: 103
            }
        ));
        assert_eq!(book.sequence(), 100);
        assert_eq!(book.depth(), (1, 0));
    }

    #[test]
    fn first_delta_after_zero_sequence_is_accepted() {
        let mut book = OrderBook::new(0);
        book.apply_snapshot(&snapshot(vec![level("100", "10")], vec![], 0));

        let delta = snapshot(vec![level("99", "7")], vec![], 5000);
        book.apply_delta(&delta).unwrap();
        assert_eq!(book.sequence(), 5000);
    }

    #[test]
    fn zero_size_delta_removes_the_level() {
        let mut book = OrderBook::new(0);
        book.apply_snapshot(&snapshot(vec![level("100", "10")], vec![], 1));

        book.apply_delta(&snapshot(vec![level("100", "0")], vec![], 2))
            .unwrap();
        assert!(book.best_bid().is_none());

        book.apply_delta(&snapshot(vec![level("100", "3")], vec![], 3))
            .unwrap();
        book.apply_delta(&snapshot(vec![level("100", "")], vec![], 4))
            .unwrap();
        assert!(book.best_bid().is_none());
    }

    #[test]
    fn merge_updates_upserts_without_sequence_change() {
        let mut book = OrderBook::new(0);
        book.apply_snapshot(&snapshot(
            vec![level("100", "10")],
            vec![level("101", "5")],
            100,
        ));

        book.merge_updates(
            &[level("100", "0"), level("99", "7")],
            &[],
        );

        assert_eq!(book.sequence(), 100);
        assert_eq!(book.best_bid().unwrap().price, "99");
        assert_eq!(book.best_bid().unwrap().size, "7");
        assert_eq!(book.best_ask().unwrap().price, "101");
    }

    #[test]
    fn best_prices_on_empty_sides_are_none() {
        let book = OrderBook::new(4);
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
        assert!(book.is_empty());
    }

    #[test]
    fn clone_is_a_deep_copy() {
        let mut book = OrderBook::new(0);
        book.apply_snapshot(&snapshot(vec![level("100", "10")], vec![], 1));

        let copy = book.clone();
        book.apply_delta(&snapshot(vec![level("100", "0")], vec![], 2))
            .unwrap();

        assert!(book.best_bid().is_none());
        assert_eq!(copy.best_bid().unwrap().price, "100");
        assert_eq!(copy.sequence(), 1);
    }
}
