//! Thread-safe container for the per-market order books.
//!
//! The market map and each book are guarded separately: looking up one
//! market takes the outer lock briefly, then applies or reads under
//! that book's own lock, so updates to different markets do not contend.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::ws::message::{OrderBookPayload, PriceLevel};

use super::OrderBook;

/// Manager for the order books of every subscribed market.
///
/// Writers (the dispatcher) get exclusive access per book; readers get
/// deep-cloned state that never aliases the live book.
#[derive(Debug, Default)]
pub struct OrderBookManager {
    books: RwLock<HashMap<i16, RwLock<OrderBook>>>,
}

impl OrderBookManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a market with an empty book. No-op when already
    /// tracked.
    pub fn track(&self, market_index: i16) {
        let mut books = self.books.write().expect("book map lock poisoned");
        books
            .entry(market_index)
            .or_insert_with(|| RwLock::new(OrderBook::new(market_index)));
    }

    /// Stop tracking a market.
    pub fn remove(&self, market_index: i16) {
        let mut books = self.books.write().expect("book map lock poisoned");
        books.remove(&market_index);
    }

    /// A deep copy of a market's book.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OrderBookNotFound`] when the market is not
    /// tracked.
    pub fn book(&self, market_index: i16) -> Result<OrderBook> {
        let books = self.books.read().expect("book map lock poisoned");
        books
            .get(&market_index)
            .map(|book| book.read().expect("book lock poisoned").clone())
            .ok_or(Error::OrderBookNotFound(market_index))
    }

    /// Best bid for a market, or `None` on an empty side.
    pub fn best_bid(&self, market_index: i16) -> Result<Option<PriceLevel>> {
        let books = self.books.read().expect("book map lock poisoned");
        books
            .get(&market_index)
            .map(|book| book.read().expect("book lock poisoned").best_bid())
            .ok_or(Error::OrderBookNotFound(market_index))
    }

    /// Best ask for a market, or `None` on an empty side.
    pub fn best_ask(&self, market_index: i16) -> Result<Option<PriceLevel>> {
        let books = self.books.read().expect("book map lock poisoned");
        books
            .get(&market_index)
            .map(|book| book.read().expect("book lock poisoned").best_ask())
            .ok_or(Error::OrderBookNotFound(market_index))
    }

    /// Replace a market's book with a snapshot, creating the book when
    /// the market is new. Returns a deep copy of the resulting state.
    pub fn apply_snapshot(&self, market_index: i16, snapshot: &OrderBookPayload) -> OrderBook {
        self.track(market_index);
        let books = self.books.read().expect("book map lock poisoned");
        // track() above guarantees presence; the map lock was released
        // in between, so re-check rather than unwrap.
        match books.get(&market_index) {
            Some(book) => {
                let mut book = book.write().expect("book lock poisoned");
                book.apply_snapshot(snapshot);
                book.clone()
            }
            None => {
                let mut book = OrderBook::new(market_index);
                book.apply_snapshot(snapshot);
                book
            }
        }
    }

    /// Apply a sequenced delta to a market's book. Returns a deep copy
    /// of the resulting state.
    ///
    /// # Errors
    ///
    /// [`Error::OrderBookNotFound`] when the market is not tracked;
    /// [`Error::SequenceGap`] (book unchanged) on a gap.
    pub fn apply_delta(&self, market_index: i16, delta: &OrderBookPayload) -> Result<OrderBook> {
        let books = self.books.read().expect("book map lock poisoned");
        let book = books
            .get(&market_index)
            .ok_or(Error::OrderBookNotFound(market_index))?;
        let mut book = book.write().expect("book lock poisoned");
        book.apply_delta(delta)?;
        Ok(book.clone())
    }

    /// Merge unsequenced updates into a market's book, creating the book
    /// when the market is new. Returns a deep copy of the resulting
    /// state.
    pub fn merge_updates(
        &self,
        market_index: i16,
        bids: &[PriceLevel],
        asks: &[PriceLevel],
    ) -> OrderBook {
        self.track(market_index);
        let books = self.books.read().expect("book map lock poisoned");
        match books.get(&market_index) {
            Some(book) => {
                let mut book = book.write().expect("book lock poisoned");
                book.merge_updates(bids, asks);
                book.clone()
            }
            None => {
                let mut book = OrderBook::new(market_index);
                book.merge_updates(bids, asks);
                book
            }
        }
    }

    /// Indices of every tracked market.
    pub fn markets(&self) -> Vec<i16> {
        let books = self.books.read().expect("book map lock poisoned");
        books.keys().copied().collect()
    }

    /// Number of tracked markets.
    pub fn len(&self) -> usize {
        self.books.read().expect("book map lock poisoned").len()
    }

    /// True when no market is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every tracked book.
    pub fn clear(&self) {
        self.books.write().expect("book map lock poisoned").clear();
    }
}
