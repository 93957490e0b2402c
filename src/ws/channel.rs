//! Stream channel definitions.
//!
//! A [`Channel`] names one server stream together with its parameters.
//! The client sends channel paths with `/` separators
//! (`order_book/0`); the server echoes them back with `:` separators
//! (`order_book:0`). [`Channel::parse`] accepts either spelling, and
//! [`Channel::key`] produces the canonical identifier used to match
//! confirmations regardless of the wire spelling.

use crate::error::{Error, Result};

/// Available stream channels with their parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Order-book snapshot and delta stream for one market.
    OrderBook {
        /// Market index.
        market: i16,
    },
    /// Public trade stream for one market.
    Trade {
        /// Market index.
        market: i16,
    },
    /// Market statistics for one market.
    MarketStats {
        /// Market index.
        market: i16,
    },
    /// Market statistics for every market.
    MarketStatsAll,
    /// Block height announcements.
    Height,
    /// Full account feed (requires authentication).
    AccountAll {
        /// Account index.
        account: i64,
    },
    /// Account feed scoped to one market (requires authentication).
    AccountMarket {
        /// Market index.
        market: i16,
        /// Account index.
        account: i64,
    },
    /// Account orders scoped to one market (requires authentication).
    AccountOrders {
        /// Market index.
        market: i16,
        /// Account index.
        account: i64,
    },
    /// Account orders across all markets (requires authentication).
    AccountAllOrders {
        /// Account index.
        account: i64,
    },
    /// Account trades across all markets (requires authentication).
    AccountAllTrades {
        /// Account index.
        account: i64,
    },
    /// Account positions across all markets (requires authentication).
    AccountAllPositions {
        /// Account index.
        account: i64,
    },
    /// Account transaction feed (requires authentication).
    AccountTx {
        /// Account index.
        account: i64,
    },
    /// User statistics (requires authentication).
    UserStats {
        /// Account index.
        account: i64,
    },
    /// Pool data feed (requires authentication).
    PoolData {
        /// Account index.
        account: i64,
    },
    /// Pool info feed (requires authentication).
    PoolInfo {
        /// Account index.
        account: i64,
    },
    /// Notification feed (requires authentication).
    Notification {
        /// Account index.
        account: i64,
    },
}

impl Channel {
    /// Returns the wire token naming this channel kind.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::OrderBook { .. } => "order_book",
            Self::Trade { .. } => "trade",
            Self::MarketStats { .. } | Self::MarketStatsAll => "market_stats",
            Self::Height => "height",
            Self::AccountAll { .. } => "account_all",
            Self::AccountMarket { .. } => "account_market",
            Self::AccountOrders { .. } => "account_orders",
            Self::AccountAllOrders { .. } => "account_all_orders",
            Self::AccountAllTrades { .. } => "account_all_trades",
            Self::AccountAllPositions { .. } => "account_all_positions",
            Self::AccountTx { .. } => "account_tx",
            Self::UserStats { .. } => "user_stats",
            Self::PoolData { .. } => "pool_data",
            Self::PoolInfo { .. } => "pool_info",
            Self::Notification { .. } => "notification",
        }
    }

    /// Returns true if subscribing to this channel requires an auth token.
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Self::AccountAll { .. }
                | Self::AccountMarket { .. }
                | Self::AccountOrders { .. }
                | Self::AccountAllOrders { .. }
                | Self::AccountAllTrades { .. }
                | Self::AccountAllPositions { .. }
                | Self::AccountTx { .. }
                | Self::UserStats { .. }
                | Self::PoolData { .. }
                | Self::PoolInfo { .. }
                | Self::Notification { .. }
        )
    }

    /// The market index parameter, when this channel carries one.
    pub fn market(&self) -> Option<i16> {
        match self {
            Self::OrderBook { market }
            | Self::Trade { market }
            | Self::MarketStats { market }
            | Self::AccountMarket { market, .. }
            | Self::AccountOrders { market, .. } => Some(*market),
            _ => None,
        }
    }

    /// The account index parameter, when this channel carries one.
    pub fn account(&self) -> Option<i64> {
        match self {
            Self::AccountAll { account }
            | Self::AccountMarket { account, .. }
            | Self::AccountOrders { account, .. }
            | Self::AccountAllOrders { account }
            | Self::AccountAllTrades { account }
            | Self::AccountAllPositions { account }
            | Self::AccountTx { account }
            | Self::UserStats { account }
            | Self::PoolData { account }
            | Self::PoolInfo { account }
            | Self::Notification { account } => Some(*account),
            _ => None,
        }
    }

    /// Canonical `:`-separated key used for registry matching.
    pub fn key(&self) -> String {
        self.join(':')
    }

    /// The `/`-separated path sent in subscribe requests.
    pub fn wire_path(&self) -> String {
        self.join('/')
    }

    fn join(&self, sep: char) -> String {
        let kind = self.kind_str();
        match self {
            Self::Height => kind.to_string(),
            Self::MarketStatsAll => format!("{kind}{sep}all"),
            Self::OrderBook { market } | Self::Trade { market } | Self::MarketStats { market } => {
                format!("{kind}{sep}{market}")
            }
            Self::AccountMarket { market, account } | Self::AccountOrders { market, account } => {
                format!("{kind}{sep}{market}{sep}{account}")
            }
            Self::AccountAll { account }
            | Self::AccountAllOrders { account }
            | Self::AccountAllTrades { account }
            | Self::AccountAllPositions { account }
            | Self::AccountTx { account }
            | Self::PoolData { account }
            | Self::PoolInfo { account }
            | Self::UserStats { account }
            | Self::Notification { account } => format!("{kind}{sep}{account}"),
        }
    }

    /// Parse a channel path in either the client (`/`) or server (`:`)
    /// spelling.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelFormat`] for unknown kinds, missing or
    /// extra segments, and out-of-range integer parameters.
    pub fn parse(raw: &str) -> Result<Self> {
        let bad = || Error::ChannelFormat(raw.to_string());
        let segments: Vec<&str> = if raw.contains(':') {
            raw.split(':').collect()
        } else {
            raw.split('/').collect()
        };

        let market = |idx: usize| -> Result<i16> {
            segments
                .get(idx)
                .and_then(|s| s.parse::<i16>().ok())
                .ok_or_else(bad)
        };
        let account = |idx: usize| -> Result<i64> {
            segments
                .get(idx)
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(bad)
        };
        let arity = |n: usize| -> Result<()> {
            if segments.len() == n {
                Ok(())
            } else {
                Err(bad())
            }
        };

        let channel = match *segments.first().ok_or_else(bad)? {
            "order_book" => {
                arity(2)?;
                Self::OrderBook { market: market(1)? }
            }
            "trade" => {
                arity(2)?;
                Self::Trade { market: market(1)? }
            }
            "market_stats" => {
                arity(2)?;
                if segments[1] == "all" {
                    Self::MarketStatsAll
                } else {
                    Self::MarketStats { market: market(1)? }
                }
            }
            "height" => {
                arity(1)?;
                Self::Height
            }
            "account_all" => {
                arity(2)?;
                Self::AccountAll {
                    account: account(1)?,
                }
            }
            "account_market" => {
                arity(3)?;
                Self::AccountMarket {
                    market: market(1)?,
                    account: account(2)?,
                }
            }
            "account_orders" => {
                arity(3)?;
                Self::AccountOrders {
                    market: market(1)?,
                    account: account(2)?,
                }
            }
            "account_all_orders" => {
                arity(2)?;
                Self::AccountAllOrders {
                    account: account(1)?,
                }
            }
            "account_all_trades" => {
                arity(2)?;
                Self::AccountAllTrades {
                    account: account(1)?,
                }
            }
            "account_all_positions" => {
                arity(2)?;
                Self::AccountAllPositions {
                    account: account(1)?,
                }
            }
            "account_tx" => {
                arity(2)?;
                Self::AccountTx {
                    account: account(1)?,
                }
            }
            "user_stats" => {
                arity(2)?;
                Self::UserStats {
                    account: account(1)?,
                }
            }
            "pool_data" => {
                arity(2)?;
                Self::PoolData {
                    account: account(1)?,
                }
            }
            "pool_info" => {
                arity(2)?;
                Self::PoolInfo {
                    account: account(1)?,
                }
            }
            "notification" => {
                arity(2)?;
                Self::Notification {
                    account: account(1)?,
                }
            }
            _ => return Err(bad()),
        };

        Ok(channel)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_and_wire_path_spellings() {
        let channel = Channel::OrderBook { market: 7 };
        assert_eq!(channel.key(), "order_book:7");
        assert_eq!(channel.wire_path(), "order_book/7");

        let channel = Channel::AccountOrders {
            market: 2,
            account: 991,
        };
        assert_eq!(channel.key(), "account_orders:2:991");
        assert_eq!(channel.wire_path(), "account_orders/2/991");

        assert_eq!(Channel::Height.key(), "height");
        assert_eq!(Channel::MarketStatsAll.key(), "market_stats:all");
    }

    #[test]
    fn parse_accepts_both_separators() {
        assert_eq!(
            Channel::parse("order_book:3").unwrap(),
            Channel::OrderBook { market: 3 }
        );
        assert_eq!(
            Channel::parse("order_book/3").unwrap(),
            Channel::OrderBook { market: 3 }
        );
        assert_eq!(
            Channel::parse("account_market:1:42").unwrap(),
            Channel::AccountMarket {
                market: 1,
                account: 42
            }
        );
        assert_eq!(Channel::parse("height").unwrap(), Channel::Height);
        assert_eq!(
            Channel::parse("market_stats:all").unwrap(),
            Channel::MarketStatsAll
        );
    }

    #[test]
    fn parse_round_trips_every_kind() {
        let channels = [
            Channel::OrderBook { market: 0 },
            Channel::Trade { market: 1 },
            Channel::MarketStats { market: 2 },
            Channel::MarketStatsAll,
            Channel::Height,
            Channel::AccountAll { account: 10 },
            Channel::AccountMarket {
                market: 3,
                account: 10,
            },
            Channel::AccountOrders {
                market: 4,
                account: 10,
            },
            Channel::AccountAllOrders { account: 10 },
            Channel::AccountAllTrades { account: 10 },
            Channel::AccountAllPositions { account: 10 },
            Channel::AccountTx { account: 10 },
            Channel::UserStats { account: 10 },
            Channel::PoolData { account: 10 },
            Channel::PoolInfo { account: 10 },
            Channel::Notification { account: 10 },
        ];

        for channel in channels {
            assert_eq!(Channel::parse(&channel.key()).unwrap(), channel);
            assert_eq!(Channel::parse(&channel.wire_path()).unwrap(), channel);
        }
    }

    #[test]
    fn parse_rejects_malformed_paths() {
        for raw in [
            "",
            "bogus",
            "order_book",
            "order_book:abc",
            "order_book:1:2",
            "order_book:99999", // beyond i16
            "account_market:1",
            "height:1",
        ] {
            assert!(
                matches!(Channel::parse(raw), Err(Error::ChannelFormat(_))),
                "expected ChannelFormat for {raw:?}"
            );
        }
    }

    #[test]
    fn auth_required_only_for_private_kinds() {
        assert!(!Channel::OrderBook { market: 0 }.requires_auth());
        assert!(!Channel::Trade { market: 0 }.requires_auth());
        assert!(!Channel::MarketStatsAll.requires_auth());
        assert!(!Channel::Height.requires_auth());

        assert!(Channel::AccountAll { account: 1 }.requires_auth());
        assert!(Channel::UserStats { account: 1 }.requires_auth());
        assert!(Channel::PoolInfo { account: 1 }.requires_auth());
        assert!(Channel::Notification { account: 1 }.requires_auth());
    }
}
