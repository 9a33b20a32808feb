//! Security Equivalence Catalog
//!
//! Maps tickers to "substantially identical" groups for wash sale analysis,
//! with per-ticker metadata used when ranking replacement securities.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while loading a catalog.
///
/// These are fatal: analysis cannot proceed with an ambiguous or malformed
/// group table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ticker {ticker} belongs to both {first_group} and {second_group}")]
    AmbiguousMembership {
        ticker: String,
        first_group: String,
        second_group: String,
    },

    #[error("duplicate group id: {0}")]
    DuplicateGroupId(String),

    #[error("group definition has an empty group id")]
    EmptyGroupId,

    #[error("group {0} has no member tickers")]
    EmptyGroup(String),

    #[error("group {0} contains an empty ticker")]
    EmptyTicker(String),
}

/// A set of securities treated as substantially identical for wash sale
/// purposes (e.g., ETFs tracking the same index).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquivalenceGroup {
    /// Stable identifier, e.g. "sp500-trackers"
    pub group_id: String,
    /// Human-readable name, e.g. "S&P 500 index trackers"
    pub display_name: String,
    /// Member tickers
    pub member_tickers: Vec<String>,
}

impl EquivalenceGroup {
    /// One-ticker group synthesized for tickers absent from the catalog.
    ///
    /// A sale and repurchase of the same ticker is always wash-sale-eligible,
    /// so an unlisted ticker is its own group rather than a lookup failure.
    pub fn singleton(ticker: &str) -> Self {
        Self {
            group_id: ticker.to_string(),
            display_name: ticker.to_string(),
            member_tickers: vec![ticker.to_string()],
        }
    }
}

/// Per-ticker metadata consumed by the swap recommender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityInfo {
    /// Symbol
    pub ticker: String,
    /// Fund or company name
    pub name: String,
    /// Coarse asset class bucket, e.g. "US Large Cap Blend"
    pub asset_class: String,
    /// Annual expense ratio in percent (None for single stocks)
    pub expense_ratio: Option<f64>,
}

impl SecurityInfo {
    fn fund(ticker: &str, name: &str, asset_class: &str, expense_ratio: f64) -> Self {
        Self {
            ticker: ticker.to_string(),
            name: name.to_string(),
            asset_class: asset_class.to_string(),
            expense_ratio: Some(expense_ratio),
        }
    }
}

/// Versioned ticker-to-group catalog.
///
/// `group_of` is total: unknown tickers resolve to a synthesized singleton
/// group, so no lookup path is undefined. The catalog is never mutated by
/// the engine; its version string is recorded into every report for audit
/// reproducibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquivalenceCatalog {
    version: String,
    groups: Vec<EquivalenceGroup>,
    /// Ticker -> index into `groups`
    ticker_to_group: HashMap<String, usize>,
    securities: HashMap<String, SecurityInfo>,
}

impl EquivalenceCatalog {
    /// Load a catalog from group definitions and a security metadata table.
    ///
    /// Rejects ambiguous membership (a ticker in two groups), duplicate or
    /// empty group ids, and empty member lists.
    pub fn new(
        version: impl Into<String>,
        groups: Vec<EquivalenceGroup>,
        securities: Vec<SecurityInfo>,
    ) -> Result<Self, ConfigError> {
        let mut ticker_to_group: HashMap<String, usize> = HashMap::new();
        let mut seen_ids: HashMap<String, usize> = HashMap::new();

        for (idx, group) in groups.iter().enumerate() {
            if group.group_id.trim().is_empty() {
                return Err(ConfigError::EmptyGroupId);
            }
            if seen_ids.insert(group.group_id.clone(), idx).is_some() {
                return Err(ConfigError::DuplicateGroupId(group.group_id.clone()));
            }
            if group.member_tickers.is_empty() {
                return Err(ConfigError::EmptyGroup(group.group_id.clone()));
            }
            for ticker in &group.member_tickers {
                if ticker.trim().is_empty() {
                    return Err(ConfigError::EmptyTicker(group.group_id.clone()));
                }
                if let Some(&first) = ticker_to_group.get(ticker) {
                    return Err(ConfigError::AmbiguousMembership {
                        ticker: ticker.clone(),
                        first_group: groups[first].group_id.clone(),
                        second_group: group.group_id.clone(),
                    });
                }
                ticker_to_group.insert(ticker.clone(), idx);
            }
        }

        let securities = securities
            .into_iter()
            .map(|s| (s.ticker.clone(), s))
            .collect();

        Ok(Self {
            version: version.into(),
            groups,
            ticker_to_group,
            securities,
        })
    }

    /// Catalog version recorded into reports.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Resolve a ticker to its equivalence group. Never fails: unlisted
    /// tickers get a synthesized singleton group.
    pub fn group_of(&self, ticker: &str) -> EquivalenceGroup {
        match self.ticker_to_group.get(ticker) {
            Some(&idx) => self.groups[idx].clone(),
            None => EquivalenceGroup::singleton(ticker),
        }
    }

    /// Whether two tickers are substantially identical, i.e. share a group.
    pub fn are_identical(&self, ticker_a: &str, ticker_b: &str) -> bool {
        self.group_of(ticker_a).group_id == self.group_of(ticker_b).group_id
    }

    /// Metadata for a ticker, if the catalog knows it.
    pub fn security_info(&self, ticker: &str) -> Option<&SecurityInfo> {
        self.securities.get(ticker)
    }

    /// All securities with metadata, in unspecified order.
    pub fn securities(&self) -> impl Iterator<Item = &SecurityInfo> {
        self.securities.values()
    }

    /// Compiled-in catalog of common ETF equivalence groups, usable as an
    /// advisory default and in tests.
    pub fn builtin() -> Self {
        let groups = vec![
            EquivalenceGroup {
                group_id: "sp500-trackers".to_string(),
                display_name: "S&P 500 index trackers".to_string(),
                member_tickers: vec![
                    "SPY".to_string(),
                    "VOO".to_string(),
                    "IVV".to_string(),
                    "SPLG".to_string(),
                ],
            },
            EquivalenceGroup {
                group_id: "total-us-market".to_string(),
                display_name: "Total US market trackers".to_string(),
                member_tickers: vec![
                    "VTI".to_string(),
                    "ITOT".to_string(),
                    "SCHB".to_string(),
                    "SPTM".to_string(),
                ],
            },
            EquivalenceGroup {
                group_id: "nasdaq100-trackers".to_string(),
                display_name: "Nasdaq-100 index trackers".to_string(),
                member_tickers: vec!["QQQ".to_string(), "QQQM".to_string()],
            },
            EquivalenceGroup {
                group_id: "alphabet-share-classes".to_string(),
                display_name: "Alphabet share classes".to_string(),
                member_tickers: vec!["GOOGL".to_string(), "GOOG".to_string()],
            },
            EquivalenceGroup {
                group_id: "berkshire-share-classes".to_string(),
                display_name: "Berkshire Hathaway share classes".to_string(),
                member_tickers: vec!["BRK.A".to_string(), "BRK.B".to_string()],
            },
            EquivalenceGroup {
                group_id: "em-trackers".to_string(),
                display_name: "MSCI Emerging Markets trackers".to_string(),
                member_tickers: vec!["EEM".to_string(), "IEMG".to_string()],
            },
        ];

        let securities = vec![
            SecurityInfo::fund("SPY", "SPDR S&P 500 ETF Trust", "US Large Cap Blend", 0.09),
            SecurityInfo::fund("VOO", "Vanguard S&P 500 ETF", "US Large Cap Blend", 0.03),
            SecurityInfo::fund("IVV", "iShares Core S&P 500 ETF", "US Large Cap Blend", 0.03),
            SecurityInfo::fund("SPLG", "SPDR Portfolio S&P 500 ETF", "US Large Cap Blend", 0.02),
            SecurityInfo::fund("SCHX", "Schwab US Large-Cap ETF", "US Large Cap Blend", 0.03),
            SecurityInfo::fund("VV", "Vanguard Large-Cap ETF", "US Large Cap Blend", 0.04),
            SecurityInfo::fund("IWB", "iShares Russell 1000 ETF", "US Large Cap Blend", 0.15),
            SecurityInfo::fund("VTI", "Vanguard Total Stock Market ETF", "US Total Market", 0.03),
            SecurityInfo::fund("ITOT", "iShares Core S&P Total US Stock Market ETF", "US Total Market", 0.03),
            SecurityInfo::fund("SCHB", "Schwab US Broad Market ETF", "US Total Market", 0.03),
            SecurityInfo::fund("SPTM", "SPDR Portfolio S&P 1500 ETF", "US Total Market", 0.03),
            SecurityInfo::fund("IWV", "iShares Russell 3000 ETF", "US Total Market", 0.20),
            SecurityInfo::fund("QQQ", "Invesco QQQ Trust", "US Large Cap Growth", 0.20),
            SecurityInfo::fund("QQQM", "Invesco Nasdaq 100 ETF", "US Large Cap Growth", 0.15),
            SecurityInfo::fund("VUG", "Vanguard Growth ETF", "US Large Cap Growth", 0.04),
            SecurityInfo::fund("SCHG", "Schwab US Large-Cap Growth ETF", "US Large Cap Growth", 0.04),
            SecurityInfo::fund("EEM", "iShares MSCI Emerging Markets ETF", "Emerging Markets", 0.70),
            SecurityInfo::fund("IEMG", "iShares Core MSCI Emerging Markets ETF", "Emerging Markets", 0.09),
            SecurityInfo::fund("VWO", "Vanguard FTSE Emerging Markets ETF", "Emerging Markets", 0.08),
            SecurityInfo::fund("SCHE", "Schwab Emerging Markets Equity ETF", "Emerging Markets", 0.11),
        ];

        // The builtin tables are static and well-formed, so this cannot fail.
        Self::new("builtin-2025.1", groups, securities)
            .unwrap_or_else(|e| panic!("builtin catalog is malformed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_of_known_ticker() {
        let catalog = EquivalenceCatalog::builtin();
        let group = catalog.group_of("VOO");
        assert_eq!(group.group_id, "sp500-trackers");
        assert!(group.member_tickers.contains(&"SPY".to_string()));
    }

    #[test]
    fn test_group_of_unknown_ticker_is_singleton() {
        let catalog = EquivalenceCatalog::builtin();
        let group = catalog.group_of("AAPL");
        assert_eq!(group.group_id, "AAPL");
        assert_eq!(group.member_tickers, vec!["AAPL".to_string()]);
    }

    #[test]
    fn test_are_identical() {
        let catalog = EquivalenceCatalog::builtin();

        assert!(catalog.are_identical("SPY", "VOO"));
        assert!(catalog.are_identical("GOOGL", "GOOG"));
        // Same-index but different catalogs of holdings
        assert!(!catalog.are_identical("VOO", "VTI"));
        // Unknown tickers are identical only to themselves
        assert!(catalog.are_identical("AAPL", "AAPL"));
        assert!(!catalog.are_identical("AAPL", "MSFT"));
    }

    #[test]
    fn test_ambiguous_membership_rejected() {
        let groups = vec![
            EquivalenceGroup {
                group_id: "a".to_string(),
                display_name: "A".to_string(),
                member_tickers: vec!["SPY".to_string()],
            },
            EquivalenceGroup {
                group_id: "b".to_string(),
                display_name: "B".to_string(),
                member_tickers: vec!["SPY".to_string()],
            },
        ];

        let err = EquivalenceCatalog::new("v1", groups, Vec::new()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::AmbiguousMembership {
                ticker: "SPY".to_string(),
                first_group: "a".to_string(),
                second_group: "b".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_group_id_rejected() {
        let groups = vec![
            EquivalenceGroup {
                group_id: "a".to_string(),
                display_name: "A".to_string(),
                member_tickers: vec!["SPY".to_string()],
            },
            EquivalenceGroup {
                group_id: "a".to_string(),
                display_name: "A again".to_string(),
                member_tickers: vec!["VOO".to_string()],
            },
        ];

        let err = EquivalenceCatalog::new("v1", groups, Vec::new()).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateGroupId("a".to_string()));
    }

    #[test]
    fn test_empty_group_rejected() {
        let groups = vec![EquivalenceGroup {
            group_id: "a".to_string(),
            display_name: "A".to_string(),
            member_tickers: Vec::new(),
        }];

        let err = EquivalenceCatalog::new("v1", groups, Vec::new()).unwrap_err();
        assert_eq!(err, ConfigError::EmptyGroup("a".to_string()));
    }

    #[test]
    fn test_security_info_lookup() {
        let catalog = EquivalenceCatalog::builtin();
        let voo = catalog.security_info("VOO").unwrap();
        assert_eq!(voo.asset_class, "US Large Cap Blend");
        assert_eq!(voo.expense_ratio, Some(0.03));
        assert!(catalog.security_info("AAPL").is_none());
    }
}
