//! Swap Recommender
//!
//! Proposes replacement securities that preserve market exposure without
//! being substantially identical to the security being sold. Pure lookup
//! and ranking over the equivalence catalog; no transaction history.

use equivalence_catalog::EquivalenceCatalog;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// A replacement candidate confirmed not substantially identical to the
/// source security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapCandidate {
    /// Symbol
    pub ticker: String,
    /// Fund or company name
    pub name: String,
    /// Same coarse asset class as the source security
    pub same_asset_class: bool,
    /// Annual expense ratio in percent
    pub expense_ratio: Option<f64>,
    /// The candidate's equivalence group differs from the source's.
    /// Candidates failing this check are filtered out before ranking, so
    /// the flag is true by construction; it is carried on the record so a
    /// downstream audit can re-verify against its own catalog.
    pub is_safe: bool,
}

/// Configuration for candidate filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// Skip funds above this expense ratio, in percent
    pub max_expense_ratio: f64,
    /// Only propose candidates from the source's asset class
    pub same_class_only: bool,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            max_expense_ratio: 0.75, // 75 bps
            same_class_only: false,
        }
    }
}

/// Ranks wash-sale-safe replacements for a ticker.
pub struct SwapRecommender {
    catalog: EquivalenceCatalog,
    config: RecommenderConfig,
}

impl SwapRecommender {
    /// Create a recommender over a catalog snapshot.
    pub fn new(catalog: EquivalenceCatalog) -> Self {
        Self {
            catalog,
            config: RecommenderConfig::default(),
        }
    }

    /// Create with custom configuration.
    pub fn with_config(catalog: EquivalenceCatalog, config: RecommenderConfig) -> Self {
        Self { catalog, config }
    }

    /// Propose up to `max_results` safe replacements for `ticker`.
    ///
    /// Ordering: same asset class first, then ascending expense ratio
    /// (unknown ratios last), then ticker. Candidates sharing the source's
    /// equivalence group are never returned. Fails softly: an unknown
    /// ticker or an asset class with no alternatives yields an empty list.
    pub fn suggest(&self, ticker: &str, max_results: usize) -> Vec<SwapCandidate> {
        let source = match self.catalog.security_info(ticker) {
            Some(info) => info,
            None => {
                debug!(ticker, "no metadata for ticker, no swaps to propose");
                return Vec::new();
            }
        };
        let source_group = self.catalog.group_of(ticker).group_id;

        let mut candidates: Vec<SwapCandidate> = self
            .catalog
            .securities()
            .filter(|info| info.ticker != ticker)
            .filter(|info| self.catalog.group_of(&info.ticker).group_id != source_group)
            .filter(|info| {
                info.expense_ratio
                    .is_none_or(|e| e <= self.config.max_expense_ratio)
            })
            .filter(|info| !self.config.same_class_only || info.asset_class == source.asset_class)
            .map(|info| SwapCandidate {
                ticker: info.ticker.clone(),
                name: info.name.clone(),
                same_asset_class: info.asset_class == source.asset_class,
                expense_ratio: info.expense_ratio,
                is_safe: true,
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.is_safe
                .cmp(&a.is_safe)
                .then(b.same_asset_class.cmp(&a.same_asset_class))
                .then_with(|| match (a.expense_ratio, b.expense_ratio) {
                    (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                })
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        candidates.truncate(max_results);

        debug!(ticker, count = candidates.len(), "ranked swap candidates");
        candidates
    }

    /// The top-ranked safe replacement, if any.
    pub fn best_swap(&self, ticker: &str) -> Option<SwapCandidate> {
        self.suggest(ticker, 1).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recommender() -> SwapRecommender {
        SwapRecommender::new(EquivalenceCatalog::builtin())
    }

    #[test]
    fn test_never_suggests_same_group() {
        let swaps = recommender().suggest("VOO", 10);

        assert!(!swaps.is_empty());
        for swap in &swaps {
            assert!(swap.is_safe);
            assert_ne!(swap.ticker, "SPY");
            assert_ne!(swap.ticker, "IVV");
            assert_ne!(swap.ticker, "SPLG");
        }
    }

    #[test]
    fn test_ranks_cheap_same_class_alternative_first() {
        let swaps = recommender().suggest("VOO", 5);

        // SCHX: same asset class, different group, 3 bps — beats VV (4 bps)
        // and any cross-class candidate.
        assert_eq!(swaps[0].ticker, "SCHX");
        assert!(swaps[0].same_asset_class);
        assert!(swaps.iter().all(|s| s.is_safe));
    }

    #[test]
    fn test_same_class_before_cheaper_cross_class() {
        let swaps = recommender().suggest("QQQ", 10);

        let first_cross = swaps.iter().position(|s| !s.same_asset_class);
        let last_same = swaps.iter().rposition(|s| s.same_asset_class);
        if let (Some(cross), Some(same)) = (first_cross, last_same) {
            assert!(same < cross, "same-class candidates must rank first");
        }
    }

    #[test]
    fn test_unknown_ticker_yields_empty() {
        assert!(recommender().suggest("ZZZT", 5).is_empty());
    }

    #[test]
    fn test_max_results_respected() {
        assert!(recommender().suggest("VOO", 2).len() <= 2);
    }

    #[test]
    fn test_expense_ratio_cap() {
        let config = RecommenderConfig {
            max_expense_ratio: 0.10,
            same_class_only: false,
        };
        let rec = SwapRecommender::with_config(EquivalenceCatalog::builtin(), config);

        for swap in rec.suggest("IEMG", 10) {
            // EEM (70 bps) must be excluded by the cap; it shares IEMG's
            // group anyway, but the cap also prunes expensive safe funds.
            assert!(swap.expense_ratio.is_none_or(|e| e <= 0.10));
        }
    }
}
