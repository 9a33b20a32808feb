//! Report Assembly
//!
//! Runs detection, matching, and aggregation over a transaction store and
//! assembles the engine's single output value. Reports are immutable
//! snapshots: identical inputs and as-of date produce identical reports.

use crate::aggregator::{Violation, ViolationAggregator, WindowResult, WindowStatus};
use crate::detector::{DataWarning, WindowDetector};
use crate::matcher::OverlapMatcher;
use crate::store::TransactionStore;
use chrono::NaiveDate;
use equivalence_catalog::EquivalenceCatalog;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use swap_recommender::SwapRecommender;
use tracing::debug;

/// Per-ticker rollup of window outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSummary {
    pub ticker: String,
    pub windows: usize,
    pub violated: usize,
    pub at_risk: usize,
    pub clean: usize,
    pub disallowed_loss: f64,
}

/// The engine's single output contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WashSaleReport {
    /// Reference date for window-elapsed classification
    pub as_of: NaiveDate,
    /// Catalog version that produced this report
    pub catalog_version: String,
    /// Every evaluated window, in sale order
    pub windows: Vec<WindowResult>,
    /// All violations across all windows, in window order
    pub violations: Vec<Violation>,
    /// Headline compliance number: sum of disallowed losses
    pub total_disallowed: f64,
    pub ticker_summaries: Vec<TickerSummary>,
    /// Rule-based facts for the presentation layer to phrase as it likes
    pub recommendations: Vec<String>,
    pub warnings: Vec<DataWarning>,
}

impl WashSaleReport {
    pub fn violated_windows(&self) -> usize {
        self.windows
            .iter()
            .filter(|w| w.status == WindowStatus::Violated)
            .count()
    }

    pub fn at_risk_windows(&self) -> usize {
        self.windows
            .iter()
            .filter(|w| w.status == WindowStatus::AtRisk)
            .count()
    }

    /// The date after which every currently at-risk window has elapsed,
    /// if no further purchases occur. None when nothing is at risk.
    pub fn next_clear_date(&self) -> Option<NaiveDate> {
        self.windows
            .iter()
            .filter(|w| w.status == WindowStatus::AtRisk)
            .map(|w| w.window.end_date)
            .max()
    }
}

/// Assembles a [`WashSaleReport`] from a store and a catalog snapshot.
pub struct ReportBuilder {
    catalog: EquivalenceCatalog,
    recommender: SwapRecommender,
}

impl ReportBuilder {
    pub fn new(catalog: EquivalenceCatalog) -> Self {
        let recommender = SwapRecommender::new(catalog.clone());
        Self {
            catalog,
            recommender,
        }
    }

    /// Evaluate the full history as of `as_of`.
    ///
    /// Pure and deterministic: no clock reads, no I/O. The caller chooses
    /// the as-of date so analyses are reproducible for any date.
    pub fn build(&self, store: &TransactionStore, as_of: NaiveDate) -> WashSaleReport {
        let detection = WindowDetector::detect_loss_sales(store);
        let mut warnings = detection.warnings;

        for tx in store.transactions() {
            if tx.date > as_of {
                warnings.push(DataWarning::FutureDatedTransaction {
                    ticker: tx.ticker.clone(),
                    date: tx.date,
                });
            }
        }

        let windows: Vec<WindowResult> = detection
            .loss_sales
            .into_iter()
            .map(|loss_sale| {
                let window = crate::detector::WashSaleWindow::new(loss_sale);
                let candidates = OverlapMatcher::matches(&window, store, &self.catalog);
                ViolationAggregator::aggregate(window, &candidates, as_of)
            })
            .collect();

        let violations: Vec<Violation> = windows
            .iter()
            .flat_map(|w| w.violations.iter().cloned())
            .collect();
        let total_disallowed: f64 = violations.iter().map(|v| v.disallowed_loss).sum();

        let ticker_summaries = Self::summarize_tickers(&windows);
        let recommendations = self.recommend(&windows, total_disallowed);

        debug!(
            windows = windows.len(),
            violations = violations.len(),
            total_disallowed,
            "wash sale report assembled"
        );

        WashSaleReport {
            as_of,
            catalog_version: self.catalog.version().to_string(),
            windows,
            violations,
            total_disallowed,
            ticker_summaries,
            recommendations,
            warnings,
        }
    }

    fn summarize_tickers(windows: &[WindowResult]) -> Vec<TickerSummary> {
        let mut by_ticker: BTreeMap<&str, TickerSummary> = BTreeMap::new();

        for result in windows {
            let entry = by_ticker
                .entry(result.window.anchor.ticker.as_str())
                .or_insert_with(|| TickerSummary {
                    ticker: result.window.anchor.ticker.clone(),
                    windows: 0,
                    violated: 0,
                    at_risk: 0,
                    clean: 0,
                    disallowed_loss: 0.0,
                });
            entry.windows += 1;
            match result.status {
                WindowStatus::Violated => entry.violated += 1,
                WindowStatus::AtRisk => entry.at_risk += 1,
                WindowStatus::Clean => entry.clean += 1,
            }
            entry.disallowed_loss += result.disallowed_loss();
        }

        by_ticker.into_values().collect()
    }

    fn recommend(&self, windows: &[WindowResult], total_disallowed: f64) -> Vec<String> {
        let mut recommendations = Vec::new();

        let violated = windows
            .iter()
            .filter(|w| w.status == WindowStatus::Violated)
            .count();
        let at_risk: Vec<&WindowResult> = windows
            .iter()
            .filter(|w| w.status == WindowStatus::AtRisk)
            .collect();

        if violated > 0 {
            recommendations.push(format!(
                "{} violated window(s) totaling ${:.2} disallowed; review before the next harvest",
                violated, total_disallowed
            ));
        }

        if let Some(clear_date) = at_risk.iter().map(|w| w.window.end_date).max() {
            recommendations.push(format!(
                "{} at-risk window(s) will clear naturally by {} if no further purchases occur",
                at_risk.len(),
                clear_date
            ));
        }

        let violated_tickers: BTreeSet<&str> = windows
            .iter()
            .filter(|w| w.status == WindowStatus::Violated)
            .map(|w| w.window.anchor.ticker.as_str())
            .collect();
        for ticker in violated_tickers {
            if let Some(swap) = self.recommender.best_swap(ticker) {
                recommendations.push(format!(
                    "Consider {} ({}) as a replacement for {}; it is not substantially identical",
                    swap.ticker, swap.name, ticker
                ));
            }
        }

        recommendations
    }
}
