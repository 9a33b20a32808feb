//! Violation Aggregation
//!
//! Consumes candidate matches greedily, produces violation records with
//! proportional disallowed losses, and classifies each window.

use crate::detector::{WashSaleWindow, QTY_EPSILON};
use crate::matcher::CandidateMatch;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Classification of a wash sale window against the analysis date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowStatus {
    /// Window fully elapsed with zero matched quantity
    Clean,
    /// Window still open with zero matched quantity; a future buy could
    /// still trigger a violation
    AtRisk,
    /// Matched quantity is positive, regardless of elapsed state
    Violated,
}

impl std::fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowStatus::Clean => write!(f, "Clean"),
            WindowStatus::AtRisk => write!(f, "At Risk"),
            WindowStatus::Violated => write!(f, "Violated"),
        }
    }
}

/// A buy offsetting part of a realized loss inside one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Ticker of the loss sale
    pub ticker: String,
    /// Ingestion id of the loss sale
    pub sale_seq: usize,
    pub sale_date: NaiveDate,
    /// Ingestion id of the offsetting buy
    pub buy_seq: usize,
    /// Ticker of the offsetting buy (may differ within the group)
    pub buy_ticker: String,
    pub buy_date: NaiveDate,
    /// Shares of the loss offset by this buy
    pub matched_quantity: f64,
    /// Loss disallowed by this match
    pub disallowed_loss: f64,
    /// Basis increase owed to the offsetting shares. Reported for a
    /// downstream cost-basis tracker; this engine never applies it.
    pub adjusted_basis_add: f64,
}

/// One fully evaluated window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub window: WashSaleWindow,
    pub status: WindowStatus,
    pub violations: Vec<Violation>,
    /// Total shares matched across all violations, ≤ the anchor's
    /// loss quantity
    pub matched_quantity: f64,
}

impl WindowResult {
    /// Loss disallowed within this window.
    pub fn disallowed_loss(&self) -> f64 {
        self.violations.iter().map(|v| v.disallowed_loss).sum()
    }
}

/// Turns ordered candidate matches into violations and a window status.
pub struct ViolationAggregator;

impl ViolationAggregator {
    /// Greedily consume `candidates` (already ordered closest-in-time
    /// first) until the anchor's loss quantity is exhausted. Disallowed
    /// loss is proportional: matched shares times the anchor's per-share
    /// loss.
    pub fn aggregate(
        window: WashSaleWindow,
        candidates: &[CandidateMatch],
        as_of: NaiveDate,
    ) -> WindowResult {
        let mut remaining = window.anchor.loss_quantity;
        let mut violations = Vec::new();

        for candidate in candidates {
            if remaining <= QTY_EPSILON {
                break;
            }
            let matched = remaining.min(candidate.quantity);
            if matched <= QTY_EPSILON {
                continue;
            }
            remaining -= matched;

            let disallowed = matched * window.anchor.loss_per_share;
            violations.push(Violation {
                ticker: window.anchor.ticker.clone(),
                sale_seq: window.anchor.sale_seq,
                sale_date: window.anchor.sale_date,
                buy_seq: candidate.buy_seq,
                buy_ticker: candidate.ticker.clone(),
                buy_date: candidate.date,
                matched_quantity: matched,
                disallowed_loss: disallowed,
                adjusted_basis_add: disallowed,
            });
        }

        let matched_quantity = window.anchor.loss_quantity - remaining;
        let status = if matched_quantity > QTY_EPSILON {
            WindowStatus::Violated
        } else if window.is_elapsed(as_of) {
            WindowStatus::Clean
        } else {
            WindowStatus::AtRisk
        };

        WindowResult {
            window,
            status,
            violations,
            matched_quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::LossSale;
    use approx::assert_relative_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn window(loss_quantity: f64, loss_per_share: f64) -> WashSaleWindow {
        WashSaleWindow::new(LossSale {
            sale_seq: 1,
            lot_seq: 0,
            ticker: "VOO".to_string(),
            sale_date: date("2024-06-15"),
            loss_quantity,
            loss_per_share,
            loss_amount: loss_quantity * loss_per_share,
            partial_lot_warning: false,
        })
    }

    fn candidate(buy_seq: usize, ticker: &str, date_str: &str, qty: f64) -> CandidateMatch {
        let d = date(date_str);
        CandidateMatch {
            buy_seq,
            ticker: ticker.to_string(),
            date: d,
            quantity: qty,
            days_from_sale: (d - date("2024-06-15")).num_days().abs(),
        }
    }

    #[test]
    fn test_empty_candidates_elapsed_window_is_clean() {
        let result = ViolationAggregator::aggregate(window(100.0, 10.0), &[], date("2024-08-01"));

        assert_eq!(result.status, WindowStatus::Clean);
        assert!(result.violations.is_empty());
        assert_eq!(result.matched_quantity, 0.0);
    }

    #[test]
    fn test_empty_candidates_open_window_is_at_risk() {
        let result = ViolationAggregator::aggregate(window(100.0, 10.0), &[], date("2024-07-01"));
        assert_eq!(result.status, WindowStatus::AtRisk);
    }

    #[test]
    fn test_partial_match_violates_proportionally() {
        let candidates = vec![candidate(2, "SPY", "2024-06-25", 40.0)];
        let result =
            ViolationAggregator::aggregate(window(100.0, 10.0), &candidates, date("2024-07-01"));

        assert_eq!(result.status, WindowStatus::Violated);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].matched_quantity, 40.0);
        assert_relative_eq!(result.violations[0].disallowed_loss, 400.0);
        assert_relative_eq!(
            result.violations[0].adjusted_basis_add,
            result.violations[0].disallowed_loss
        );
    }

    #[test]
    fn test_greedy_consumption_stops_at_loss_quantity() {
        let candidates = vec![
            candidate(2, "SPY", "2024-06-20", 30.0),
            candidate(3, "IVV", "2024-07-05", 50.0),
            candidate(4, "SPY", "2024-07-10", 80.0),
        ];
        let result =
            ViolationAggregator::aggregate(window(100.0, 10.0), &candidates, date("2024-07-20"));

        // 30 + 50 + 20 = 100; the third candidate is clipped.
        assert_eq!(result.violations.len(), 3);
        assert_eq!(result.violations[2].matched_quantity, 20.0);
        assert_relative_eq!(result.matched_quantity, 100.0);

        let total_matched: f64 = result.violations.iter().map(|v| v.matched_quantity).sum();
        assert!(total_matched <= window(100.0, 10.0).anchor.loss_quantity + 1e-9);
        assert_relative_eq!(result.disallowed_loss(), 1000.0);
    }

    #[test]
    fn test_violated_even_after_window_elapses() {
        let candidates = vec![candidate(2, "SPY", "2024-06-25", 40.0)];
        let result =
            ViolationAggregator::aggregate(window(100.0, 10.0), &candidates, date("2025-01-01"));

        assert_eq!(result.status, WindowStatus::Violated);
    }

    #[test]
    fn test_disallowed_never_exceeds_realized_loss() {
        let candidates = vec![
            candidate(2, "SPY", "2024-06-20", 500.0),
            candidate(3, "IVV", "2024-06-21", 500.0),
        ];
        let w = window(100.0, 10.0);
        let loss_amount = w.anchor.loss_amount;
        let result = ViolationAggregator::aggregate(w, &candidates, date("2024-07-01"));

        assert!(result.disallowed_loss() <= loss_amount + 1e-9);
        assert_eq!(result.violations.len(), 1);
    }
}
