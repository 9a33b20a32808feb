//! Overlap Matching
//!
//! Scans an equivalence group's transaction history for buys landing
//! inside a wash sale window and orders them by proximity to the sale.

use crate::detector::WashSaleWindow;
use crate::store::{TradeSide, TransactionStore};
use chrono::NaiveDate;
use equivalence_catalog::EquivalenceCatalog;
use serde::{Deserialize, Serialize};

/// A buy inside a loss sale's window, before greedy consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    /// Ingestion id of the offsetting buy
    pub buy_seq: usize,
    pub ticker: String,
    pub date: NaiveDate,
    pub quantity: f64,
    /// |buy date − sale date| in days
    pub days_from_sale: i64,
}

/// Finds offsetting acquisitions for a wash sale window.
pub struct OverlapMatcher;

impl OverlapMatcher {
    /// All buys of any ticker in the sale's equivalence group whose date
    /// falls inside the window, ordered closest-in-time first, ties broken
    /// by ingestion order.
    ///
    /// The buy that originated the very lot being sold is excluded: selling
    /// a lot is not offset by the purchase that created it.
    pub fn matches(
        window: &WashSaleWindow,
        store: &TransactionStore,
        catalog: &EquivalenceCatalog,
    ) -> Vec<CandidateMatch> {
        let group = catalog.group_of(&window.anchor.ticker);
        let sale_date = window.anchor.sale_date;

        let mut candidates: Vec<CandidateMatch> = store
            .transactions_in_group(&group.group_id, window.start_date..=window.end_date)
            .filter(|tx| tx.side == TradeSide::Buy)
            .filter(|tx| tx.seq != window.anchor.lot_seq)
            .map(|tx| CandidateMatch {
                buy_seq: tx.seq,
                ticker: tx.ticker.clone(),
                date: tx.date,
                quantity: tx.quantity,
                days_from_sale: (tx.date - sale_date).num_days().abs(),
            })
            .collect();

        candidates.sort_by_key(|c| (c.days_from_sale, c.buy_seq));
        candidates
    }
}
