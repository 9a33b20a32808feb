//! Loss Sale Detection
//!
//! Matches every sell against its originating buy lots (specific
//! identification when the sell carries a lot id, FIFO otherwise) and
//! derives the 61-day wash sale window around each loss-realizing sale.

use crate::store::{TradeSide, TransactionStore};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Days on either side of a loss sale covered by the wash sale rule.
/// The full window is 61 calendar days, bounds inclusive.
pub const WASH_SALE_WINDOW_DAYS: i64 = 30;

/// Share quantities below this are treated as fully consumed.
pub(crate) const QTY_EPSILON: f64 = 1e-6;

/// Non-fatal data quality findings attached to a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataWarning {
    /// A sell exceeded the buy quantity on record (short sale or
    /// incomplete import); loss was computed against available lots only.
    InsufficientLotHistory {
        ticker: String,
        sale_date: NaiveDate,
        unmatched_quantity: f64,
    },
    /// A transaction is dated after the analysis `as_of` date. It is
    /// included, but window classification uses `as_of` consistently.
    FutureDatedTransaction { ticker: String, date: NaiveDate },
}

/// The part of a sell realized at a loss against one originating lot.
///
/// A single sell splits into one of these per contributing lot, each with
/// its own per-share loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossSale {
    /// Ingestion id of the sell transaction
    pub sale_seq: usize,
    /// Ingestion id of the originating buy lot
    pub lot_seq: usize,
    pub ticker: String,
    pub sale_date: NaiveDate,
    /// Shares from this lot sold at a loss
    pub loss_quantity: f64,
    /// Cost basis minus proceeds, per share (positive)
    pub loss_per_share: f64,
    /// Total dollar loss before disallowance
    pub loss_amount: f64,
    /// The sell exceeded recorded buy history
    pub partial_lot_warning: bool,
}

/// The 61-day interval around a loss sale: 30 days either side of the
/// sale date, bounds inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WashSaleWindow {
    pub anchor: LossSale,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl WashSaleWindow {
    pub fn new(anchor: LossSale) -> Self {
        let start_date = anchor.sale_date - Duration::days(WASH_SALE_WINDOW_DAYS);
        let end_date = anchor.sale_date + Duration::days(WASH_SALE_WINDOW_DAYS);
        Self {
            anchor,
            start_date,
            end_date,
        }
    }

    /// Whether a date falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Whether the window has fully elapsed as of a date.
    pub fn is_elapsed(&self, as_of: NaiveDate) -> bool {
        as_of > self.end_date
    }

    /// Days until the window elapses, 0 once it has.
    pub fn days_remaining(&self, as_of: NaiveDate) -> i64 {
        (self.end_date - as_of).num_days().max(0)
    }
}

/// An open tax lot while replaying one ticker's history.
struct OpenLot {
    seq: usize,
    lot_id: Option<String>,
    remaining: f64,
    cost_per_share: f64,
}

/// Result of a detection pass.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub loss_sales: Vec<LossSale>,
    pub warnings: Vec<DataWarning>,
}

/// Replays transaction history per ticker and emits loss sales.
pub struct WindowDetector;

impl WindowDetector {
    /// Find every (sell, contributing lot) pair realized at a loss.
    ///
    /// Lots are consumed by specific identification when the sell carries a
    /// `lot_id`, FIFO by acquisition date otherwise. A sell with
    /// insufficient prior buy quantity is degraded to a warning, never a
    /// failure: the loss is computed against available lots only.
    pub fn detect_loss_sales(store: &TransactionStore) -> Detection {
        let mut detection = Detection::default();

        for ticker in store.tickers() {
            Self::detect_for_ticker(store, ticker, &mut detection);
        }

        // Global chronology: windows are reported in sale order.
        detection
            .loss_sales
            .sort_by_key(|ls| (ls.sale_seq, ls.lot_seq));
        debug!(
            loss_sales = detection.loss_sales.len(),
            "loss sale detection complete"
        );
        detection
    }

    fn detect_for_ticker(store: &TransactionStore, ticker: &str, detection: &mut Detection) {
        let mut open_lots: Vec<OpenLot> = Vec::new();

        for tx in store.transactions_for_ticker(ticker) {
            match tx.side {
                TradeSide::Buy => open_lots.push(OpenLot {
                    seq: tx.seq,
                    lot_id: tx.lot_id.clone(),
                    remaining: tx.quantity,
                    cost_per_share: tx.price_per_share,
                }),
                TradeSide::Sell => {
                    let mut remaining = tx.quantity;
                    let first_pair = detection.loss_sales.len();

                    for lot in open_lots.iter_mut() {
                        if remaining <= QTY_EPSILON {
                            break;
                        }
                        if lot.remaining <= QTY_EPSILON {
                            continue;
                        }
                        // Specific identification: only the named lot(s)
                        // may satisfy this sell.
                        if tx.lot_id.is_some() && lot.lot_id != tx.lot_id {
                            continue;
                        }

                        let matched = remaining.min(lot.remaining);
                        lot.remaining -= matched;
                        remaining -= matched;

                        let loss_per_share = lot.cost_per_share - tx.price_per_share;
                        if loss_per_share > 0.0 {
                            detection.loss_sales.push(LossSale {
                                sale_seq: tx.seq,
                                lot_seq: lot.seq,
                                ticker: tx.ticker.clone(),
                                sale_date: tx.date,
                                loss_quantity: matched,
                                loss_per_share,
                                loss_amount: matched * loss_per_share,
                                partial_lot_warning: false,
                            });
                        }
                    }

                    if remaining > QTY_EPSILON {
                        warn!(
                            ticker = %tx.ticker,
                            date = %tx.date,
                            unmatched = remaining,
                            "sell exceeds recorded buy history"
                        );
                        for pair in &mut detection.loss_sales[first_pair..] {
                            pair.partial_lot_warning = true;
                        }
                        detection.warnings.push(DataWarning::InsufficientLotHistory {
                            ticker: tx.ticker.clone(),
                            sale_date: tx.date,
                            unmatched_quantity: remaining,
                        });
                    }
                }
            }
        }
    }
}
