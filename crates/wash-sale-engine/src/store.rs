//! Transaction Store
//!
//! Normalizes and indexes caller-supplied trade history by ticker and by
//! equivalence group. Malformed records are rejected individually so one
//! bad row never blocks the whole analysis.

use chrono::NaiveDate;
use equivalence_catalog::EquivalenceCatalog;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use thiserror::Error;
use tracing::warn;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// A raw transaction as supplied by the caller. Dates are `YYYY-MM-DD`
/// calendar days with no time-of-day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub ticker: String,
    pub side: TradeSide,
    pub quantity: f64,
    pub price_per_share: f64,
    pub date: String,
    /// Links a sell to its originating buy lot(s) for specific
    /// identification; FIFO is used when absent.
    #[serde(default)]
    pub lot_id: Option<String>,
}

/// A validated transaction. Immutable once ingested; `seq` is the
/// ingestion id used for every ordering tie-break in the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub seq: usize,
    pub ticker: String,
    pub side: TradeSide,
    pub quantity: f64,
    pub price_per_share: f64,
    pub date: NaiveDate,
    pub lot_id: Option<String>,
}

/// Why a record failed validation.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordError {
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(f64),

    #[error("price must be non-negative, got {0}")]
    NegativePrice(f64),

    #[error("quantity and price must be finite")]
    NonFiniteNumber,

    #[error("unparseable date: {0}")]
    UnparseableDate(String),

    #[error("ticker is empty")]
    EmptyTicker,
}

/// A record that failed validation, returned alongside the usable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub record: TransactionRecord,
    pub reason: RecordError,
}

/// Result of ingestion: the valid subset plus the rejects.
#[derive(Debug)]
pub struct Ingested {
    pub store: TransactionStore,
    pub rejected: Vec<RejectedRecord>,
}

/// Indexed, immutable transaction history.
#[derive(Debug, Clone)]
pub struct TransactionStore {
    transactions: Vec<Transaction>,
    /// Ticker -> transaction indices, (date, seq)-ordered
    by_ticker: HashMap<String, Vec<usize>>,
    /// Equivalence group id -> transaction indices, (date, seq)-ordered
    by_group: HashMap<String, Vec<usize>>,
}

impl TransactionStore {
    /// Validate and index a batch of records.
    ///
    /// Legitimately identical trades can occur same-day, so duplicate rows
    /// are kept, not deduplicated. Invalid rows are collected into
    /// `rejected` and ingestion proceeds with the valid subset.
    pub fn ingest(records: Vec<TransactionRecord>, catalog: &EquivalenceCatalog) -> Ingested {
        let mut transactions = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();

        for record in records {
            match Self::validate(&record) {
                Ok(date) => {
                    let seq = transactions.len();
                    transactions.push(Transaction {
                        seq,
                        ticker: record.ticker,
                        side: record.side,
                        quantity: record.quantity,
                        price_per_share: record.price_per_share,
                        date,
                        lot_id: record.lot_id,
                    });
                }
                Err(reason) => rejected.push(RejectedRecord { record, reason }),
            }
        }

        if !rejected.is_empty() {
            warn!(
                rejected = rejected.len(),
                accepted = transactions.len(),
                "some transaction records failed validation"
            );
        }

        let mut by_ticker: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_group: HashMap<String, Vec<usize>> = HashMap::new();
        let mut order: Vec<usize> = (0..transactions.len()).collect();
        order.sort_by_key(|&i| (transactions[i].date, transactions[i].seq));

        for &i in &order {
            let tx = &transactions[i];
            by_ticker.entry(tx.ticker.clone()).or_default().push(i);
            let group_id = catalog.group_of(&tx.ticker).group_id;
            by_group.entry(group_id).or_default().push(i);
        }

        Ingested {
            store: TransactionStore {
                transactions,
                by_ticker,
                by_group,
            },
            rejected,
        }
    }

    fn validate(record: &TransactionRecord) -> Result<NaiveDate, RecordError> {
        if record.ticker.trim().is_empty() {
            return Err(RecordError::EmptyTicker);
        }
        if !record.quantity.is_finite() || !record.price_per_share.is_finite() {
            return Err(RecordError::NonFiniteNumber);
        }
        if record.quantity <= 0.0 {
            return Err(RecordError::NonPositiveQuantity(record.quantity));
        }
        if record.price_per_share < 0.0 {
            return Err(RecordError::NegativePrice(record.price_per_share));
        }
        NaiveDate::parse_from_str(&record.date, "%Y-%m-%d")
            .map_err(|_| RecordError::UnparseableDate(record.date.clone()))
    }

    /// All transactions in ingestion order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Look up a transaction by its ingestion id.
    pub fn get(&self, seq: usize) -> Option<&Transaction> {
        self.transactions.get(seq)
    }

    /// Tickers present in the history, sorted.
    pub fn tickers(&self) -> Vec<&str> {
        let mut tickers: Vec<&str> = self.by_ticker.keys().map(String::as_str).collect();
        tickers.sort_unstable();
        tickers
    }

    /// One ticker's transactions, ordered by date then ingestion order.
    pub fn transactions_for_ticker<'a>(
        &'a self,
        ticker: &str,
    ) -> impl Iterator<Item = &'a Transaction> + 'a {
        self.by_ticker
            .get(ticker)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.transactions[i])
    }

    /// An equivalence group's transactions with dates inside `range`,
    /// ordered by date then ingestion order.
    pub fn transactions_in_group<'a>(
        &'a self,
        group_id: &str,
        range: RangeInclusive<NaiveDate>,
    ) -> impl Iterator<Item = &'a Transaction> + 'a {
        self.by_group
            .get(group_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.transactions[i])
            .filter(move |tx| range.contains(&tx.date))
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
