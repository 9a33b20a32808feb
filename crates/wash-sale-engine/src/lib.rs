//! Wash Sale Compliance Engine
//!
//! Determines which realized losses are disallowed under the IRS wash sale
//! rule (26 U.S.C. §1091), tracks the 61-day risk window around every loss
//! sale, and reports the basis adjustments owed to the replacement shares.
//!
//! The engine is a pure function of transaction history, a security
//! equivalence catalog, and an explicit as-of date: no I/O, no clock
//! reads, no shared mutable state. Rebuilding with identical inputs yields
//! an identical report.

pub mod aggregator;
pub mod detector;
pub mod matcher;
pub mod report;
pub mod store;

pub use aggregator::{Violation, ViolationAggregator, WindowResult, WindowStatus};
pub use detector::{
    DataWarning, Detection, LossSale, WashSaleWindow, WindowDetector, WASH_SALE_WINDOW_DAYS,
};
pub use matcher::{CandidateMatch, OverlapMatcher};
pub use report::{ReportBuilder, TickerSummary, WashSaleReport};
pub use store::{
    Ingested, RecordError, RejectedRecord, TradeSide, Transaction, TransactionRecord,
    TransactionStore,
};

pub use equivalence_catalog::{
    ConfigError, EquivalenceCatalog, EquivalenceGroup, SecurityInfo,
};
pub use swap_recommender::{RecommenderConfig, SwapCandidate, SwapRecommender};
