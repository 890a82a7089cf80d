//! Domain types for cap-table calculations.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper and integer Cents
//! - Identifiers, seniority ranks and day-count conventions
//! - Preferred series, share classes, SAFE notes and their contract terms
//! - Seniority ordering and result digests

pub mod decimal;
pub mod digest;
pub mod money;
pub mod ordering;
pub mod primitives;
pub mod safe;
pub mod series;
pub mod share_class;
pub mod terms;

pub use decimal::Decimal;
pub use digest::result_digest;
pub use money::Cents;
pub use ordering::{ensure_unique_ranks, sort_by_seniority, DuplicateRank, Ranked};
pub use primitives::{DayCount, SecurityId, SeniorityRank};
pub use safe::{EquityRound, MfnAdjustment, MfnImprovement, SafeNote, SafeTerms};
pub use series::{CapTableSnapshot, DownRound, PreferredSeries};
pub use share_class::{
    CommonShareClass, LiquidationEvent, LiquidationEventType, PreferredShareClass,
};
pub use terms::{AntiDilutionType, DividendPolicy, Participation};
