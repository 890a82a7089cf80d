pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;

pub use config::Config;
pub use domain::{
    CapTableSnapshot, Cents, CommonShareClass, Decimal, DownRound, EquityRound, LiquidationEvent,
    PreferredSeries, PreferredShareClass, SafeNote, SecurityId, SeniorityRank,
};
pub use engine::{
    AntiDilutionEngine, CalculationPolicy, EngineError, SafeConversionEngine, WaterfallEngine,
};
pub use error::AppError;
