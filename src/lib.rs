pub use aggregate::SeasonOptions;
pub use client::RlpClient;
pub use error::{Result, ScrapeError};
pub use model::{MatchRecord, RangeReport, RoundFailure, SeasonOutcome, SeasonResult, Source};

pub(crate) mod aggregate;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod model;
pub mod normalize;
pub(crate) mod rlp;
pub mod sink;
