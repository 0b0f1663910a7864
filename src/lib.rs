pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod logging;
pub mod pipeline;

// Use cases and ports, and the concrete adapters behind them
pub mod app;
pub mod infra;

pub use app::{ExtractionReport, PositionExtractionUseCase};
pub use config::Config;
pub use error::{ExtractError, Result};
