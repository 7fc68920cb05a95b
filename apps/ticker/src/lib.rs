//! # Tickbus Ticker
//!
//! A fixed-interval driving loop for [`tickbus_events::EventBus`]: background threads publish
//! game-style events while the loop publishes a heartbeat and drains the bus once per tick
//! within its time budget.
//!
//! ## Example
//! ```no_run
//! use tickbus_ticker::{Ticker, TickerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = TickerConfig { ticks: 60, ..TickerConfig::default() };
//!     let summary = Ticker::new(cfg)?.run(std::future::pending()).await?;
//!     println!("dispatched {}", summary.dispatched);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod events;
mod ticker;

pub use crate::config::{ConfigError, TickerConfig, load_config};
pub use crate::ticker::{RunSummary, Stats, Ticker};
