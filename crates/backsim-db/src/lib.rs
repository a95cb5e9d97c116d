//! Persistence outputs and read-side collaborators (spec §6).
//!
//! Two implementations of every trait: [`postgres`] (a real `sqlx` Postgres
//! adapter, production) and [`memory`] (a plain in-memory adapter, tests) —
//! neither requires a live database to exercise the engine's logic.

mod percentages;
mod traits;

pub mod memory;
pub mod postgres;

pub use percentages::{porc_sl, porc_tp};
pub use postgres::{connect, connect_from_env, migrate, status, DbStatus, ENV_DB_URL};
pub use traits::{Persistence, PriceSource, SignalSource, StrategyLoader};
