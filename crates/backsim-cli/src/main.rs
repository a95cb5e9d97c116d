use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use backsim_db::postgres::{PgPersistence, PgPriceSource, PgSignalSource, PgStrategyLoader};

#[derive(Parser)]
#[command(name = "backsim")]
#[command(about = "Discrete-minute backtesting engine for leveraged trading strategies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute a layered config hash + print the canonical merged JSON
    ConfigHash {
        /// Paths in merge order (base -> environment -> local overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Replay a date range of minute bars/signals against every active investor
    Run {
        /// Start of the replay window, ISO 8601, minute-truncated, inclusive
        #[arg(long)]
        start: String,

        /// End of the replay window, ISO 8601, minute-truncated, inclusive
        #[arg(long)]
        end: String,

        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    backsim_config::bootstrap_env();
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = backsim_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = backsim_db::status(&pool).await?;
                    println!("db_ok={} has_investors_table={}", s.ok, s.has_investors_table);
                }
                DbCmd::Migrate => {
                    backsim_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let loaded = backsim_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Run { start, end, config_paths } => {
            let loaded = backsim_config::load_layered_yaml(&config_paths)?;
            init_tracing(&loaded.config.log_filter);

            let ts_start = parse_minute_ts(&start).with_context(|| format!("invalid --start timestamp: {start}"))?;
            let ts_end = parse_minute_ts(&end).with_context(|| format!("invalid --end timestamp: {end}"))?;
            if ts_end < ts_start {
                bail!("--end must not be earlier than --start");
            }

            let pool = backsim_db::connect(&loaded.config.database_url).await?;

            let persistence = PgPersistence::new(pool.clone());
            let signals = PgSignalSource::new(pool.clone());
            let prices = PgPriceSource::new(pool.clone());
            let strategy_loader = PgStrategyLoader::new(pool);

            backsim_engine::run_backtest(ts_start, ts_end, &persistence, &signals, &prices, &strategy_loader).await?;

            println!("backtest_ok=true ts_start={ts_start} ts_end={ts_end}");
        }
    }

    Ok(())
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    Migrate,
}

fn init_tracing(filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
}

/// Parses an ISO 8601 timestamp into the engine's native minute-ts: minutes
/// since the Unix epoch, truncating any sub-minute component.
fn parse_minute_ts(s: &str) -> Result<i64> {
    let dt: DateTime<Utc> = DateTime::parse_from_rfc3339(s).context("not a valid ISO 8601 datetime")?.with_timezone(&Utc);
    Ok(dt.timestamp().div_euclid(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_ts_truncates_sub_minute_component() {
        assert_eq!(parse_minute_ts("1970-01-01T00:01:30Z").unwrap(), 1);
        assert_eq!(parse_minute_ts("1970-01-01T00:00:00Z").unwrap(), 0);
    }

    #[test]
    fn rejects_malformed_timestamp() {
        assert!(parse_minute_ts("not-a-date").is_err());
    }
}
