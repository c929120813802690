mod ai;
mod config;
mod constants;
mod credentials;
mod digest;
mod mail;
mod oauth;
mod pipeline;

use anyhow::Result;
use std::env;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::digest::TimeRange;
use crate::pipeline::RunOutcome;

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,inbrief=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_usage() {
    eprintln!(
        r#"inbrief - AI email digest for your inbox

Usage: inbrief [command] [range]

Commands:
    (none)      Generate and send a digest
    preview     Generate the digest entries and print them as JSON
    help        Show this help message

Ranges:
    daily       Last 24 hours (default)
    morning     Yesterday 2pm through today 9am
    afternoon   Today 9am through 2pm

Configuration file: ~/.config/inbrief/config.toml
Set INBRIEF_PROFILE to use config.<profile>.toml instead.
"#
    );
}

fn parse_range(arg: Option<&str>) -> Result<TimeRange> {
    match arg {
        None => Ok(TimeRange::Daily),
        Some(s) => TimeRange::parse(s)
            .ok_or_else(|| anyhow::anyhow!("Unknown time range: {} (expected daily|morning|afternoon)", s)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let (preview, range_arg) = match args.get(1).map(|s| s.as_str()) {
        Some("help") | Some("--help") | Some("-h") => {
            print_usage();
            return Ok(());
        }
        Some("preview") => (true, args.get(2).map(|s| s.as_str())),
        other => (false, other),
    };

    let range = match parse_range(range_arg) {
        Ok(range) => range,
        Err(e) => {
            eprintln!("{}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    setup_logging();

    let config = Config::load()?;
    Config::ensure_dirs()?;

    match pipeline::run(&config, range, preview).await? {
        RunOutcome::Empty => println!("No recent conversations found."),
        RunOutcome::Sent { conversations } => {
            println!("Digest with {} conversation(s) sent to {}.", conversations, config.digest_recipient())
        }
        RunOutcome::Previewed { conversations } => {
            eprintln!("Previewed {} conversation(s); nothing sent.", conversations)
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range(None).unwrap(), TimeRange::Daily);
        assert_eq!(parse_range(Some("morning")).unwrap(), TimeRange::Morning);
        assert!(parse_range(Some("weekly")).is_err());
    }
}
