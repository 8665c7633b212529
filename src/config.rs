// ===============================
// src/config.rs
// ===============================
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use dotenvy::dotenv;

use crate::gui::DEFAULT_THROTTLE_MS;

/// Runtime configuration, loaded once at startup from the environment
/// (with `.env` support).
#[derive(Clone, Debug)]
pub struct Args {
    // directories
    pub data_dir: PathBuf,
    pub result_dir: PathBuf,

    // synthetic data
    pub seed: u64,
    pub price_points: usize,   // prices + market data rows per bond
    pub trade_count: usize,    // trades per bond
    pub inquiry_count: usize,  // inquiries per bond

    // sinks
    pub gui_throttle_ms: u64,
    pub record_file: Option<PathBuf>,
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

pub fn load() -> Args {
    // make sure .env is read before anything else looks at the environment
    let _ = dotenv();

    Args {
        data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string())),
        result_dir: PathBuf::from(
            env::var("RESULT_DIR").unwrap_or_else(|_| "./result".to_string()),
        ),
        seed: parse_env("SEED", 20241220),
        price_points: parse_env("PRICE_POINTS", 10),
        trade_count: parse_env("TRADE_COUNT", 10),
        inquiry_count: parse_env("INQUIRY_COUNT", 10),
        gui_throttle_ms: parse_env("GUI_THROTTLE_MS", DEFAULT_THROTTLE_MS),
        record_file: env::var("RECORD_FILE").ok().map(PathBuf::from),
    }
}

impl Args {
    pub fn price_path(&self) -> PathBuf {
        self.data_dir.join("prices.txt")
    }

    pub fn marketdata_path(&self) -> PathBuf {
        self.data_dir.join("marketdata.txt")
    }

    pub fn trade_path(&self) -> PathBuf {
        self.data_dir.join("trades.txt")
    }

    pub fn inquiry_path(&self) -> PathBuf {
        self.data_dir.join("inquiries.txt")
    }
}
