// ===============================
// src/main.rs
// ===============================
//
// CLI driver: recreate the data and result directories, generate the four
// input files for the bond universe, wire the service graph and run every
// connector to exhaustion. Exits nonzero on any unhandled pipeline error.
//
use std::fs;
use std::process::ExitCode;
use std::time::Duration;

use tracing::{error, info};

use tsy_trading_rust::config::{self, Args};
use tsy_trading_rust::error::Result;
use tsy_trading_rust::pipeline::TradingPipeline;
use tsy_trading_rust::{datagen, products};

fn prepare_directories(args: &Args) -> Result<()> {
    for dir in [&args.data_dir, &args.result_dir] {
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn generate_initial_data(args: &Args) -> Result<()> {
    let bonds = products::bond_universe();
    info!("generating price and order book data");
    datagen::gen_order_book(
        &bonds,
        args.price_path(),
        args.marketdata_path(),
        args.seed,
        args.price_points,
    )?;
    datagen::gen_trades(&bonds, args.trade_path(), args.seed, args.trade_count)?;
    datagen::gen_inquiries(&bonds, args.inquiry_path(), args.seed, args.inquiry_count)?;
    info!("data generation completed");
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    prepare_directories(args)?;
    generate_initial_data(args)?;

    let pipeline = TradingPipeline::new(
        &args.result_dir,
        Duration::from_millis(args.gui_throttle_ms),
        args.record_file.as_deref(),
    )?;
    info!("trading service components wired");

    pipeline.run(
        &args.price_path(),
        &args.marketdata_path(),
        &args.trade_path(),
        &args.inquiry_path(),
    )?;

    // end-of-run curve risk summary
    let risk = pipeline.risk.borrow();
    for sector in products::curve_sectors() {
        let bucketed = risk.bucketed_risk(&sector);
        info!(
            sector = %bucketed.product.name,
            pv01 = format!("{:.6}", bucketed.pv01),
            quantity = bucketed.quantity,
            "bucketed risk"
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = config::load();
    info!(
        data_dir = %args.data_dir.display(),
        result_dir = %args.result_dir.display(),
        seed = args.seed,
        price_points = args.price_points,
        trade_count = args.trade_count,
        inquiry_count = args.inquiry_count,
        "startup config"
    );

    match run(&args) {
        Ok(()) => {
            info!("trading system run completed");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "pipeline aborted");
            ExitCode::FAILURE
        }
    }
}
