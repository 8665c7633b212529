// ===============================
// src/datagen.rs
// ===============================
//
// Synthetic input generator. Writes the four input files for the bond
// universe from a seeded RNG so runs are reproducible:
// - prices + market data in one pass per bond (oscillating mid, oscillating
//   book spread, five levels with level-proportional sizes)
// - trades and inquiries with alternating sides and cycling quantities
//
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::algo_execution::random_id_with;
use crate::error::Result;
use crate::fractional;
use crate::products::Bond;

const MID_START: f64 = 99.0;
const MID_LOW: f64 = 99.0;
const MID_HIGH: f64 = 101.0;
const MID_STEP: f64 = 1.0 / 256.0;

const FIX_SPREAD_LOW: f64 = 1.0 / 128.0;
const FIX_SPREAD_HIGH: f64 = 1.0 / 32.0;
const FIX_SPREAD_STEP: f64 = 1.0 / 128.0;

const BOOKS: [&str; 3] = ["TRSY1", "TRSY2", "TRSY3"];
const QUANTITIES: [i64; 5] = [1_000_000, 2_000_000, 3_000_000, 4_000_000, 5_000_000];
const TRADE_ID_LEN: usize = 12;

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn oscillate(value: &mut f64, increasing: &mut bool, step: f64, upper: f64, lower: f64) {
    if *increasing {
        *value += step;
        if *value >= upper {
            *increasing = false;
        }
    } else {
        *value -= step;
        if *value <= lower {
            *increasing = true;
        }
    }
}

/// Write the prices and market data files in one pass.
pub fn gen_order_book(
    bonds: &[Bond],
    price_path: impl AsRef<Path>,
    marketdata_path: impl AsRef<Path>,
    seed: u64,
    points_per_bond: usize,
) -> Result<()> {
    let mut price_file = BufWriter::new(File::create(price_path)?);
    let mut book_file = BufWriter::new(File::create(marketdata_path)?);
    let mut rng = StdRng::seed_from_u64(seed);

    writeln!(price_file, "Timestamp,CUSIP,Bid,Ask,Spread")?;
    writeln!(
        book_file,
        "Timestamp,CUSIP,Bid1,BidSize1,Ask1,AskSize1,Bid2,BidSize2,Ask2,AskSize2,\
         Bid3,BidSize3,Ask3,AskSize3,Bid4,BidSize4,Ask4,AskSize4,Bid5,BidSize5,Ask5,AskSize5"
    )?;

    for bond in bonds {
        let mut mid = MID_START;
        let mut mid_increasing = true;
        let mut fix_spread = FIX_SPREAD_LOW;
        let mut spread_increasing = true;
        let mut now = Utc::now();

        for _ in 0..points_per_bond {
            now += Duration::milliseconds(rng.gen_range(1..=20));
            let ts = timestamp(now);

            let random_spread: f64 = rng.gen_range(1.0 / 128.0..=1.0 / 64.0);
            writeln!(
                price_file,
                "{ts},{},{},{},{:.6}",
                bond.cusip,
                fractional::encode(mid - random_spread / 2.0),
                fractional::encode(mid + random_spread / 2.0),
                random_spread
            )?;

            write!(book_file, "{ts},{}", bond.cusip)?;
            for level in 1..=5i64 {
                let half = fix_spread * level as f64 / 2.0;
                let size = level * 1_000_000;
                write!(
                    book_file,
                    ",{},{size},{},{size}",
                    fractional::encode(mid - half),
                    fractional::encode(mid + half)
                )?;
            }
            writeln!(book_file)?;

            oscillate(&mut mid, &mut mid_increasing, MID_STEP, MID_HIGH, MID_LOW);
            oscillate(
                &mut fix_spread,
                &mut spread_increasing,
                FIX_SPREAD_STEP,
                FIX_SPREAD_HIGH,
                FIX_SPREAD_LOW,
            );
        }
    }

    price_file.flush()?;
    book_file.flush()?;
    Ok(())
}

/// Write the trades file: alternating sides, cycling books and quantities.
pub fn gen_trades(
    bonds: &[Bond],
    trade_path: impl AsRef<Path>,
    seed: u64,
    per_bond: usize,
) -> Result<()> {
    let mut file = BufWriter::new(File::create(trade_path)?);
    let mut rng = StdRng::seed_from_u64(seed);

    for bond in bonds {
        for i in 0..per_bond {
            let side = if i % 2 == 0 { "BUY" } else { "SELL" };
            let price: f64 = if side == "BUY" {
                rng.gen_range(99.0..100.0)
            } else {
                rng.gen_range(100.0..101.0)
            };
            writeln!(
                file,
                "{},{},{},{},{},{side}",
                bond.cusip,
                random_id_with(&mut rng, TRADE_ID_LEN),
                fractional::encode(price),
                BOOKS[i % BOOKS.len()],
                QUANTITIES[i % QUANTITIES.len()]
            )?;
        }
    }
    file.flush()?;
    Ok(())
}

/// Write the inquiries file: everything arrives in state RECEIVED.
pub fn gen_inquiries(
    bonds: &[Bond],
    inquiry_path: impl AsRef<Path>,
    seed: u64,
    per_bond: usize,
) -> Result<()> {
    let mut file = BufWriter::new(File::create(inquiry_path)?);
    let mut rng = StdRng::seed_from_u64(seed);

    for bond in bonds {
        for i in 0..per_bond {
            let side = if i % 2 == 0 { "BUY" } else { "SELL" };
            let price: f64 = if side == "BUY" {
                rng.gen_range(99.0..100.0)
            } else {
                rng.gen_range(100.0..101.0)
            };
            writeln!(
                file,
                "{},{},{side},{},{},RECEIVED",
                random_id_with(&mut rng, TRADE_ID_LEN),
                bond.cusip,
                QUANTITIES[i % QUANTITIES.len()],
                fractional::encode(price)
            )?;
        }
    }
    file.flush()?;
    Ok(())
}
