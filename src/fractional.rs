// ===============================
// src/fractional.rs
// ===============================
//
// US Treasury fractional price codec.
//
// Quotes look like "99-16+": integer part, two digits of 32nds, one digit of
// extra 256ths where '+' stands for 4 (half a 32nd). The fractional field is
// exactly three characters.
//
use crate::error::{PipelineError, Result};

const BASE32: f64 = 32.0;
const BASE256: f64 = 256.0;
const FRACTIONAL_LEN: usize = 3;

/// Parse a fractional price string into its decimal value.
pub fn decode(quote: &str) -> Result<f64> {
    let (int_part, frac_part) = quote
        .split_once('-')
        .ok_or_else(|| PipelineError::MalformedInput(format!("no dash in price {quote:?}")))?;

    let whole: f64 = int_part
        .parse()
        .map_err(|_| PipelineError::MalformedInput(format!("bad integer part in {quote:?}")))?;

    if frac_part.len() != FRACTIONAL_LEN {
        return Err(PipelineError::MalformedInput(format!(
            "fractional part of {quote:?} must be {FRACTIONAL_LEN} characters"
        )));
    }

    let thirtyseconds: f64 = frac_part[..2]
        .parse()
        .map_err(|_| PipelineError::MalformedInput(format!("bad 32nds in {quote:?}")))?;

    let last = &frac_part[2..];
    let ticks: f64 = if last == "+" {
        4.0
    } else {
        last.parse()
            .map_err(|_| PipelineError::MalformedInput(format!("bad 256ths in {quote:?}")))?
    };

    Ok(whole + thirtyseconds / BASE32 + ticks / BASE256)
}

/// Render a decimal price in fractional notation. The 32nds field is
/// zero-padded and a 256ths digit of 4 renders as '+'.
pub fn encode(price: f64) -> String {
    let whole = price.floor() as i64;
    let frac = price - whole as f64;

    let thirtyseconds = (frac * BASE32) as i64;
    let ticks = (frac * BASE256) as i64 % 8;

    let last = if ticks == 4 {
        "+".to_string()
    } else {
        ticks.to_string()
    };
    format!("{whole}-{thirtyseconds:02}{last}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plus_alias() {
        assert_eq!(decode("99-16+").unwrap(), 99.0 + 16.0 / 32.0 + 4.0 / 256.0);
        assert_eq!(decode("99-16+").unwrap(), 99.515625);
        assert_eq!(decode("99-164").unwrap(), decode("99-16+").unwrap());
    }

    #[test]
    fn decodes_edges() {
        assert_eq!(decode("100-000").unwrap(), 100.0);
        assert_eq!(decode("99-317").unwrap(), 99.0 + 31.0 / 32.0 + 7.0 / 256.0);
        assert_eq!(decode("0-001").unwrap(), 1.0 / 256.0);
    }

    #[test]
    fn encodes_with_padding_and_plus() {
        assert_eq!(encode(100.0), "100-000");
        assert_eq!(encode(99.515625), "99-16+");
        assert_eq!(encode(99.0 + 1.0 / 32.0), "99-010");
        assert_eq!(encode(99.0 + 31.0 / 32.0 + 7.0 / 256.0), "99-317");
    }

    #[test]
    fn round_trips_every_grid_point() {
        // one integer's worth of the 256ths grid covers all field combinations
        for n in 0..256 {
            let px = 99.0 + n as f64 / 256.0;
            let quote = encode(px);
            assert_eq!(decode(&quote).unwrap(), px, "quote {quote}");
        }
    }

    #[test]
    fn rejects_malformed() {
        assert!(decode("99162").is_err());
        assert!(decode("99-16").is_err());
        assert!(decode("99-1624").is_err());
        assert!(decode("99-162+").is_err());
        assert!(decode("xx-160").is_err());
        assert!(decode("99-ab0").is_err());
    }
}
