//! Перевод байтов в гигабайты и обратно (десятичные GB, как в API Outline).

use std::num::ParseIntError;
use thiserror::Error;

pub const BYTES_PER_GB: u64 = 1_000_000_000;

/// Отсутствующее значение считается нулём.
pub fn bytes_to_gb(bytes: Option<u64>) -> f64 {
    match bytes {
        Some(value) => value as f64 / BYTES_PER_GB as f64,
        None => 0.0,
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LimitError {
    #[error("{0}")]
    NotANumber(#[from] ParseIntError),
    #[error("больше {max} GB", max = u64::MAX / BYTES_PER_GB)]
    TooLarge,
}

pub fn gb_to_bytes(gb: &str) -> Result<u64, LimitError> {
    let gb: u64 = gb.trim().parse()?;
    gb.checked_mul(BYTES_PER_GB).ok_or(LimitError::TooLarge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_bytes_to_decimal_gigabytes() {
        assert_eq!(bytes_to_gb(None), 0.0);
        assert_eq!(bytes_to_gb(Some(0)), 0.0);
        assert_eq!(bytes_to_gb(Some(500_000_000)), 0.5);
        assert_eq!(bytes_to_gb(Some(1_000_000_000)), 1.0);
    }

    #[test]
    fn parses_gigabytes_into_bytes() {
        assert_eq!(gb_to_bytes("0").unwrap(), 0);
        assert_eq!(gb_to_bytes("5").unwrap(), 5_000_000_000);
        assert!(gb_to_bytes("abc").is_err());
        assert!(gb_to_bytes("-5").is_err());
        assert!(gb_to_bytes("1.5").is_err());
        assert_eq!(gb_to_bytes("99999999999"), Err(LimitError::TooLarge));
        assert_eq!(gb_to_bytes("18446744073").unwrap(), 18_446_744_073_000_000_000);
    }

    #[test]
    fn whole_gigabytes_survive_the_round_trip() {
        for gb in [0u64, 1, 7, 250, 10_000] {
            let bytes = gb_to_bytes(&gb.to_string()).unwrap();
            assert!((bytes_to_gb(Some(bytes)) - gb as f64).abs() < 1e-9);
        }
    }
}
