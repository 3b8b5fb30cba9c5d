//! String converters for values commonly scraped from French invoices.
//!
//! Every function turns a string into something else. The name describes the
//! accepted string then the returned type, e.g. [`amount_float_unit`] turns
//! `"25 028,80 €/mois"` into `(25028.8, "mois")`.

use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("empty value")]
    Empty,
    #[error("invalid number: {0:?}")]
    InvalidNumber(String),
    #[error("invalid date: {0:?}")]
    InvalidDate(String),
    #[error("expected exactly one {separator:?} in {value:?}")]
    Separator {
        separator: &'static str,
        value: String,
    },
    #[error("no unit found in {0:?}")]
    MissingUnit(String),
}

/// A number parsed from text: integral literals stay integers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Parse a `dd/mm/yyyy` or `dd/mm/yy` date. Two-digit years are in the 2000s.
///
/// `"09/05/2018"` and `"09/05/18"` both give 2018-05-09.
pub fn dmy_date(value: &str) -> Result<NaiveDate, ConvertError> {
    let invalid = || ConvertError::InvalidDate(value.to_string());

    let parts: Vec<&str> = value.split('/').map(str::trim).collect();
    let [day, month, year] = parts.as_slice() else {
        return Err(invalid());
    };
    let year = if year.len() == 2 {
        format!("20{year}")
    } else {
        year.to_string()
    };

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Parse an amount in euros or euro cents, rounded to 6 decimals.
///
/// - `"25 028,80 €"`, `"25 028,80 EUR"`, `"25 028,80"` → `25028.8`
/// - `"4,326 c€ "` → `0.04326`
pub fn amount_float(value: &str) -> Result<f64, ConvertError> {
    let cleaned = value.replace('€', "").to_lowercase().replace("eur", "");
    let cleaned = cleaned.trim();

    let (number, factor) = match cleaned.strip_suffix('c') {
        Some(rest) => (rest, 0.01),
        None if cleaned.is_empty() => return Err(ConvertError::Empty),
        None => (cleaned, 1.0),
    };
    let amount = str_float(number)?.as_f64() * factor;
    Ok(crate::layout::round_to(amount, 6))
}

/// Parse an amount followed by a per-unit suffix: `"25 028,80 €/mois"` →
/// `(25028.8, "mois")`.
pub fn amount_float_unit(value: &str) -> Result<(f64, String), ConvertError> {
    let (amount, unit) = split_once_exact(value, "/")?;
    Ok((amount_float(amount)?, unit.trim().to_string()))
}

/// Parse a percentage: `"20,00%"` → `20.0`.
pub fn percent_float(value: &str) -> Result<Number, ConvertError> {
    str_float(&value.replace('%', ""))
}

/// Parse a period: `"du 01/05/2018 au 31/05/2018"` → (2018-05-01, 2018-05-31).
pub fn str_period(value: &str) -> Result<(NaiveDate, NaiveDate), ConvertError> {
    let (from, to) = split_once_exact(value, " au ")?;
    let from = from.replace("du ", "");
    Ok((dmy_date(&from)?, dmy_date(to)?))
}

/// Parse a number followed by a unit.
///
/// - `"25 028 kWh"` → `(25028, "kWh")`
/// - `"- 25 028.2 € / W"` → `(-25028.2, "€ / W")`
pub fn str_float_unit(value: &str) -> Result<(Number, String), ConvertError> {
    static UNIT_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^-\d,. ]").unwrap());

    let value = value.trim();
    let start = UNIT_START
        .find(value)
        .map(|m| m.start())
        .ok_or_else(|| ConvertError::MissingUnit(value.to_string()))?;
    let (number, unit) = value.split_at(start);
    Ok((str_float(number.trim())?, unit.trim().to_string()))
}

/// Parse a number using space as thousands separator and either comma or
/// dot as decimal separator: `"25 028,80"` → `25028.8`, `"25"` → `25`.
pub fn str_float(value: &str) -> Result<Number, ConvertError> {
    let normalized = value.replace(' ', "").replace(',', ".");
    let normalized = normalized.trim();
    if normalized.is_empty() {
        return Err(ConvertError::Empty);
    }
    if let Ok(i) = normalized.parse::<i64>() {
        return Ok(Number::Int(i));
    }
    normalized
        .parse::<f64>()
        .map(Number::Float)
        .map_err(|_| ConvertError::InvalidNumber(value.to_string()))
}

/// Text right of the last colon: `"colon separated : value"` → `"value"`.
pub fn colon_right(line: &str) -> &str {
    line.rsplit(':').next().unwrap_or(line).trim()
}

fn split_once_exact<'a>(
    value: &'a str,
    separator: &'static str,
) -> Result<(&'a str, &'a str), ConvertError> {
    let mut parts = value.split(separator);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(left), Some(right), None) => Ok((left, right)),
        _ => Err(ConvertError::Separator {
            separator,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_dmy_date() {
        assert_eq!(dmy_date("09/05/2018").unwrap(), date(2018, 5, 9));
        assert_eq!(dmy_date("09/05/18").unwrap(), date(2018, 5, 9));
    }

    #[test]
    fn test_dmy_date_invalid() {
        assert!(matches!(dmy_date("31/02/2018"), Err(ConvertError::InvalidDate(_))));
        assert!(matches!(dmy_date("2018-05-09"), Err(ConvertError::InvalidDate(_))));
        assert!(matches!(dmy_date("aa/05/2018"), Err(ConvertError::InvalidDate(_))));
    }

    #[test]
    fn test_amount_float() {
        assert_eq!(amount_float("25 028,80 €").unwrap(), 25028.8);
        assert_eq!(amount_float("25 028,80 EUR").unwrap(), 25028.8);
        assert_eq!(amount_float("25 028,80").unwrap(), 25028.8);
        assert_eq!(amount_float("4,326 c€ ").unwrap(), 0.04326);
    }

    #[test]
    fn test_amount_float_empty() {
        assert_eq!(amount_float(" € "), Err(ConvertError::Empty));
    }

    #[test]
    fn test_amount_float_unit() {
        assert_eq!(
            amount_float_unit("25 028,80 €/mois").unwrap(),
            (25028.8, "mois".to_string())
        );
        assert!(matches!(
            amount_float_unit("25 028,80 €"),
            Err(ConvertError::Separator { .. })
        ));
    }

    #[test]
    fn test_percent_float() {
        assert_eq!(percent_float("20,00%").unwrap(), Number::Float(20.0));
        assert_eq!(percent_float("5%").unwrap(), Number::Int(5));
    }

    #[test]
    fn test_str_period() {
        assert_eq!(
            str_period("du 01/05/2018 au 31/05/2018").unwrap(),
            (date(2018, 5, 1), date(2018, 5, 31))
        );
        assert!(str_period("01/05/2018 - 31/05/2018").is_err());
    }

    #[test]
    fn test_str_float_unit() {
        assert_eq!(
            str_float_unit("25 028 kWh").unwrap(),
            (Number::Int(25028), "kWh".to_string())
        );
        assert_eq!(
            str_float_unit("- 25 028.2 € / W").unwrap(),
            (Number::Float(-25028.2), "€ / W".to_string())
        );
    }

    #[test]
    fn test_str_float_unit_errors() {
        assert!(matches!(
            str_float_unit("25 028"),
            Err(ConvertError::MissingUnit(_))
        ));
        // unit without a number in front
        assert_eq!(str_float_unit("kWh"), Err(ConvertError::Empty));
    }

    #[test]
    fn test_str_float() {
        assert_eq!(str_float("25 028,80").unwrap(), Number::Float(25028.8));
        assert_eq!(str_float("25").unwrap(), Number::Int(25));
        assert_eq!(str_float("-3").unwrap(), Number::Int(-3));
        assert!(matches!(str_float("abc"), Err(ConvertError::InvalidNumber(_))));
    }

    #[test]
    fn test_colon_right() {
        assert_eq!(colon_right("colon separated : value"), "value");
        assert_eq!(colon_right("no colon "), "no colon");
        assert_eq!(colon_right("a: b: c"), "c");
    }

    #[test]
    fn test_number_display() {
        assert_eq!(Number::Int(25028).to_string(), "25028");
        assert_eq!(Number::Float(20.5).to_string(), "20.5");
    }
}
