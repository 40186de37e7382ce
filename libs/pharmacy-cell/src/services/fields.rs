use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use uuid::Uuid;

use crate::models::{money, Medicine, MedicineInput};

pub const MAX_NAME_LEN: usize = 120;

fn price_regex() -> &'static Regex {
    static PRICE: OnceLock<Regex> = OnceLock::new();
    PRICE.get_or_init(|| Regex::new(r"^(\d+)(?:\.(\d{1,2}))?$").expect("price pattern is valid"))
}

pub fn parse_name(raw: &str) -> Result<String, String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err("name is required".to_string());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!("name is longer than {} characters", MAX_NAME_LEN));
    }
    Ok(name.to_string())
}

pub fn parse_stock(raw: &str) -> Result<u32, String> {
    let raw = raw.trim();
    let value: i64 = raw
        .parse()
        .map_err(|_| format!("stock '{}' is not a whole number", raw))?;
    stock_from_int(value)
}

pub fn stock_from_int(value: i64) -> Result<u32, String> {
    if value < 0 {
        return Err(format!("stock cannot be negative ({})", value));
    }
    u32::try_from(value).map_err(|_| format!("stock {} is too large", value))
}

/// `12`, `12.5` and `12.50` are accepted; values are returned in cents.
pub fn parse_price(raw: &str) -> Result<u64, String> {
    let raw = raw.trim();
    let captures = price_regex().captures(raw).ok_or_else(|| {
        format!(
            "price '{}' must be a non-negative amount with at most two decimals",
            raw
        )
    })?;

    let whole: u64 = captures[1]
        .parse()
        .map_err(|_| format!("price '{}' is too large", raw))?;
    let fraction = match captures.get(2) {
        Some(digits) if digits.as_str().len() == 1 => digits.as_str().parse::<u64>().unwrap_or(0) * 10,
        Some(digits) => digits.as_str().parse::<u64>().unwrap_or(0),
        None => 0,
    };

    whole
        .checked_mul(100)
        .and_then(|cents| cents.checked_add(fraction))
        .filter(|cents| *cents <= money::MAX_PRICE_CENTS)
        .ok_or_else(|| {
            format!(
                "price '{}' exceeds the maximum of {}",
                raw,
                format_price(money::MAX_PRICE_CENTS)
            )
        })
}

pub fn format_price(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

pub fn parse_expiry(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("expiry '{}' must be a date in YYYY-MM-DD format", raw))
}

/// Validates a form payload into a new inventory item.
pub fn medicine_from_input(input: &MedicineInput) -> Result<Medicine, String> {
    let mut problems = Vec::new();

    let name = parse_name(&input.name).map_err(|e| problems.push(e)).ok();
    let stock = stock_from_int(input.stock).map_err(|e| problems.push(e)).ok();
    let price = money::cents_from_decimal(input.price)
        .map_err(|e| problems.push(e))
        .ok();
    let expiry = parse_expiry(&input.expiry).map_err(|e| problems.push(e)).ok();

    match (name, stock, price, expiry) {
        (Some(name), Some(stock), Some(price_cents), Some(expiry)) => Ok(Medicine {
            id: Uuid::new_v4(),
            name,
            stock,
            price_cents,
            expiry,
        }),
        _ => Err(problems.join("; ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_convert_to_cents() {
        assert_eq!(parse_price("12").unwrap(), 1200);
        assert_eq!(parse_price("12.5").unwrap(), 1250);
        assert_eq!(parse_price(" 0.05 ").unwrap(), 5);
        assert!(parse_price("12.345").is_err());
        assert!(parse_price("-1").is_err());
        assert!(parse_price("1e3").is_err());
        assert!(parse_price("").is_err());
    }

    #[test]
    fn prices_above_the_cap_are_rejected() {
        assert_eq!(parse_price("1000000").unwrap(), money::MAX_PRICE_CENTS);
        let err = parse_price("100000000000").unwrap_err();
        assert!(err.contains("maximum of 1000000.00"));
        assert!(money::cents_from_decimal(1e30).is_err());
        assert!(money::cents_from_decimal(1_000_000.01).is_err());
        assert_eq!(money::cents_from_decimal(999_999.99).unwrap(), 99_999_999);
    }

    #[test]
    fn prices_format_with_two_decimals() {
        assert_eq!(format_price(1250), "12.50");
        assert_eq!(format_price(5), "0.05");
        assert_eq!(format_price(0), "0.00");
    }

    #[test]
    fn stock_must_be_a_non_negative_integer() {
        assert_eq!(parse_stock("42").unwrap(), 42);
        assert!(parse_stock("-3").is_err());
        assert!(parse_stock("4.5").is_err());
        assert!(parse_stock("lots").is_err());
    }

    #[test]
    fn expiry_is_iso_date() {
        assert!(parse_expiry("2025-12-31").is_ok());
        assert!(parse_expiry("31/12/2025").is_err());
        assert!(parse_expiry("2025-02-30").is_err());
    }

    #[test]
    fn input_collects_every_problem() {
        let input = MedicineInput {
            name: " ".to_string(),
            stock: -1,
            price: 2.5,
            expiry: "soon".to_string(),
        };
        let err = medicine_from_input(&input).unwrap_err();
        assert!(err.contains("name is required"));
        assert!(err.contains("stock cannot be negative"));
        assert!(err.contains("expiry"));
        assert!(!err.contains("price"));
    }
}
