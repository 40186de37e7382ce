use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{
    ExpiryBucket, InventoryError, InventoryQuery, InventorySummary, Medicine, StockLevel,
};

/// Keeps the items matching every filter present in `query`.
pub fn apply_filters(
    items: Vec<Medicine>,
    query: &InventoryQuery,
    today: NaiveDate,
    low_stock_threshold: u32,
) -> Result<Vec<Medicine>, InventoryError> {
    if let Some(days) = query.expiring_within_days {
        if days < 0 {
            return Err(InventoryError::ValidationError(
                "expiring_within_days cannot be negative".to_string(),
            ));
        }
    }

    let needle = query
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    Ok(items
        .into_iter()
        .filter(|item| match &needle {
            Some(needle) => item.name.to_lowercase().contains(needle),
            None => true,
        })
        .filter(|item| match query.low_stock {
            Some(wanted) => (item.stock <= low_stock_threshold) == wanted,
            None => true,
        })
        .filter(|item| match query.expired {
            Some(wanted) => item.is_expired(today) == wanted,
            None => true,
        })
        .filter(|item| match query.expiring_within_days {
            Some(days) => item.expires_within(today, days),
            None => true,
        })
        .collect())
}

pub fn summarize(
    items: &[Medicine],
    today: NaiveDate,
    low_stock_threshold: u32,
    expiry_warning_days: i64,
) -> InventorySummary {
    let mut stock_levels: Vec<StockLevel> = items
        .iter()
        .map(|item| StockLevel {
            name: item.name.clone(),
            stock: item.stock,
        })
        .collect();
    stock_levels.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));

    let mut by_month: BTreeMap<String, ExpiryBucket> = BTreeMap::new();
    for item in items.iter().filter(|item| !item.is_expired(today)) {
        let month = item.expiry.format("%Y-%m").to_string();
        let bucket = by_month.entry(month.clone()).or_insert(ExpiryBucket {
            month,
            items: 0,
            units: 0,
        });
        bucket.items += 1;
        bucket.units = bucket.units.saturating_add(u64::from(item.stock));
    }

    InventorySummary {
        item_count: items.len(),
        total_units: items
            .iter()
            .fold(0u64, |total, item| total.saturating_add(u64::from(item.stock))),
        stock_value_cents: items
            .iter()
            .fold(0u64, |total, item| total.saturating_add(item.stock_value_cents())),
        low_stock_count: items
            .iter()
            .filter(|item| item.stock <= low_stock_threshold)
            .count(),
        expired_count: items.iter().filter(|item| item.is_expired(today)).count(),
        expiring_soon_count: items
            .iter()
            .filter(|item| item.expires_within(today, expiry_warning_days))
            .count(),
        low_stock_threshold,
        expiry_warning_days,
        stock_levels,
        expiry_by_month: by_month.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn medicine(name: &str, stock: u32, price_cents: u64, expiry: (i32, u32, u32)) -> Medicine {
        Medicine {
            id: Uuid::new_v4(),
            name: name.to_string(),
            stock,
            price_cents,
            expiry: NaiveDate::from_ymd_opt(expiry.0, expiry.1, expiry.2).unwrap(),
        }
    }

    fn inventory() -> Vec<Medicine> {
        vec![
            medicine("Amoxicillin", 4, 800, (2024, 6, 20)),
            medicine("Aspirin", 200, 150, (2026, 1, 1)),
            medicine("Cough Syrup", 12, 450, (2024, 5, 30)),
            medicine("Zinc", 10, 300, (2024, 7, 15)),
        ]
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let query = InventoryQuery {
            search: Some("  AS ".to_string()),
            ..Default::default()
        };
        let found = apply_filters(inventory(), &query, today(), 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Aspirin");
    }

    #[test]
    fn low_stock_uses_inclusive_threshold() {
        let query = InventoryQuery {
            low_stock: Some(true),
            ..Default::default()
        };
        let names: Vec<_> = apply_filters(inventory(), &query, today(), 10)
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["Amoxicillin", "Zinc"]);
    }

    #[test]
    fn expiring_window_excludes_already_expired() {
        let query = InventoryQuery {
            expiring_within_days: Some(30),
            ..Default::default()
        };
        let names: Vec<_> = apply_filters(inventory(), &query, today(), 10)
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["Amoxicillin"]);

        let expired = InventoryQuery {
            expired: Some(true),
            ..Default::default()
        };
        let found = apply_filters(inventory(), &expired, today(), 10).unwrap();
        assert_eq!(found[0].name, "Cough Syrup");
    }

    #[test]
    fn negative_window_is_rejected() {
        let query = InventoryQuery {
            expiring_within_days: Some(-1),
            ..Default::default()
        };
        assert!(apply_filters(inventory(), &query, today(), 10).is_err());
    }

    #[test]
    fn summary_counts_and_series() {
        let summary = summarize(&inventory(), today(), 10, 30);

        assert_eq!(summary.item_count, 4);
        assert_eq!(summary.total_units, 226);
        assert_eq!(summary.stock_value_cents, 4 * 800 + 200 * 150 + 12 * 450 + 10 * 300);
        assert_eq!(summary.low_stock_count, 2);
        assert_eq!(summary.expired_count, 1);
        assert_eq!(summary.expiring_soon_count, 1);

        assert_eq!(summary.stock_levels[0].name, "Amoxicillin");
        let months: Vec<_> = summary.expiry_by_month.iter().map(|b| b.month.as_str()).collect();
        assert_eq!(months, vec!["2024-06", "2024-07", "2026-01"]);
    }

    #[test]
    fn summary_of_bulk_stock_does_not_overflow() {
        let bulk: Vec<Medicine> = (0..100)
            .map(|i| {
                medicine(
                    &format!("Bulk {}", i),
                    u32::MAX,
                    crate::models::money::MAX_PRICE_CENTS,
                    (2030, 1, 1),
                )
            })
            .collect();

        let summary = summarize(&bulk, today(), 10, 30);

        assert_eq!(summary.item_count, 100);
        assert_eq!(summary.total_units, 100 * u64::from(u32::MAX));
        assert_eq!(summary.stock_value_cents, u64::MAX);
    }
}
