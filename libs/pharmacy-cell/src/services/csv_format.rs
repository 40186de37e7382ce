use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::models::{CsvPreview, InventoryError, Medicine, RowError};
use crate::services::fields::{format_price, parse_expiry, parse_name, parse_price, parse_stock};

pub const HEADER: [&str; 4] = ["name", "stock", "price", "expiry"];

/// Parses an inventory upload without committing it.
///
/// The first non-blank line must be the header; anything else rejects the
/// whole file. Each later non-blank line is one data row and ends up either as
/// an item or as a row error, so `items.len() + errors.len() == total_rows`.
/// A name repeated within the file is reported against the later line.
pub fn parse_inventory_csv(input: &str) -> Result<CsvPreview, InventoryError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input.as_bytes());
    let mut records = reader.records();

    let header = loop {
        match records.next() {
            None => return Err(InventoryError::EmptyFile),
            Some(Err(e)) => return Err(InventoryError::Malformed(e.to_string())),
            Some(Ok(record)) if is_blank(&record) => continue,
            Some(Ok(record)) => break record,
        }
    };
    check_header(&header)?;

    let mut preview = CsvPreview::default();
    let mut first_seen: HashMap<String, u64> = HashMap::new();

    for result in records {
        let record = match result {
            Ok(record) if is_blank(&record) => continue,
            Ok(record) => record,
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| line_at(input, p.byte()))
                    .unwrap_or_default();
                preview.total_rows += 1;
                preview.errors.push(RowError {
                    line,
                    message: format!("unreadable row: {}", e),
                });
                continue;
            }
        };

        let line = record
            .position()
            .map(|p| line_at(input, p.byte()))
            .unwrap_or_default();
        preview.total_rows += 1;

        match parse_row(&record) {
            Ok(medicine) => match first_seen.get(&medicine.name_key()) {
                Some(first_line) => preview.errors.push(RowError {
                    line,
                    message: format!(
                        "'{}' duplicates the medicine on line {}",
                        medicine.name, first_line
                    ),
                }),
                None => {
                    first_seen.insert(medicine.name_key(), line);
                    preview.items.push(medicine);
                }
            },
            Err(message) => preview.errors.push(RowError { line, message }),
        }
    }

    debug!(
        "Parsed inventory CSV: {} rows, {} valid, {} rejected",
        preview.total_rows,
        preview.items.len(),
        preview.errors.len()
    );
    Ok(preview)
}

/// Writes the inventory with the same header the importer expects.
pub fn export_inventory_csv(items: &[Medicine]) -> Result<String, InventoryError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer
        .write_record(HEADER)
        .map_err(|e| InventoryError::Export(e.to_string()))?;

    for item in items {
        let stock = item.stock.to_string();
        let price = format_price(item.price_cents);
        let expiry = item.expiry.format("%Y-%m-%d").to_string();
        writer
            .write_record([item.name.as_str(), stock.as_str(), price.as_str(), expiry.as_str()])
            .map_err(|e| InventoryError::Export(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| InventoryError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| InventoryError::Export(e.to_string()))
}

/// 1-based line of the record starting at `byte`. The reader's own line
/// counter skips empty lines, so the line is recounted from the text.
fn line_at(input: &str, byte: u64) -> u64 {
    let bytes = input.as_bytes();
    let start = usize::try_from(byte).unwrap_or(usize::MAX).min(bytes.len());
    let leading_breaks = bytes[start..]
        .iter()
        .take_while(|b| matches!(b, b'\r' | b'\n'))
        .count();
    let newlines = bytes[..start + leading_breaks]
        .iter()
        .filter(|&&b| b == b'\n')
        .count();
    newlines as u64 + 1
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

fn check_header(header: &StringRecord) -> Result<(), InventoryError> {
    let matches = header.len() == HEADER.len()
        && header
            .iter()
            .zip(HEADER)
            .all(|(found, expected)| found.trim().eq_ignore_ascii_case(expected));

    if matches {
        Ok(())
    } else {
        Err(InventoryError::HeaderMismatch(
            header.iter().collect::<Vec<_>>().join(","),
        ))
    }
}

fn parse_row(record: &StringRecord) -> Result<Medicine, String> {
    if record.len() != HEADER.len() {
        return Err(format!(
            "expected {} fields, found {}",
            HEADER.len(),
            record.len()
        ));
    }

    let mut problems = Vec::new();
    let name = parse_name(&record[0]).map_err(|e| problems.push(e)).ok();
    let stock = parse_stock(&record[1]).map_err(|e| problems.push(e)).ok();
    let price = parse_price(&record[2]).map_err(|e| problems.push(e)).ok();
    let expiry = parse_expiry(&record[3]).map_err(|e| problems.push(e)).ok();

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
