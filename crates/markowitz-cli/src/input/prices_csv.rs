use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::io::Read;
use std::str::FromStr;

use markowitz_core::returns::{PriceMatrix, PriceSeries};

use super::file;

/// Read a wide price table: an optional leading `date` column (YYYY-MM-DD)
/// followed by one column per ticker.
pub fn read_prices_csv(path: &str) -> Result<PriceMatrix, Box<dyn std::error::Error>> {
    let canonical = file::resolve_path(path)?;
    let handle = std::fs::File::open(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    parse_prices_csv(handle)
        .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e).into())
}

pub fn parse_prices_csv<R: Read>(reader: R) -> Result<PriceMatrix, Box<dyn std::error::Error>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let has_dates = headers
        .get(0)
        .map(|h| h.eq_ignore_ascii_case("date"))
        .unwrap_or(false);
    let first_asset = usize::from(has_dates);
    let tickers: Vec<String> = headers.iter().skip(first_asset).map(String::from).collect();
    if tickers.is_empty() {
        return Err("price CSV has no asset columns".into());
    }

    let mut dates: Vec<NaiveDate> = Vec::new();
    let mut columns: Vec<Vec<Decimal>> = vec![Vec::new(); tickers.len()];

    for (row_idx, record) in rdr.records().enumerate() {
        let record = record?;
        let line = row_idx + 2;
        if has_dates {
            let raw = record.get(0).unwrap_or_default();
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|e| format!("line {}: invalid date '{}': {}", line, raw, e))?;
            dates.push(date);
        }
        for (k, column) in columns.iter_mut().enumerate() {
            let raw = record.get(first_asset + k).unwrap_or_default();
            if raw.is_empty() {
                return Err(format!(
                    "line {}: missing price for {}; fill gaps before optimizing",
                    line, tickers[k]
                )
                .into());
            }
            let price = Decimal::from_str(raw)
                .map_err(|e| format!("line {}: invalid price '{}' for {}: {}", line, raw, tickers[k], e))?;
            column.push(price);
        }
    }

    let assets = tickers
        .into_iter()
        .zip(columns)
        .map(|(asset, prices)| PriceSeries { asset, prices })
        .collect();
    let matrix = PriceMatrix::new(assets);
    Ok(if has_dates {
        matrix.with_dates(dates)
    } else {
        matrix
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_dated_prices() {
        let csv = "date,AAA,BBB\n2024-01-02,100,50\n2024-01-03,101.5,49.8\n2024-01-04,102,50.1\n";
        let matrix = parse_prices_csv(csv.as_bytes()).unwrap();
        assert_eq!(matrix.asset_names(), vec!["AAA".to_string(), "BBB".to_string()]);
        assert_eq!(matrix.assets[0].prices, vec![dec!(100), dec!(101.5), dec!(102)]);
        assert_eq!(matrix.dates.as_ref().map(|d| d.len()), Some(3));
        assert!(matrix.validate().is_ok());
    }

    #[test]
    fn test_parse_without_date_column() {
        let csv = "AAA,BBB\n1,2\n3,4\n";
        let matrix = parse_prices_csv(csv.as_bytes()).unwrap();
        assert!(matrix.dates.is_none());
        assert_eq!(matrix.assets[1].prices, vec![dec!(2), dec!(4)]);
    }

    #[test]
    fn test_missing_price_is_rejected() {
        let csv = "date,AAA,BBB\n2024-01-02,100,\n";
        let err = parse_prices_csv(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("missing price for BBB"));
    }
}
