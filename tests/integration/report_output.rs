//! Integration tests for CSV report export

use rust_decimal::Decimal;
use tempfile::TempDir;
use wholesale_profit_analyzer::fetch::{Source, SourcePayload, SourceResult};
use wholesale_profit_analyzer::identifier::ProductIdentifier;
use wholesale_profit_analyzer::merge::MergedRecord;
use wholesale_profit_analyzer::output::{CsvReportWriter, OutputWriter, ReportWriter};
use wholesale_profit_analyzer::profit::{self, ProfitOptions, ReferralFeeModel};
use wholesale_profit_analyzer::scheduler::ProductRow;
use wholesale_profit_analyzer::MatchedAsin;

fn row_for(record: MergedRecord, resumed: bool) -> ProductRow {
    let verdict = profit::compute(&record, &ReferralFeeModel::default(), &ProfitOptions::default())
        .unwrap();
    ProductRow {
        record,
        verdict,
        resumed,
    }
}

fn matched_record() -> MergedRecord {
    let identifier = ProductIdentifier::new(
        "4901234567894",
        Decimal::from(1000),
        "https://wholesale.example/item/1",
    )
    .unwrap();
    let mut record = MergedRecord::new(identifier);
    record
        .apply(
            Source::Catalog,
            SourceResult::Success(SourcePayload::Catalog(MatchedAsin {
                asin: "B01EXAMPLE1".to_string(),
                title: "Sample Product".to_string(),
                current_price: Decimal::from(3000),
                sales_rank: Some(1200),
            })),
        )
        .unwrap();
    record
        .apply(Source::PriceHistory, SourceResult::NotFound)
        .unwrap();
    record
        .apply(Source::CompetitorPrice, SourceResult::NotFound)
        .unwrap();
    record
}

fn unmatched_record() -> MergedRecord {
    let identifier = ProductIdentifier::new(
        "49123456",
        Decimal::from(500),
        "https://wholesale.example/item/2",
    )
    .unwrap();
    let mut record = MergedRecord::new(identifier);
    record.apply(Source::Catalog, SourceResult::NotFound).unwrap();
    record.mark_skipped(Source::PriceHistory).unwrap();
    record.mark_skipped(Source::CompetitorPrice).unwrap();
    record
}

#[test]
fn test_report_contains_one_row_per_product() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.csv");

    let mut writer = CsvReportWriter::new(&path).unwrap();
    writer
        .write_rows(&[row_for(matched_record(), false), row_for(unmatched_record(), true)])
        .unwrap();
    assert_eq!(writer.rows_written(), 2);
    writer.close().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3, "header plus one line per product");

    let header = lines[0];
    for column in [
        "jan_code",
        "verdict",
        "unmatched_reason",
        "sell_price",
        "expected_profit",
        "expected_margin",
        "confidence",
        "resolution",
        "catalog_outcome",
        "resumed",
    ] {
        assert!(header.contains(column), "missing column {column}");
    }
}

#[test]
fn test_analyzed_row_carries_profit_figures() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.csv");

    let mut writer = CsvReportWriter::new(&path).unwrap();
    writer.write_row(&row_for(matched_record(), false)).unwrap();
    writer.close().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let row = content.lines().nth(1).unwrap();

    assert!(row.contains("4901234567894"));
    assert!(row.contains("analyzed"));
    assert!(row.contains("B01EXAMPLE1"));
    // 3000 sell price, 450 fee, 1000 wholesale cost over one expected sale.
    assert!(row.contains("1550"));
    assert!(row.contains("0.5167"));
    assert!(row.contains("low"));
    // No failures or skips: record resolved completely.
    assert!(row.contains("complete"));
    assert!(row.contains("no_data"));
}

#[test]
fn test_unmatched_row_has_empty_profit_columns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.csv");

    let mut writer = CsvReportWriter::new(&path).unwrap();
    writer.write_row(&row_for(unmatched_record(), true)).unwrap();
    writer.close().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let row = content.lines().nth(1).unwrap();

    assert!(row.contains("49123456"));
    assert!(row.contains("unmatched"));
    assert!(row.contains("no_catalog_match"));
    assert!(row.contains("skipped"));
    assert!(row.contains("true"));
    // Empty profit figures appear as consecutive separators.
    assert!(row.contains(",,"));
    assert!(!row.contains("analyzed"));
}
