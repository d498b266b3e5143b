use chrono::NaiveDate;
use forecast_pipeline::cache::{CachedDataSource, FetchCache};
use forecast_pipeline::config::PipelineConfig;
use forecast_pipeline::error::Result;
use forecast_pipeline::pipeline::{ForecastPipeline, ForecastRequest};
use forecast_pipeline::source::{CsvDataSource, DataSource, DateRange};
use forecast_pipeline::table::{Cell, CsvLayout, RawTable};
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Export with (field, ticker) headers and a named date row, as written by
/// common market-data downloaders
fn write_multi_header_export(dir: &TempDir, instrument: &str, days: usize) {
    let mut text = String::from("Price,Close,High,Low,Open,Volume\n");
    text.push_str(&format!("Ticker,{0},{0},{0},{0},{0}\n", instrument));
    text.push_str("Date,,,,,\n");
    for i in 0..days {
        let close = 140.0 + i as f64 * 0.5;
        text.push_str(&format!(
            "2023-12-{:02},{},{},{},{},{}\n",
            i + 1,
            close,
            close + 1.0,
            close - 1.0,
            close - 0.25,
            1_000 + i
        ));
    }
    fs::write(dir.path().join(format!("{}.csv", instrument)), text).unwrap();
}

fn multi_header_layout() -> CsvLayout {
    CsvLayout {
        header_rows: 3,
        index_column: true,
    }
}

#[test]
fn test_csv_source_reads_multi_header_export() {
    let dir = TempDir::new().unwrap();
    write_multi_header_export(&dir, "GOOG", 12);
    let source = CsvDataSource::new(dir.path(), multi_header_layout());
    let range = DateRange::new(date(2023, 12, 3), date(2023, 12, 8)).unwrap();

    let table = source.fetch("GOOG", &range).unwrap();

    assert_eq!(table.len(), 5);
    assert!(table.has_composite_headers());
    let index = table.index().unwrap();
    assert_eq!(index.name.as_deref(), Some("Date"));
    assert_eq!(index.values[0], Cell::Text("2023-12-03".to_string()));
    assert_eq!(table.headers()[0].levels(), &["Close", "GOOG", ""]);
}

#[test]
fn test_missing_export_is_an_empty_table() {
    let dir = TempDir::new().unwrap();
    let source = CsvDataSource::new(dir.path(), CsvLayout::default());
    let range = DateRange::new(date(2015, 1, 1), date(2024, 1, 1)).unwrap();

    assert!(source.fetch("NOPE", &range).unwrap().is_empty());
}

#[test]
fn test_csv_export_runs_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_multi_header_export(&dir, "MSFT", 10);
    let source = CsvDataSource::new(dir.path(), multi_header_layout());
    let pipeline = ForecastPipeline::with_seasonal_model(source, PipelineConfig::default()).unwrap();

    let output = pipeline
        .run(&ForecastRequest::as_of("MSFT", 1, date(2024, 1, 1)))
        .unwrap();

    assert_eq!(output.history.len(), 10);
    assert_eq!(output.history.records()[0].open, Some(139.75));
    assert_eq!(output.forecast.len(), 375);
}

/// Counts fetches and hands back a fixed table
#[derive(Debug, Default)]
struct CountingSource {
    calls: AtomicUsize,
}

impl DataSource for CountingSource {
    fn fetch(&self, _instrument: &str, _range: &DateRange) -> Result<RawTable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        RawTable::from_columns(
            vec!["Date", "Close"],
            vec![
                vec![Cell::Text("2024-01-02".to_string()), Cell::Number(1.0)],
                vec![Cell::Text("2024-01-03".to_string()), Cell::Number(2.0)],
            ],
        )
    }
}

#[test]
fn test_cached_source_fetches_once_per_day() {
    let cached = CachedDataSource::new(CountingSource::default(), FetchCache::new(None));
    let range = DateRange::new(date(2015, 1, 1), date(2024, 2, 1)).unwrap();

    let first = cached.fetch_as_of("GOOG", &range, date(2024, 2, 1)).unwrap();
    let second = cached.fetch_as_of("GOOG", &range, date(2024, 2, 1)).unwrap();
    assert_eq!(first, second);
    assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);

    cached.fetch_as_of("GOOG", &range, date(2024, 2, 2)).unwrap();
    cached.fetch_as_of("AAPL", &range, date(2024, 2, 1)).unwrap();
    assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 3);
    assert_eq!(cached.cache().len(), 3);
}

#[test]
fn test_concurrent_requests_share_one_fetch() {
    let cached = Arc::new(CachedDataSource::new(
        CountingSource::default(),
        FetchCache::new(None),
    ));
    let range = DateRange::new(date(2015, 1, 1), date(2024, 2, 1)).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cached = Arc::clone(&cached);
            thread::spawn(move || cached.fetch_as_of("GOOG", &range, date(2024, 2, 1)).unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().len(), 2);
    }

    assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_range_applies_when_date_is_not_the_first_column() {
    let dir = TempDir::new().unwrap();
    let mut text = String::from("Close,Volume,Date\n");
    for day in 1..=10 {
        text.push_str(&format!("{},{},2024-01-{:02}\n", 100 + day, 1_000, day));
    }
    fs::write(dir.path().join("AAPL.csv"), text).unwrap();
    let source = CsvDataSource::new(dir.path(), CsvLayout::default());
    let range = DateRange::new(date(2024, 1, 4), date(2024, 1, 7)).unwrap();

    let table = source.fetch("AAPL", &range).unwrap();

    assert_eq!(table.len(), 3);
    let dates: Vec<&Cell> = table.rows().iter().map(|row| &row[2]).collect();
    assert_eq!(
        dates,
        vec![
            &Cell::Text("2024-01-04".to_string()),
            &Cell::Text("2024-01-05".to_string()),
            &Cell::Text("2024-01-06".to_string()),
        ]
    );
}
