use chrono::{Duration, NaiveDate};
use forecast_pipeline::config::PipelineConfig;
use forecast_pipeline::pipeline::{ForecastPipeline, ForecastRequest};
use forecast_pipeline::source::InMemoryDataSource;
use forecast_pipeline::table::{Cell, ColumnHeader, RawIndex, RawTable};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Forecast Pipeline: Basic Forecasting Example");
    println!("============================================\n");

    println!("Creating sample data...");
    let table = create_sample_daily_data(2 * 365)?;
    println!(
        "Sample data created: {} daily rows, composite headers: {}\n",
        table.len(),
        table.has_composite_headers()
    );

    let source = InMemoryDataSource::new().with_table("DEMO", table);
    let config = PipelineConfig {
        instruments: vec!["DEMO".to_string()],
        ..PipelineConfig::default()
    };
    let pipeline = ForecastPipeline::with_seasonal_model(source, config)?;

    let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).ok_or("invalid date")?;
    let output = pipeline.run(&ForecastRequest::as_of("DEMO", 1, as_of))?;

    println!("Stages: {:?}", output.stages);
    for warning in &output.warnings {
        println!("Warning: {}", warning);
    }

    println!(
        "\nTrained on {} observations ({} dropped)",
        output.training.len(),
        output.training.dropped_rows().len()
    );

    let last = output.training.last_timestamp().ok_or("empty training set")?;
    println!("\nForecast (every 30th day after {}):", last.date());
    for (i, record) in output.forecast.after(last).enumerate() {
        if i % 30 == 0 {
            println!(
                "  {}: {:.2} ({:.2}, {:.2})",
                record.timestamp.date(),
                record.point_estimate,
                record.lower_bound,
                record.upper_bound
            );
        }
    }

    println!("\n{}", output.forecast.to_dataframe()?.tail(Some(5)));
    Ok(())
}

/// Trend plus weekly and yearly cycles, with a few unusable values mixed in
fn create_sample_daily_data(days: usize) -> Result<RawTable, Box<dyn std::error::Error>> {
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).ok_or("invalid date")?;

    let mut dates = Vec::with_capacity(days);
    let mut rows = Vec::with_capacity(days);
    for i in 0..days {
        let t = i as f64;
        let close = 100.0
            + 0.05 * t
            + 2.0 * (2.0 * std::f64::consts::PI * t / 7.0).sin()
            + 8.0 * (2.0 * std::f64::consts::PI * t / 365.25).sin();

        dates.push(Cell::Text(
            (start + Duration::days(i as i64)).format("%Y-%m-%d").to_string(),
        ));
        let close = if i % 97 == 13 {
            Cell::Text("N/A".to_string())
        } else {
            Cell::Number(close)
        };
        rows.push(vec![close, Cell::Number(1_000_000.0 + 500.0 * t)]);
    }

    let headers = vec![
        ColumnHeader::composite(["Close", "DEMO"]),
        ColumnHeader::composite(["Volume", "DEMO"]),
    ];
    Ok(RawTable::new(headers, rows)?.with_index(RawIndex {
        name: Some("Date".to_string()),
        values: dates,
    })?)
}
