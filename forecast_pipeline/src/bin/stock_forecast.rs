use clap::Parser;
use forecast_pipeline::cache::{CachedDataSource, FetchCache};
use forecast_pipeline::config::PipelineConfig;
use forecast_pipeline::pipeline::{ForecastPipeline, ForecastRequest, PipelineOutput};
use forecast_pipeline::source::CsvDataSource;
use forecast_pipeline::table::CsvLayout;
use polars::prelude::{CsvWriter, SerWriter};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

/// Rows shown from the end of the history and the forecast
const TAIL_ROWS: usize = 5;

/// Forecast daily closing prices from CSV exports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding <INSTRUMENT>.csv exports
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Instrument to forecast
    #[arg(long, default_value = "GOOG")]
    instrument: String,

    /// Years of prediction
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    years: u32,

    /// Header lines in the CSV exports (more than one means composite headers)
    #[arg(long, default_value_t = 1)]
    header_rows: usize,

    /// Treat the first CSV column as the date index
    #[arg(long, default_value_t = false)]
    index_column: bool,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the forecast to this CSV file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the forecast as JSON instead of a summary
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    let layout = CsvLayout {
        header_rows: cli.header_rows,
        index_column: cli.index_column,
    };
    let source = CachedDataSource::new(
        CsvDataSource::new(&cli.data_dir, layout),
        FetchCache::new(Some(config.cache_ttl())),
    );
    let pipeline = ForecastPipeline::with_seasonal_model(source, config)?;

    log::info!("Loading data...");
    let output = pipeline.run(&ForecastRequest::new(cli.instrument.as_str(), cli.years))?;
    log::info!("Loading data... done!");

    if let Some(path) = &cli.output {
        let mut df = output.forecast.to_dataframe()?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).has_header(true).finish(&mut df)?;
        log::info!("Wrote {} forecast rows to {}", df.height(), path.display());
    }

    if cli.json {
        let document = serde_json::json!({
            "instrument": &output.instrument,
            "forecast": output.forecast.records(),
            "components": output.components.records(),
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        print_summary(&output, cli.years);
    }

    Ok(())
}

fn print_summary(output: &PipelineOutput, years: u32) {
    for warning in &output.warnings {
        println!("Warning: {}", warning);
    }

    println!("Raw data ({})", output.instrument);
    println!("{:<20} {:>12} {:>12}", "date", "open", "close");
    for record in output.history.tail(TAIL_ROWS) {
        println!(
            "{:<20} {:>12} {:>12}",
            record.timestamp.to_string(),
            format_price(record.open),
            format_price(record.close)
        );
    }

    println!();
    println!("Forecast data ({} year(s))", years);
    println!(
        "{:<20} {:>12} {:>12} {:>12}",
        "timestamp", "estimate", "lower", "upper"
    );
    for record in output.forecast.tail(TAIL_ROWS) {
        println!(
            "{:<20} {:>12.2} {:>12.2} {:>12.2}",
            record.timestamp.to_string(),
            record.point_estimate,
            record.lower_bound,
            record.upper_bound
        );
    }

    println!();
    println!("Forecast components");
    println!(
        "{:<20} {:>12} {:>12} {:>12}",
        "timestamp", "trend", "weekly", "yearly"
    );
    for record in output.components.tail(TAIL_ROWS) {
        println!(
            "{:<20} {:>12.2} {:>12.2} {:>12.2}",
            record.timestamp.to_string(),
            record.trend,
            record.weekly,
            record.yearly
        );
    }
}

fn format_price(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}
