use anyhow::Result;
use clap::Parser;
use dengue_rainfall_merge::record::FieldPolicy;
use dengue_rainfall_merge::{run, EngineKind, RunConfig, RunReport};
use log::{error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use time::macros::format_description;

#[derive(Parser, Debug)]
#[command(name = "Dengue Rainfall Merge")]
#[command(about = "Join monthly dengue case counts with rainfall totals per state (UF) into one CSV report")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "sample_casos_dengue.txt", help = "Dengue case file or glob pattern ('|' separated, header skipped)")]
    cases: String,

    #[arg(long, default_value = "sample_chuvas.csv", help = "Rainfall file or glob pattern (',' separated, header skipped)")]
    rainfall: String,

    #[arg(short, long, default_value = "resultado", help = "Output file prefix")]
    output: PathBuf,

    #[arg(long, default_value = ".csv", help = "Output file name suffix")]
    suffix: String,

    #[arg(long, default_value = "1", help = "Number of output shards")]
    shards: usize,

    #[arg(long, value_enum, default_value_t = EngineKind::Parallel, help = "Execution engine")]
    engine: EngineKind,

    #[arg(short, long, default_value = "0", help = "Number of threads to use (0 for auto)")]
    threads: usize,

    #[arg(long, help = "Reject records whose field count does not match the schema")]
    strict: bool,

    #[arg(long, default_value = "0", help = "Log the first N output rows")]
    preview: usize,

    #[arg(long, help = "Show progress bars while reading inputs")]
    progress: bool,

    #[arg(short, long, default_value = "INFO", help = "Logging level (DEBUG, INFO, WARN, ERROR)")]
    log_level: String,
}

impl Cli {
    fn to_config(&self) -> RunConfig {
        RunConfig {
            cases: self.cases.clone(),
            rainfall: self.rainfall.clone(),
            output_prefix: self.output.clone(),
            output_suffix: self.suffix.clone(),
            shards: self.shards,
            engine: self.engine,
            threads: self.threads,
            policy: if self.strict {
                FieldPolicy::Strict
            } else {
                FieldPolicy::Lenient
            },
            preview: self.preview,
            progress: self.progress,
        }
    }
}

fn setup_logging(log_level_str: &str) -> Result<()> {
    let log_level = match log_level_str.to_uppercase().as_str() {
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        other => {
            eprintln!("Invalid log level '{}', defaulting to INFO.", other);
            LevelFilter::Info
        }
    };

    SimpleLogger::new()
        .with_level(log_level)
        .with_timestamp_format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .init()?;

    Ok(())
}

fn setup_thread_pool(thread_count: usize) -> usize {
    let num_threads = if thread_count == 0 {
        let cores = num_cpus::get();
        info!("Auto-detected {} CPU cores. Using {} threads.", cores, cores);
        cores
    } else {
        info!("Using specified {} threads.", thread_count);
        thread_count
    };

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
    {
        error!("Failed to build global thread pool: {}. Proceeding with default.", e);
    }

    num_threads
}

fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    let millis = elapsed.subsec_millis();

    if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, millis)
    }
}

fn print_final_summary(start_time: Instant, report: &RunReport, config: &RunConfig) {
    let stats = &report.stats;
    info!("-------------------- FINAL SUMMARY --------------------");
    info!("Total execution time: {}", format_elapsed(start_time.elapsed()));
    info!("Dengue lines read: {}", stats.cases_lines);
    info!("Rainfall lines read: {}", stats.rainfall_lines);
    if stats.cases_skipped > 0 || stats.rainfall_skipped > 0 {
        warn!(
            "Lines that could not be keyed: {} dengue, {} rainfall",
            stats.cases_skipped, stats.rainfall_skipped
        );
    }
    info!("Dengue keys (UF-ANO-MES): {}", stats.case_keys);
    info!("Rainfall keys (UF-ANO-MES): {}", stats.rainfall_keys);
    info!("Rows written: {}", stats.joined_rows);
    info!(
        "Keys without a match: {} dengue-only, {} rainfall-only",
        stats.cases_only, stats.rainfall_only
    );

    if config.preview > 0 {
        info!("First {} rows:", config.preview.min(report.rows.len()));
        for row in report.rows.iter().take(config.preview) {
            info!("  {}", row);
        }
    }

    for path in &report.files {
        info!("Output written to: {}", path.display());
    }
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    setup_logging(&cli.log_level)?;
    info!("Starting dengue/rainfall merge");

    let config = cli.to_config();
    if config.engine == EngineKind::Parallel {
        setup_thread_pool(config.threads);
    }

    let report = run(&config)?;
    print_final_summary(start_time, &report, &config);

    info!("Merge finished.");
    info!("-------------------------------------------------------");
    Ok(())
}
