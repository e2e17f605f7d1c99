use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use dirscout::aggregate::{export_run_summary, persist_batch, RunSummary};
use dirscout::browser;
use dirscout::cli::Cli;
use dirscout::config::{self, AppConfig};
use dirscout::controller::SearchController;
use dirscout::dataset::{load_terms, read_dataset};
use dirscout::extractor::ContactExtractor;
use dirscout::logger::{RunLogger, VerbosityLevel};
use dirscout::normalizer::TermNormalizer;
use dirscout::supervisor::{Supervisor, ABORT_INTERRUPTED};

/// Global flag for interrupt signaling; the batch stops before the next term
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Time given to the batch to stop and persist after Ctrl+C
const INTERRUPT_GRACE: Duration = Duration::from_secs(30);

fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "dirscout=info",
        _ => "dirscout=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(config::CONFIG_PATH));

    // Handle --init flag first (before any other processing)
    if cli.init {
        return match AppConfig::create_default_config_at(&config_path) {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to match your directory, then run dirscout again.");
                Ok(0)
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                Ok(1)
            }
        };
    }

    if let Err(e) = cli.validate() {
        eprintln!("❌ Invalid arguments: {}", e);
        return Ok(1);
    }

    let mut app_config = match AppConfig::load_from_path(&config_path) {
        Ok(cfg) => cfg,
        Err(config::ConfigError::FileNotFound(path)) => match AppConfig::prompt_create_config(&path) {
            Ok(Some(created_path)) => {
                println!("✅ Created default configuration file at: {}", created_path.display());
                println!("   Edit this file to match your directory, then run dirscout again.");
                return Ok(0);
            }
            Ok(None) => {
                eprintln!("❌ Configuration file not found at: {}", path.display());
                eprintln!("   Run with --init to create a default configuration file.");
                return Ok(1);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                return Ok(1);
            }
        },
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            return Ok(1);
        }
    };

    // Per-run overrides, applied before anything reads the config
    if let Some(key) = &cli.key_column {
        app_config.dataset.key_column = key.trim().to_string();
    }
    if cli.headed {
        app_config.browser.headless = false;
    }
    if let Err(e) = app_config.validate() {
        eprintln!("❌ Configuration error: {}", e);
        return Ok(1);
    }
    let app_config = app_config;

    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);
    let logger = match &cli.log_file {
        Some(path) => RunLogger::with_log_file(verbosity, path),
        None => RunLogger::new(verbosity),
    };

    // Input errors abort before a browser is started
    let input = cli.input.clone().context("Input file is required")?;
    let dataset = match read_dataset(&input) {
        Ok(ds) => ds,
        Err(e) => {
            logger.error(&format!("{:#}", e));
            return Ok(1);
        }
    };
    let normalizer = TermNormalizer::from_config(&app_config.normalizer)
        .context("Invalid normalizer configuration")?;
    let terms = match load_terms(&dataset, &app_config.dataset.key_column, &normalizer) {
        Ok(terms) => terms,
        Err(e) => {
            logger.error(&e.to_string());
            return Ok(1);
        }
    };

    logger.record_input_file(&input);
    if terms.is_empty() {
        logger.info(&format!(
            "No search terms in column '{}'; nothing to do",
            app_config.dataset.key_column
        ));
        return Ok(0);
    }
    logger.info(&format!("Loaded {} unique search terms from {}", terms.len(), input.display()));

    ctrlc::set_handler(move || {
        INTERRUPTED.store(true, Ordering::SeqCst);
        eprintln!("\n⚠️  Interrupt received. Finishing the current term and saving results...");
        std::thread::sleep(INTERRUPT_GRACE);
        eprintln!("⚠️  Force exiting (results may not have been saved).");
        std::process::exit(130); // 130 = 128 + SIGINT(2)
    })
    .unwrap_or_else(|e| {
        logger.warn(&format!("Failed to set Ctrl-C handler: {}. Interrupts will not be handled gracefully.", e));
    });

    let started = Utc::now();
    let session = match browser::launch(&app_config.browser, app_config.browser.headless) {
        Ok(session) => session,
        Err(e) => {
            logger.error(&format!("{:#}", e));
            return Ok(1);
        }
    };

    logger.start_progress(terms.len() as u64);
    let controller = SearchController::new(session, &app_config.directory, &app_config.timeouts);
    let extractor = ContactExtractor::new(app_config.directory.roles.clone());
    let mut supervisor = Supervisor::new(controller, &extractor, &logger, app_config.timeouts.request_delay())
        .with_interrupt_check(is_interrupted);

    let batch = supervisor.run(&terms);
    supervisor.into_page().close();
    logger.finish_progress("Batch finished");

    // Persist whatever was collected, including after an abort
    let skip_report = cli.skip_report_path(&input);
    let written = match persist_batch(
        &input,
        &dataset,
        &app_config.dataset.key_column,
        &app_config.dataset.output_columns,
        &batch,
        &skip_report,
    ) {
        Ok(written) => written,
        Err(e) => {
            logger.error(&format!("Failed to save results: {:#}", e));
            logger.print_final_summary(&batch);
            let _ = logger.export_logs();
            return Ok(1);
        }
    };
    for path in written.dataset.iter().chain(written.skip_report.iter()) {
        logger.record_output_file(path);
    }

    logger.print_final_summary(&batch);

    if let Some(path) = &cli.summary_json {
        let summary = RunSummary::new(&input, started, &batch, &written);
        match export_run_summary(&summary, path) {
            Ok(()) => logger.info(&format!("Run summary exported to {}", path.display())),
            Err(e) => logger.error(&format!("{:#}", e)),
        }
    }

    if let Err(e) = logger.export_logs() {
        eprintln!("⚠️  Failed to export logs: {}", e);
    }

    Ok(match batch.aborted.as_deref() {
        None => 0,
        Some(ABORT_INTERRUPTED) => 130,
        Some(_) => 1,
    })
}
