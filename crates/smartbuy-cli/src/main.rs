use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use smartbuy::auth::{Authenticator, FileCredentialStore, GMAIL_SEND_SCOPE, InstalledAppFlow};
use smartbuy::config::DEFAULT_CONFIG_FILE;
use smartbuy::notifier::{ErrorLog, GmailMailer};
use smartbuy::{Config, Delivery, Notifier, WebScraper};

#[derive(Parser)]
#[command(name = "smartbuy-alert")]
#[command(
    about = "Checks the SmartBuy deals page for fresh products and mails an alert",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'c',
        long = "config",
        default_value = DEFAULT_CONFIG_FILE,
        help = "Path to the TOML config file"
    )]
    config: PathBuf,

    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        help = "Set the logging level"
    )]
    log_level: LogLevel,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let config = Config::from_file(&cli.config).unwrap_or_else(|e| {
        log::error!("Error loading config: {}", e);
        process::exit(1);
    });

    let scraper = WebScraper::new(&config.url).unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    });

    let matches = scraper
        .search_for_products(&config.products)
        .unwrap_or_else(|e| {
            log::error!("Error searching {}: {}", scraper.url(), e);
            process::exit(1);
        });

    let Some(matches) = matches else {
        log::info!(
            "No fresh deals for {} keyword(s), nothing to send",
            config.products.len()
        );
        return;
    };

    print!("{}", matches);

    let flow = InstalledAppFlow::new(&config.client_secrets, &[GMAIL_SEND_SCOPE])
        .unwrap_or_else(|e| {
            log::error!("Error creating OAuth client: {}", e);
            process::exit(1);
        });
    let authenticator = Authenticator::new(FileCredentialStore::new(&config.token_cache), flow);
    let mailer = GmailMailer::new(authenticator).unwrap_or_else(|e| {
        log::error!("Error creating mail client: {}", e);
        process::exit(1);
    });

    let notifier = Notifier::new(
        mailer,
        &config.from,
        &config.to,
        ErrorLog::new(&config.error_log),
    );

    match notifier.alert(&matches) {
        Delivery::Sent => log::info!("Alert delivered to {}", config.to),
        Delivery::Failed => log::warn!("Alert not delivered, see {}", config.error_log.display()),
    }
}
