//! # Careloop — patient engagement backend
//!
//! Stores patient records, fans a 7-day templated WhatsApp plan out via
//! an in-process deferred scheduler, books video consultations on the
//! calendar, and sends transactional email.
//!
//! Usage:
//!   careloop                     # Serve on 0.0.0.0:8000
//!   careloop --port 9000         # Custom port
//!   careloop -v                  # Debug logging

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use careloop_channels::{CalendarClient, Mailer, WhatsAppGateway};
use careloop_core::{AppConfig, TemplateRegistry, TemplateSender};
use careloop_gateway::AppState;
use careloop_scheduler::{SchedulerEngine, spawn_delivery_loop};
use careloop_store::PatientStore;

#[derive(Parser)]
#[command(name = "careloop", version, about = "Careloop — patient engagement backend")]
struct Cli {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Listen port
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Delivery loop poll interval in seconds
    #[arg(long, default_value = "1")]
    check_interval: u64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "careloop=debug,careloop_gateway=debug,careloop_scheduler=debug,\
         careloop_channels=debug,careloop_store=debug,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env();
    if config.messaging.api_url.is_empty() {
        tracing::warn!("ADA_API_URL is not set — template sends will fail");
    }
    if config.mail.address.is_empty() {
        tracing::warn!("EMAIL_ADDRESS is not set — meeting emails will fail");
    }

    let store = PatientStore::new(&config.store)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let whatsapp = Arc::new(WhatsAppGateway::new(config.messaging.clone()));
    let templates = Arc::new(TemplateRegistry::new());
    let scheduler = Arc::new(Mutex::new(SchedulerEngine::new()));
    let mailer = Arc::new(Mailer::new(config.mail.clone()));
    let calendar = Arc::new(CalendarClient::new(config.calendar.clone()));

    let sender: Arc<dyn TemplateSender> = whatsapp.clone();
    tokio::spawn(spawn_delivery_loop(
        scheduler.clone(),
        sender,
        templates.clone(),
        cli.check_interval,
    ));

    careloop_gateway::start(
        &cli.host,
        cli.port,
        AppState {
            store,
            whatsapp,
            templates,
            scheduler,
            mailer,
            calendar,
        },
    )
    .await
}
