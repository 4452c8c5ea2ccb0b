//! Custom Fields Inspect Entry Point
//!
//! Loads one engine session from the environment and prints its render
//! model as JSON, followed by a one-line summary.

use custom_fields_engine::{Dependencies, EngineConfig, InspectError, RenderModel};
use dotenv::dotenv;
use std::env;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
fn init_tracing() -> Result<(), InspectError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("custom_fields_engine=info,custom_fields_repository=info")
    });

    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| InspectError::config(format!("Failed to initialize tracing: {}", e)))?;

        info!(
            service_name = "custom-fields-inspect",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .pretty(),
            )
            .try_init()
            .map_err(|e| InspectError::config(format!("Failed to initialize tracing: {}", e)))?;

        info!(
            service_name = "custom-fields-inspect",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }

    Ok(())
}

fn summary(model: &RenderModel) -> String {
    let orphans = model
        .sections
        .iter()
        .find(|section| section.key == "general")
        .map(|section| section.items.len())
        .unwrap_or(0);
    let source = model
        .orphan_source
        .map(|source| format!("{:?}", source))
        .unwrap_or_else(|| "none".to_string());

    format!(
        "{} sections, {} fields, {} orphan items (source: {}), {} compliance cards, status {:?}",
        model.sections.len(),
        model.field_count(),
        orphans,
        source,
        model.compliance_cards().count(),
        model.status
    )
}

#[tokio::main]
async fn main() -> Result<(), InspectError> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing()?;

    info!("Starting custom fields inspect");

    let config = EngineConfig::from_env();
    let deps = match Dependencies::new(&config) {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    if let Err(e) = deps.session.load().await {
        error!(error = %e, "Failed to load session");
        return Err(e.into());
    }

    let model = deps.session.render_model();
    let rendered = serde_json::to_string_pretty(&model)
        .map_err(|e| InspectError::Output(format!("Failed to serialize render model: {}", e)))?;

    println!("{}", rendered);
    println!("{}", summary(&model));
    Ok(())
}
