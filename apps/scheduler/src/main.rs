use anyhow::{bail, Context};
use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use scheduling_cell::{SchedulingError, SchedulingService};
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let doctor_ids = std::env::args()
        .skip(1)
        .map(|arg| Uuid::parse_str(&arg).with_context(|| format!("invalid doctor id '{}'", arg)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    if doctor_ids.is_empty() {
        bail!("usage: clinic-scheduler <doctor-uuid>...");
    }

    let config = AppConfig::from_env();
    if !config.is_configured() {
        bail!("Supabase is not configured; set SUPABASE_URL and SUPABASE_ANON_PUBLIC_KEY");
    }

    let service = SchedulingService::new(&config);
    let today = service.today();
    info!("Running schedule maintenance for {} doctors on {}", doctor_ids.len(), today);

    let mut failures = 0;
    for doctor_id in doctor_ids {
        let result: Result<usize, SchedulingError> = async {
            service.sweep(doctor_id, today).await?;
            service.ensure_window(doctor_id, today).await
        }
        .await;

        match result {
            Ok(created) => info!("Doctor {}: window up to date ({} days added)", doctor_id, created),
            Err(e) => {
                error!("Doctor {}: maintenance failed: {}", doctor_id, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{} doctors could not be maintained", failures);
    }

    Ok(())
}
