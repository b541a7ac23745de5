use std::sync::Arc;

use record_store::config::AppConfig;
use record_store::domain::{Supplier, SUPPLIERS_SCHEMA};
use record_store::metrics::Metrics;
use record_store::utils::{retry_transient, RetryConfig};
use record_store::{field, MemoryStore, Pager, PgStore, Predicate, Repository, Service, Store};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,record_store=debug")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let metrics = Arc::new(Metrics::new()?);

    // === 1. Pick the backing store ===
    match config.store.database_url {
        Some(_) => {
            tracing::info!("Using PostgreSQL store");
            let store = PgStore::<Supplier>::connect(&config.store).await?;
            sqlx::query(SUPPLIERS_SCHEMA).execute(store.pool()).await?;
            run_demo(store, &config, Arc::clone(&metrics)).await?;
        }
        None => {
            tracing::info!("No database configured, using in-memory store");
            run_demo(MemoryStore::<Supplier>::new(), &config, Arc::clone(&metrics)).await?;
        }
    }

    tracing::info!(
        metric_families = metrics.registry().gather().len(),
        commits = metrics.commits_total.get(),
        "Demo complete"
    );

    Ok(())
}

async fn run_demo<S: Store<Supplier>>(store: S, config: &AppConfig, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let mut repository = Repository::with_metrics(store, metrics);

    // === 2. Seed ===
    if !repository.exists(Predicate::True).await? {
        repository.add_range((1..=25).map(Supplier::sample));
        let written = repository.save().await?;
        tracing::info!(written, "Seeded suppliers");
    }

    let mut service = Service::new(repository);

    // === 3. Create through the unit of work ===
    let last_id = service
        .query()
        .order_by_desc("id")
        .first_or_default()
        .await?
        .map_or(0, |supplier| supplier.id);
    let created = service
        .create(Supplier::new(last_id + 1, "Northwind Traders", "NL"))
        .await?;
    tracing::info!(id = created.id, name = %created.name, "Created supplier");

    // === 4. Paginate ===
    let pager = Pager::new(config.paging.clone());
    let active = service
        .query()
        .filter(field("active").eq(true))
        .order_by("name");
    let page = pager.paginate(active, 2, 5).await?;
    println!("{}", serde_json::to_string_pretty(&page)?);

    // === 5. Existence and counting (reads retried on lost connections) ===
    let dutch = service.exists(field("country").eq("NL")).await?;
    let highly_rated = retry_transient(&RetryConfig::default(), |_attempt| {
        service.query().filter(field("rating").ge(4)).count()
    })
    .await?;
    tracing::info!(dutch, highly_rated, "Queried suppliers");

    // === 6. Bulk delete ===
    let mut repository = service.into_repository();
    let staged = repository.delete_where(field("active").eq(false)).await?;
    let written = repository.save().await?;
    tracing::info!(staged, written, "Deleted inactive suppliers");

    Ok(())
}
