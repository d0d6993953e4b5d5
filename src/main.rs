use actix_web::{App, HttpServer, web};
use actix_web_prom::PrometheusMetricsBuilder;
use harvest_settlement_rs::bank_registry::BankAccountRegistry;
use harvest_settlement_rs::config::Settings;
use harvest_settlement_rs::context::ServiceContext;
use harvest_settlement_rs::ledger::PayoutLedger;
use harvest_settlement_rs::order_feed::InMemoryOrderFeed;
use harvest_settlement_rs::persistence::redb_store::RedbStore;
use harvest_settlement_rs::persistence::store::SettlementStore;
use harvest_settlement_rs::persistence::wal::WalManager;
use harvest_settlement_rs::settlement::SettlementService;
use harvest_settlement_rs::{api, order_feed};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    info!("harvest settlement service starting");

    // Load environment variables
    dotenv::dotenv().ok();
    let settings = Settings::new().unwrap_or_else(|e| {
        info!("no config sources found ({}), using defaults", e);
        Settings::default()
    });

    // Storage stack: redb database, WAL, typed store
    let redb = Arc::new(RedbStore::open(settings.db_path())?);
    let wal = Arc::new(WalManager::new(redb.clone()));
    let store = Arc::new(SettlementStore::new(redb, wal)?);

    // Core components, hydrated from storage
    let ledger = Arc::new(PayoutLedger::open(store.clone())?);
    let registry = Arc::new(BankAccountRegistry::open(store)?);
    let feed: Arc<dyn order_feed::EligibleOrderSource> = Arc::new(InMemoryOrderFeed::new());
    let service = Arc::new(SettlementService::new(
        ledger,
        registry,
        feed,
        ServiceContext::new_system(),
        settings.commission_rate(),
    ));

    let prometheus = PrometheusMetricsBuilder::new("harvest_settlement")
        .endpoint("/metrics")
        .build()
        .expect("prometheus middleware");

    let bind_address = format!("0.0.0.0:{}", settings.port());
    info!("starting settlement API on {}", bind_address);

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .wrap(prometheus.clone())
            .app_data(web::Data::new(service.clone()))
            .configure(api::config)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
