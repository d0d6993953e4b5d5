use once_cell::sync::Lazy;
use prometheus::{
    Histogram, IntCounter, IntGauge, register_histogram, register_int_counter, register_int_gauge,
};

pub static PAYOUTS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "harvest_settlement_payouts_created_total",
        "Total payout batches created from aggregated orders"
    )
    .expect("payouts_created counter")
});

pub static PAYOUTS_SCHEDULED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "harvest_settlement_payouts_scheduled_total",
        "Total payouts assigned a settlement date"
    )
    .expect("payouts_scheduled counter")
});

pub static PAYOUTS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "harvest_settlement_payouts_completed_total",
        "Total payouts disbursed against a verified account"
    )
    .expect("payouts_completed counter")
});

pub static PAYOUTS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "harvest_settlement_payouts_failed_total",
        "Total payouts that failed and released their orders"
    )
    .expect("payouts_failed counter")
});

pub static CONCURRENCY_CONFLICTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "harvest_settlement_concurrency_conflicts_total",
        "Mutations rejected because the record was locked or stale"
    )
    .expect("concurrency_conflicts counter")
});

pub static OPEN_PAYOUTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "harvest_settlement_open_payouts",
        "Payouts currently in a non-terminal state"
    )
    .expect("open_payouts gauge")
});

pub static SETTLED_NET_AMOUNT: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "harvest_settlement_net_amount",
        "Net amount per completed payout",
        vec![10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0, 50000.0]
    )
    .expect("net_amount histogram")
});
