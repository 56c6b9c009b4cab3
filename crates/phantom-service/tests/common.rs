//! Common test utilities for phantom-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::time::Duration;

use axum::Router;
use axum_test::TestServer;
use tempfile::TempDir;

use phantom_core::{
    BuyerId, Decimal, NewBuyer, NewProduct, NewSeller, ProductId, SellerId,
};
use phantom_service::{create_router, open_backend, AppState, ServiceConfig};
use phantom_store::LedgerStore;

/// Identifiers of the seeded rows.
#[derive(Debug, Clone, Copy)]
pub struct Fixture {
    /// Buyer with 100.00.
    pub buyer: BuyerId,
    /// Buyer with 5.00.
    pub poor_buyer: BuyerId,
    /// "Pharmacy A", balance 0.
    pub seller_a: SellerId,
    /// "Pharmacy B", balance 0.
    pub seller_b: SellerId,
    /// Seller A's product at 12.50, stock 5.
    pub kn95: ProductId,
    /// Seller B's product at 3.00, stock 10.
    pub surgical: ProductId,
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// Seeded rows.
    pub fixture: Fixture,
}

impl TestHarness {
    /// Create a new test harness with a freshly seeded store.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness after letting the caller adjust the configuration.
    pub fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            lock_timeout: Duration::from_secs(5),
            request_deadline: Some(Duration::from_secs(30)),
            ..ServiceConfig::default()
        };
        adjust(&mut config);

        let store = open_backend(&config).expect("Failed to open store");
        let fixture = seed(&store);

        let state = AppState::new(store, config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            _temp_dir: temp_dir,
            fixture,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a decimal literal.
pub fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}

/// Read a decimal field from a JSON body.
pub fn dec_field(value: &serde_json::Value) -> Decimal {
    match value {
        serde_json::Value::String(s) => dec(s),
        other => dec(&other.to_string()),
    }
}

fn seed<S: LedgerStore>(store: &S) -> Fixture {
    let buyer = store
        .insert_buyer(NewBuyer::new("Ann", dec("100.00")))
        .expect("seed buyer");
    let poor_buyer = store
        .insert_buyer(NewBuyer::new("Bob", dec("5.00")))
        .expect("seed buyer");
    let seller_a = store
        .insert_seller(NewSeller::new("Pharmacy A", Decimal::ZERO))
        .expect("seed seller");
    let seller_b = store
        .insert_seller(NewSeller::new("Pharmacy B", Decimal::ZERO))
        .expect("seed seller");
    let kn95 = store
        .insert_product(NewProduct {
            seller_id: seller_a.id,
            name: "KN95 (black) (10 per pack)".into(),
            price: dec("12.50"),
            stock_quantity: 5,
        })
        .expect("seed product");
    let surgical = store
        .insert_product(NewProduct {
            seller_id: seller_b.id,
            name: "Surgical (blue) (6 per pack)".into(),
            price: dec("3.00"),
            stock_quantity: 10,
        })
        .expect("seed product");

    Fixture {
        buyer: buyer.id,
        poor_buyer: poor_buyer.id,
        seller_a: seller_a.id,
        seller_b: seller_b.id,
        kn95: kn95.id,
        surgical: surgical.id,
    }
}
