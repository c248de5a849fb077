#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use chrono::{Days, Utc};

use invoicedesk::{
    config::{AppConfig, StoreBackend},
    models::{ContactDetails, InvoiceDraft, ItemDraft, PaymentInformation, User},
    state::{AppState, add_user},
    store::MemoryStore,
};

pub const TEST_KEY: &str = "integration-test-signing-key";
pub const TEST_PASSWORD: &str = "password123";

pub struct TestContext {
    pub state: AppState,
    pub store: MemoryStore,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::new(TEST_KEY);
    config.backend = StoreBackend::Memory;
    config.password_cost = 4;
    config.db_timeout = Duration::from_secs(2);
    config.typst_bin = "typst-binary-that-does-not-exist".to_string();
    config.download_cleanup = Duration::from_millis(50);
    config
}

pub fn setup_state() -> TestContext {
    setup_with(test_config())
}

pub fn setup_with(config: AppConfig) -> TestContext {
    let store = MemoryStore::new();
    let (state, _worker) = AppState::new(Arc::new(store.clone()), config);
    TestContext { state, store }
}

/// Calendar date `offset` days from today, as the API expects it.
pub fn day(offset: u64) -> String {
    (Utc::now().date_naive() + Days::new(offset))
        .format("%Y-%m-%d")
        .to_string()
}

fn contact(name: &str) -> ContactDetails {
    ContactDetails {
        name: name.to_string(),
        phone: "+1 555 0100".to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        address: "221B Baker Street".to_string(),
    }
}

/// Two items (3 x 10.00 and 1 x 50.00) with a 10% discount: 72.00 due.
pub fn sample_draft(issue_in: u64, due_in: u64) -> InvoiceDraft {
    InvoiceDraft {
        invoice_number: "0001".to_string(),
        billing_currency: "USD".to_string(),
        discount: 10.0,
        issue_date: day(issue_in),
        due_date: day(due_in),
        items: vec![
            ItemDraft {
                description: "Consulting".to_string(),
                quantity: 3,
                unit_price: 10.0,
            },
            ItemDraft {
                description: "Hosting".to_string(),
                quantity: 1,
                unit_price: 50.0,
            },
        ],
        notes: "Thanks for your business".to_string(),
        payment_info: PaymentInformation {
            account_name: "Acme Ltd".to_string(),
            account_number: "01234567890".to_string(),
            routing_number: "0210000".to_string(),
            bank_name: "First Bank".to_string(),
        },
        customer: contact("Globex"),
        sender: contact("Acme"),
    }
}

pub async fn seed_user(state: &AppState, email: &str) -> User {
    let hash = state.hasher.hash(TEST_PASSWORD).expect("hash password");
    let user = User::new("Ada", "Lovelace", email, &hash, "+1 555 0199", Utc::now())
        .expect("valid user");
    add_user(state, user).await.expect("insert user")
}

/// Activities are written by a background worker; poll until `count` landed.
pub async fn wait_for_activities(store: &MemoryStore, count: usize) {
    for _ in 0..100 {
        if store.activity_count().await >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {count} activities");
}
