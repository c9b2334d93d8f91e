//! Common test utilities for invoicing-service integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use invoicing_service::models::{
    BuyerSnapshot, Contractor, CreateInvoice, Invoice, InvoiceItem, InvoiceStatus,
    ListContractorsQuery, ListInvoicesQuery, NewInvoiceItem, PaymentMethod, UpdateProfile,
    UserProfile, VatRate,
};
use invoicing_service::services::{
    ContractorRepository, ContractorService, FixedClock, HealthCheck, InMemoryDatabase,
    InvoiceRepository, InvoiceService, ProfileRepository, ProfileService,
};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use uuid::Uuid;

static INIT: Once = Once::new();

pub const VALID_NIP: &str = "5260250274";
pub const OTHER_VALID_NIP: &str = "1234563218";

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,invoicing_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 2025-03-15 10:00 UTC, the starting point of every test clock.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 15, 10, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dec(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap()
}

/// Store wrapper that counts writes and can be told to fail.
#[derive(Default)]
pub struct RecordingStore {
    pub inner: InMemoryDatabase,
    writes: AtomicUsize,
    fail_next_item_insert: AtomicBool,
    fail_next_invoice_update: AtomicBool,
    fail_next_counter_increment: AtomicBool,
    unhealthy: AtomicBool,
}

impl RecordingStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make the next item insert fail once.
    pub fn fail_next_item_insert(&self) {
        self.fail_next_item_insert.store(true, Ordering::SeqCst);
    }

    /// Make the next invoice row update fail once.
    pub fn fail_next_invoice_update(&self) {
        self.fail_next_invoice_update.store(true, Ordering::SeqCst);
    }

    /// Make the next invoice counter increment fail once.
    pub fn fail_next_counter_increment(&self) {
        self.fail_next_counter_increment.store(true, Ordering::SeqCst);
    }

    /// Make health checks report the backend as unreachable.
    pub fn set_unhealthy(&self) {
        self.unhealthy.store(true, Ordering::SeqCst);
    }

    fn write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn injected(what: &str) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("injected failure: {}", what))
}

#[async_trait]
impl HealthCheck for RecordingStore {
    async fn health_check(&self) -> Result<(), AppError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(injected("health_check"));
        }
        self.inner.health_check().await
    }
}

#[async_trait]
impl InvoiceRepository for RecordingStore {
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<Invoice, AppError> {
        self.write();
        self.inner.insert_invoice(invoice).await
    }

    async fn insert_items(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        items: &[NewInvoiceItem],
    ) -> Result<Vec<InvoiceItem>, AppError> {
        self.write();
        if self.fail_next_item_insert.swap(false, Ordering::SeqCst) {
            return Err(injected("insert_items"));
        }
        self.inner.insert_items(user_id, invoice_id, items).await
    }

    async fn purge_invoice(&self, user_id: Uuid, invoice_id: Uuid) -> Result<(), AppError> {
        self.write();
        self.inner.purge_invoice(user_id, invoice_id).await
    }

    async fn get_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        self.inner.get_invoice(user_id, invoice_id).await
    }

    async fn get_items(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceItem>, AppError> {
        self.inner.get_items(user_id, invoice_id).await
    }

    async fn list_invoices(
        &self,
        user_id: Uuid,
        query: &ListInvoicesQuery,
    ) -> Result<(Vec<Invoice>, u64), AppError> {
        self.inner.list_invoices(user_id, query).await
    }

    async fn invoice_number_exists(
        &self,
        user_id: Uuid,
        invoice_number: &str,
        exclude_invoice_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        self.inner
            .invoice_number_exists(user_id, invoice_number, exclude_invoice_id)
            .await
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<Option<Invoice>, AppError> {
        self.write();
        if self.fail_next_invoice_update.swap(false, Ordering::SeqCst) {
            return Err(injected("update_invoice"));
        }
        self.inner.update_invoice(invoice).await
    }

    async fn delete_items(&self, user_id: Uuid, invoice_id: Uuid) -> Result<(), AppError> {
        self.write();
        self.inner.delete_items(user_id, invoice_id).await
    }

    async fn update_status(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Invoice>, AppError> {
        self.write();
        self.inner
            .update_status(user_id, invoice_id, status, updated_at)
            .await
    }

    async fn soft_delete_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.write();
        self.inner
            .soft_delete_invoice(user_id, invoice_id, deleted_at)
            .await
    }
}

#[async_trait]
impl ProfileRepository for RecordingStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        self.inner.get_profile(user_id).await
    }

    async fn create_profile(&self, profile: &UserProfile) -> Result<UserProfile, AppError> {
        self.write();
        self.inner.create_profile(profile).await
    }

    async fn update_profile(&self, profile: &UserProfile) -> Result<Option<UserProfile>, AppError> {
        self.write();
        self.inner.update_profile(profile).await
    }

    async fn increment_invoice_counter(&self, user_id: Uuid) -> Result<i64, AppError> {
        self.write();
        if self.fail_next_counter_increment.swap(false, Ordering::SeqCst) {
            return Err(injected("increment_invoice_counter"));
        }
        self.inner.increment_invoice_counter(user_id).await
    }
}

#[async_trait]
impl ContractorRepository for RecordingStore {
    async fn insert_contractor(&self, contractor: &Contractor) -> Result<Contractor, AppError> {
        self.write();
        self.inner.insert_contractor(contractor).await
    }

    async fn get_contractor(
        &self,
        user_id: Uuid,
        contractor_id: Uuid,
    ) -> Result<Option<Contractor>, AppError> {
        self.inner.get_contractor(user_id, contractor_id).await
    }

    async fn list_contractors(
        &self,
        user_id: Uuid,
        query: &ListContractorsQuery,
    ) -> Result<(Vec<Contractor>, u64), AppError> {
        self.inner.list_contractors(user_id, query).await
    }

    async fn nip_exists(
        &self,
        user_id: Uuid,
        nip: &str,
        exclude_contractor_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        self.inner
            .nip_exists(user_id, nip, exclude_contractor_id)
            .await
    }

    async fn update_contractor(
        &self,
        contractor: &Contractor,
    ) -> Result<Option<Contractor>, AppError> {
        self.write();
        self.inner.update_contractor(contractor).await
    }

    async fn soft_delete_contractor(
        &self,
        user_id: Uuid,
        contractor_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.write();
        self.inner
            .soft_delete_contractor(user_id, contractor_id, deleted_at)
            .await
    }
}

/// Services wired over a recording in-memory store and a fixed clock, with
/// one signed-in user.
pub struct TestApp {
    pub store: Arc<RecordingStore>,
    pub clock: Arc<FixedClock>,
    pub invoices: InvoiceService,
    pub profiles: ProfileService,
    pub contractors: ContractorService,
    pub user_id: Uuid,
}

pub async fn spawn_app() -> TestApp {
    init_tracing();

    let store = Arc::new(RecordingStore::default());
    let clock = Arc::new(FixedClock::new(start_time()));

    let invoices = InvoiceService::with_clock(
        store.clone(),
        store.clone(),
        store.clone(),
        clock.clone(),
    );
    let profiles = ProfileService::with_clock(store.clone(), clock.clone());
    let contractors = ContractorService::with_clock(store.clone(), clock.clone());

    let app = TestApp {
        store,
        clock,
        invoices,
        profiles,
        contractors,
        user_id: Uuid::new_v4(),
    };
    app.profiles
        .ensure(app.user_id, Some("owner@example.com".to_string()))
        .await
        .expect("Failed to create profile");
    app
}

impl TestApp {
    /// Sign in another user sharing the same store.
    pub async fn another_user(&self) -> Uuid {
        let user_id = Uuid::new_v4();
        self.profiles
            .ensure(user_id, None)
            .await
            .expect("Failed to create profile");
        user_id
    }

    pub async fn complete_profile(&self) {
        self.complete_profile_for(self.user_id).await;
    }

    pub async fn complete_profile_for(&self, user_id: Uuid) {
        self.profiles
            .update(
                user_id,
                UpdateProfile {
                    company_name: Some("ACME Sp. z o.o.".to_string()),
                    address: Some("ul. Prosta 1, 00-001 Warszawa".to_string()),
                    nip: Some(VALID_NIP.to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("Failed to complete profile");
    }

    pub async fn next_number(&self) -> String {
        self.invoices
            .next_number(self.user_id)
            .await
            .expect("Failed to preview number")
    }
}

pub fn item(position: i32, name: &str, quantity: &str, unit_price: &str, rate: VatRate) -> NewInvoiceItem {
    NewInvoiceItem {
        position,
        name: name.to_string(),
        unit: None,
        quantity: dec(quantity),
        unit_price: dec(unit_price),
        vat_rate: rate,
    }
}

/// Two items: 2 x 10.00 at 23% and 1 x 100.00 at 8%.
pub fn standard_items() -> Vec<NewInvoiceItem> {
    vec![
        item(1, "Design work", "2", "10.00", VatRate::Rate23),
        item(2, "Hosting", "1", "100.00", VatRate::Rate8),
    ]
}

pub fn buyer() -> BuyerSnapshot {
    BuyerSnapshot {
        name: "Klient S.A.".to_string(),
        address: Some("ul. Długa 5, 30-001 Kraków".to_string()),
        nip: Some(OTHER_VALID_NIP.to_string()),
    }
}

pub fn draft(invoice_number: &str, items: Vec<NewInvoiceItem>) -> CreateInvoice {
    CreateInvoice {
        invoice_number: invoice_number.to_string(),
        issue_date: date(2025, 3, 15),
        due_date: date(2025, 3, 29),
        status: InvoiceStatus::Draft,
        payment_method: PaymentMethod::Transfer,
        currency: None,
        notes: Some("Thank you".to_string()),
        buyer: Some(buyer()),
        contractor_id: None,
        items,
    }
}
