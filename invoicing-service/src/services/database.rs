//! PostgreSQL persistence for invoicing-service.

use crate::models::{
    BuyerSnapshot, Contractor, Invoice, InvoiceItem, InvoiceStatus, ListContractorsQuery,
    ListInvoicesQuery, NewInvoiceItem, SellerSnapshot, UserProfile,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::repository::{
    ContractorRepository, HealthCheck, InvoiceRepository, ProfileRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = r#"
    id, user_id, invoice_number, issue_date, due_date, status, payment_method, currency, notes,
    seller_company_name, seller_address, seller_nip, seller_bank_account, seller_logo_url,
    buyer_name, buyer_address, buyer_nip, contractor_id,
    total_net, total_vat, total_gross, created_at, updated_at, deleted_at
"#;

const PROFILE_COLUMNS: &str = r#"
    user_id, email, company_name, address, nip, bank_account, logo_url,
    invoice_number_format, invoice_number_counter, created_at, updated_at
"#;

const CONTRACTOR_COLUMNS: &str = r#"
    id, user_id, name, address, nip, email, phone, created_at, updated_at, deleted_at
"#;

fn db_error(context: &str, e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

fn corrupt_row(e: crate::error::InvoicingError) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("Corrupt row: {}", e))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// `ILIKE` pattern matching `term` anywhere, with wildcards escaped.
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn search_term(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(contains_pattern)
}

#[derive(FromRow)]
struct InvoiceRow {
    id: Uuid,
    user_id: Uuid,
    invoice_number: String,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    status: String,
    payment_method: String,
    currency: String,
    notes: Option<String>,
    seller_company_name: String,
    seller_address: String,
    seller_nip: String,
    seller_bank_account: Option<String>,
    seller_logo_url: Option<String>,
    buyer_name: String,
    buyer_address: Option<String>,
    buyer_nip: Option<String>,
    contractor_id: Option<Uuid>,
    total_net: Decimal,
    total_vat: Decimal,
    total_gross: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = AppError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(Invoice {
            id: row.id,
            user_id: row.user_id,
            invoice_number: row.invoice_number,
            issue_date: row.issue_date,
            due_date: row.due_date,
            status: row.status.parse().map_err(corrupt_row)?,
            payment_method: row.payment_method.parse().map_err(corrupt_row)?,
            currency: row.currency,
            notes: row.notes,
            seller: SellerSnapshot {
                company_name: row.seller_company_name,
                address: row.seller_address,
                nip: row.seller_nip,
                bank_account: row.seller_bank_account,
                logo_url: row.seller_logo_url,
            },
            buyer: BuyerSnapshot {
                name: row.buyer_name,
                address: row.buyer_address,
                nip: row.buyer_nip,
            },
            contractor_id: row.contractor_id,
            total_net: row.total_net,
            total_vat: row.total_vat,
            total_gross: row.total_gross,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(FromRow)]
struct ItemRow {
    id: Uuid,
    invoice_id: Uuid,
    position: i32,
    name: String,
    unit: String,
    quantity: Decimal,
    unit_price: Decimal,
    vat_rate: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for InvoiceItem {
    type Error = AppError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(InvoiceItem {
            id: row.id,
            invoice_id: row.invoice_id,
            position: row.position,
            name: row.name,
            unit: row.unit,
            quantity: row.quantity,
            unit_price: row.unit_price,
            vat_rate: row.vat_rate.parse().map_err(corrupt_row)?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ProfileRow {
    user_id: Uuid,
    email: Option<String>,
    company_name: Option<String>,
    address: Option<String>,
    nip: Option<String>,
    bank_account: Option<String>,
    logo_url: Option<String>,
    invoice_number_format: String,
    invoice_number_counter: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        UserProfile {
            user_id: row.user_id,
            email: row.email,
            company_name: row.company_name,
            address: row.address,
            nip: row.nip,
            bank_account: row.bank_account,
            logo_url: row.logo_url,
            invoice_number_format: row.invoice_number_format,
            invoice_number_counter: row.invoice_number_counter,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ContractorRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    address: Option<String>,
    nip: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<ContractorRow> for Contractor {
    fn from(row: ContractorRow) -> Self {
        Contractor {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            address: row.address,
            nip: row.nip,
            email: row.email,
            phone: row.phone,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| db_error("Failed to connect", e))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Health check failed", e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl HealthCheck for Database {
    async fn health_check(&self) -> Result<(), AppError> {
        Database::health_check(self).await
    }
}

#[async_trait]
impl InvoiceRepository for Database {
    #[instrument(skip(self, invoice), fields(user_id = %invoice.user_id, invoice_id = %invoice.id))]
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let sql = format!(
            r#"
            INSERT INTO invoices (
                id, user_id, invoice_number, issue_date, due_date, status, payment_method, currency, notes,
                seller_company_name, seller_address, seller_nip, seller_bank_account, seller_logo_url,
                buyer_name, buyer_address, buyer_nip, contractor_id,
                total_net, total_vat, total_gross, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );

        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(invoice.id)
            .bind(invoice.user_id)
            .bind(&invoice.invoice_number)
            .bind(invoice.issue_date)
            .bind(invoice.due_date)
            .bind(invoice.status.as_str())
            .bind(invoice.payment_method.as_str())
            .bind(&invoice.currency)
            .bind(&invoice.notes)
            .bind(&invoice.seller.company_name)
            .bind(&invoice.seller.address)
            .bind(&invoice.seller.nip)
            .bind(&invoice.seller.bank_account)
            .bind(&invoice.seller.logo_url)
            .bind(&invoice.buyer.name)
            .bind(&invoice.buyer.address)
            .bind(&invoice.buyer.nip)
            .bind(invoice.contractor_id)
            .bind(invoice.total_net)
            .bind(invoice.total_vat)
            .bind(invoice.total_gross)
            .bind(invoice.created_at)
            .bind(invoice.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(anyhow::anyhow!(
                        "Invoice number '{}' already exists",
                        invoice.invoice_number
                    ))
                } else {
                    db_error("Failed to insert invoice", e)
                }
            })?;

        timer.observe_duration();

        info!(invoice_number = %row.invoice_number, "Invoice row inserted");

        row.try_into()
    }

    #[instrument(skip(self, items), fields(user_id = %user_id, invoice_id = %invoice_id, count = items.len()))]
    async fn insert_items(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        items: &[NewInvoiceItem],
    ) -> Result<Vec<InvoiceItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_items"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let created_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT updated_at FROM invoices WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(invoice_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to lock invoice", e))?;

        let Some(created_at) = created_at else {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "Invoice {} does not exist",
                invoice_id
            )));
        };

        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, ItemRow>(
                r#"
                INSERT INTO invoice_items (id, invoice_id, position, name, unit, quantity, unit_price, vat_rate, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING id, invoice_id, position, name, unit, quantity, unit_price, vat_rate, created_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(item.position)
            .bind(&item.name)
            .bind(item.unit_or_default())
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.vat_rate.as_str())
            .bind(created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(anyhow::anyhow!(
                        "Duplicate item position {} on invoice {}",
                        item.position,
                        invoice_id
                    ))
                } else {
                    db_error("Failed to insert invoice item", e)
                }
            })?;
            stored.push(InvoiceItem::try_from(row)?);
        }

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit items", e))?;

        timer.observe_duration();

        stored.sort_by_key(|i| i.position);
        Ok(stored)
    }

    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    async fn purge_invoice(&self, user_id: Uuid, invoice_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["purge_invoice"])
            .start_timer();

        // Items go with the invoice via ON DELETE CASCADE.
        sqlx::query("DELETE FROM invoices WHERE id = $1 AND user_id = $2")
            .bind(invoice_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to purge invoice", e))?;

        timer.observe_duration();

        info!("Invoice purged");

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    async fn get_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let sql = format!(
            "SELECT {} FROM invoices WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
            INVOICE_COLUMNS
        );
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(invoice_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get invoice", e))?;

        timer.observe_duration();

        row.map(Invoice::try_from).transpose()
    }

    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    async fn get_items(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_items"])
            .start_timer();

        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT it.id, it.invoice_id, it.position, it.name, it.unit, it.quantity, it.unit_price,
                it.vat_rate, it.created_at
            FROM invoice_items it
            JOIN invoices i ON i.id = it.invoice_id
            WHERE it.invoice_id = $1 AND i.user_id = $2 AND i.deleted_at IS NULL
            ORDER BY it.position
            "#,
        )
        .bind(invoice_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get invoice items", e))?;

        timer.observe_duration();

        rows.into_iter().map(InvoiceItem::try_from).collect()
    }

    #[instrument(skip(self, query), fields(user_id = %user_id))]
    async fn list_invoices(
        &self,
        user_id: Uuid,
        query: &ListInvoicesQuery,
    ) -> Result<(Vec<Invoice>, u64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let (_, limit, offset) = crate::models::normalize_paging(query.page, query.limit);
        let status = query.status.map(|s| s.as_str());
        let search = search_term(query.search.as_deref());

        const FILTER: &str = r#"
            WHERE user_id = $1
              AND deleted_at IS NULL
              AND ($2::varchar IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR contractor_id = $3)
              AND ($4::date IS NULL OR issue_date >= $4)
              AND ($5::date IS NULL OR issue_date <= $5)
              AND ($6::varchar IS NULL OR invoice_number ILIKE $6 OR buyer_name ILIKE $6)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM invoices {}", FILTER))
            .bind(user_id)
            .bind(status)
            .bind(query.contractor_id)
            .bind(query.issued_from)
            .bind(query.issued_to)
            .bind(&search)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to count invoices", e))?;

        // Sort column and direction come from closed enums, never from input text.
        let sql = format!(
            "SELECT {} FROM invoices {} ORDER BY {} {}, id {} LIMIT $7 OFFSET $8",
            INVOICE_COLUMNS,
            FILTER,
            query.sort_by.column(),
            query.sort_order.as_sql(),
            query.sort_order.as_sql()
        );
        let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(user_id)
            .bind(status)
            .bind(query.contractor_id)
            .bind(query.issued_from)
            .bind(query.issued_to)
            .bind(&search)
            .bind(i64::from(limit))
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list invoices", e))?;

        timer.observe_duration();

        let invoices = rows
            .into_iter()
            .map(Invoice::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((invoices, total.max(0) as u64))
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn invoice_number_exists(
        &self,
        user_id: Uuid,
        invoice_number: &str,
        exclude_invoice_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoice_number_exists"])
            .start_timer();

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM invoices
                WHERE user_id = $1
                  AND invoice_number = $2
                  AND deleted_at IS NULL
                  AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(user_id)
        .bind(invoice_number)
        .bind(exclude_invoice_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to check invoice number", e))?;

        timer.observe_duration();

        Ok(exists)
    }

    #[instrument(skip(self, invoice), fields(user_id = %invoice.user_id, invoice_id = %invoice.id))]
    async fn update_invoice(&self, invoice: &Invoice) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let sql = format!(
            r#"
            UPDATE invoices SET
                invoice_number = $3, issue_date = $4, due_date = $5, payment_method = $6,
                currency = $7, notes = $8,
                seller_company_name = $9, seller_address = $10, seller_nip = $11,
                seller_bank_account = $12, seller_logo_url = $13,
                buyer_name = $14, buyer_address = $15, buyer_nip = $16, contractor_id = $17,
                total_net = $18, total_vat = $19, total_gross = $20, updated_at = $21
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );

        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(invoice.id)
            .bind(invoice.user_id)
            .bind(&invoice.invoice_number)
            .bind(invoice.issue_date)
            .bind(invoice.due_date)
            .bind(invoice.payment_method.as_str())
            .bind(&invoice.currency)
            .bind(&invoice.notes)
            .bind(&invoice.seller.company_name)
            .bind(&invoice.seller.address)
            .bind(&invoice.seller.nip)
            .bind(&invoice.seller.bank_account)
            .bind(&invoice.seller.logo_url)
            .bind(&invoice.buyer.name)
            .bind(&invoice.buyer.address)
            .bind(&invoice.buyer.nip)
            .bind(invoice.contractor_id)
            .bind(invoice.total_net)
            .bind(invoice.total_vat)
            .bind(invoice.total_gross)
            .bind(invoice.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(anyhow::anyhow!(
                        "Invoice number '{}' already exists",
                        invoice.invoice_number
                    ))
                } else {
                    db_error("Failed to update invoice", e)
                }
            })?;

        timer.observe_duration();

        if row.is_some() {
            info!("Invoice row updated");
        }

        row.map(Invoice::try_from).transpose()
    }

    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    async fn delete_items(&self, user_id: Uuid, invoice_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_items"])
            .start_timer();

        sqlx::query(
            r#"
            DELETE FROM invoice_items it
            USING invoices i
            WHERE it.invoice_id = i.id AND i.id = $1 AND i.user_id = $2 AND i.deleted_at IS NULL
            "#,
        )
        .bind(invoice_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to delete invoice items", e))?;

        timer.observe_duration();

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id, status = %status))]
    async fn update_status(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_status"])
            .start_timer();

        let sql = format!(
            r#"
            UPDATE invoices SET status = $3, updated_at = $4
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(invoice_id)
            .bind(user_id)
            .bind(status.as_str())
            .bind(updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to update invoice status", e))?;

        timer.observe_duration();

        row.map(Invoice::try_from).transpose()
    }

    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    async fn soft_delete_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["soft_delete_invoice"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE invoices SET deleted_at = $3, updated_at = $3
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(invoice_id)
        .bind(user_id)
        .bind(deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to delete invoice", e))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProfileRepository for Database {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_profile"])
            .start_timer();

        let sql = format!("SELECT {} FROM profiles WHERE user_id = $1", PROFILE_COLUMNS);
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get profile", e))?;

        timer.observe_duration();

        Ok(row.map(UserProfile::from))
    }

    #[instrument(skip(self, profile), fields(user_id = %profile.user_id))]
    async fn create_profile(&self, profile: &UserProfile) -> Result<UserProfile, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_profile"])
            .start_timer();

        let sql = format!(
            r#"
            INSERT INTO profiles (
                user_id, email, company_name, address, nip, bank_account, logo_url,
                invoice_number_format, invoice_number_counter, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(profile.user_id)
            .bind(&profile.email)
            .bind(&profile.company_name)
            .bind(&profile.address)
            .bind(&profile.nip)
            .bind(&profile.bank_account)
            .bind(&profile.logo_url)
            .bind(&profile.invoice_number_format)
            .bind(profile.invoice_number_counter)
            .bind(profile.created_at)
            .bind(profile.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(anyhow::anyhow!(
                        "Profile for user {} already exists",
                        profile.user_id
                    ))
                } else {
                    db_error("Failed to create profile", e)
                }
            })?;

        timer.observe_duration();

        info!("Profile created");

        Ok(row.into())
    }

    #[instrument(skip(self, profile), fields(user_id = %profile.user_id))]
    async fn update_profile(&self, profile: &UserProfile) -> Result<Option<UserProfile>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_profile"])
            .start_timer();

        let sql = format!(
            r#"
            UPDATE profiles SET
                email = $2, company_name = $3, address = $4, nip = $5, bank_account = $6,
                logo_url = $7, invoice_number_format = $8, updated_at = $9
            WHERE user_id = $1
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(profile.user_id)
            .bind(&profile.email)
            .bind(&profile.company_name)
            .bind(&profile.address)
            .bind(&profile.nip)
            .bind(&profile.bank_account)
            .bind(&profile.logo_url)
            .bind(&profile.invoice_number_format)
            .bind(profile.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to update profile", e))?;

        timer.observe_duration();

        Ok(row.map(UserProfile::from))
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn increment_invoice_counter(&self, user_id: Uuid) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["increment_invoice_counter"])
            .start_timer();

        let counter: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE profiles SET invoice_number_counter = invoice_number_counter + 1
            WHERE user_id = $1
            RETURNING invoice_number_counter
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to increment invoice counter", e))?;

        timer.observe_duration();

        counter.ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Profile for user {} not found", user_id))
        })
    }
}

#[async_trait]
impl ContractorRepository for Database {
    #[instrument(skip(self, contractor), fields(user_id = %contractor.user_id, contractor_id = %contractor.id))]
    async fn insert_contractor(&self, contractor: &Contractor) -> Result<Contractor, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_contractor"])
            .start_timer();

        let sql = format!(
            r#"
            INSERT INTO contractors (id, user_id, name, address, nip, email, phone, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            CONTRACTOR_COLUMNS
        );
        let row = sqlx::query_as::<_, ContractorRow>(&sql)
            .bind(contractor.id)
            .bind(contractor.user_id)
            .bind(&contractor.name)
            .bind(&contractor.address)
            .bind(&contractor.nip)
            .bind(&contractor.email)
            .bind(&contractor.phone)
            .bind(contractor.created_at)
            .bind(contractor.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(anyhow::anyhow!(
                        "Contractor NIP '{}' already exists",
                        contractor.nip.as_deref().unwrap_or_default()
                    ))
                } else {
                    db_error("Failed to insert contractor", e)
                }
            })?;

        timer.observe_duration();

        info!(name = %row.name, "Contractor created");

        Ok(row.into())
    }

    #[instrument(skip(self), fields(user_id = %user_id, contractor_id = %contractor_id))]
    async fn get_contractor(
        &self,
        user_id: Uuid,
        contractor_id: Uuid,
    ) -> Result<Option<Contractor>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_contractor"])
            .start_timer();

        let sql = format!(
            "SELECT {} FROM contractors WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
            CONTRACTOR_COLUMNS
        );
        let row = sqlx::query_as::<_, ContractorRow>(&sql)
            .bind(contractor_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get contractor", e))?;

        timer.observe_duration();

        Ok(row.map(Contractor::from))
    }

    #[instrument(skip(self, query), fields(user_id = %user_id))]
    async fn list_contractors(
        &self,
        user_id: Uuid,
        query: &ListContractorsQuery,
    ) -> Result<(Vec<Contractor>, u64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_contractors"])
            .start_timer();

        let (_, limit, offset) = crate::models::normalize_paging(query.page, query.limit);
        let search = search_term(query.search.as_deref());

        const FILTER: &str = r#"
            WHERE user_id = $1
              AND deleted_at IS NULL
              AND ($2::varchar IS NULL OR name ILIKE $2 OR nip ILIKE $2)
        "#;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM contractors {}", FILTER))
                .bind(user_id)
                .bind(&search)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_error("Failed to count contractors", e))?;

        let sql = format!(
            "SELECT {} FROM contractors {} ORDER BY name, id LIMIT $3 OFFSET $4",
            CONTRACTOR_COLUMNS, FILTER
        );
        let rows = sqlx::query_as::<_, ContractorRow>(&sql)
            .bind(user_id)
            .bind(&search)
            .bind(i64::from(limit))
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list contractors", e))?;

        timer.observe_duration();

        Ok((
            rows.into_iter().map(Contractor::from).collect(),
            total.max(0) as u64,
        ))
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn nip_exists(
        &self,
        user_id: Uuid,
        nip: &str,
        exclude_contractor_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["nip_exists"])
            .start_timer();

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM contractors
                WHERE user_id = $1
                  AND nip = $2
                  AND deleted_at IS NULL
                  AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(user_id)
        .bind(nip)
        .bind(exclude_contractor_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to check contractor NIP", e))?;

        timer.observe_duration();

        Ok(exists)
    }

    #[instrument(skip(self, contractor), fields(user_id = %contractor.user_id, contractor_id = %contractor.id))]
    async fn update_contractor(
        &self,
        contractor: &Contractor,
    ) -> Result<Option<Contractor>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_contractor"])
            .start_timer();

        let sql = format!(
            r#"
            UPDATE contractors SET
                name = $3, address = $4, nip = $5, email = $6, phone = $7, updated_at = $8
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            RETURNING {}
            "#,
            CONTRACTOR_COLUMNS
        );
        let row = sqlx::query_as::<_, ContractorRow>(&sql)
            .bind(contractor.id)
            .bind(contractor.user_id)
            .bind(&contractor.name)
            .bind(&contractor.address)
            .bind(&contractor.nip)
            .bind(&contractor.email)
            .bind(&contractor.phone)
            .bind(contractor.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(anyhow::anyhow!(
                        "Contractor NIP '{}' already exists",
                        contractor.nip.as_deref().unwrap_or_default()
                    ))
                } else {
                    db_error("Failed to update contractor", e)
                }
            })?;

        timer.observe_duration();

        Ok(row.map(Contractor::from))
    }

    #[instrument(skip(self), fields(user_id = %user_id, contractor_id = %contractor_id))]
    async fn soft_delete_contractor(
        &self,
        user_id: Uuid,
        contractor_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["soft_delete_contractor"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE contractors SET deleted_at = $3, updated_at = $3
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(contractor_id)
        .bind(user_id)
        .bind(deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to delete contractor", e))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_patterns_escape_wildcards() {
        assert_eq!(contains_pattern("FV/2025"), "%FV/2025%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn blank_search_is_ignored() {
        assert_eq!(search_term(None), None);
        assert_eq!(search_term(Some("   ")), None);
        assert_eq!(search_term(Some(" acme ")), Some("%acme%".to_string()));
    }
}
