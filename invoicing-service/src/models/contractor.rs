//! Contractor model for invoicing-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Business partner an invoice can be addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contractor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub nip: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input for creating a contractor.
#[derive(Debug, Clone, Default)]
pub struct CreateContractor {
    pub name: String,
    pub address: Option<String>,
    pub nip: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Input for updating a contractor. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default)]
pub struct UpdateContractor {
    pub name: Option<String>,
    pub address: Option<Option<String>>,
    pub nip: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
}

/// Filter parameters for listing contractors.
#[derive(Debug, Clone)]
pub struct ListContractorsQuery {
    /// Case-insensitive match on name or NIP.
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl Default for ListContractorsQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            limit: super::DEFAULT_PAGE_SIZE,
        }
    }
}
