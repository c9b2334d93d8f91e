//! User profile model for invoicing-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Numbering template assigned to new profiles.
pub const DEFAULT_NUMBER_FORMAT: &str = "FV/{YYYY}/{MM}/{NNN}";

/// Seller defaults and numbering configuration, one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub company_name: Option<String>,
    pub address: Option<String>,
    pub nip: Option<String>,
    pub bank_account: Option<String>,
    pub logo_url: Option<String>,
    pub invoice_number_format: String,
    /// Last sequence value handed out.
    pub invoice_number_counter: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Blank profile as created on first sign-in.
    pub fn new(user_id: Uuid, email: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            email,
            company_name: None,
            address: None,
            nip: None,
            bank_account: None,
            logo_url: None,
            invoice_number_format: DEFAULT_NUMBER_FORMAT.to_string(),
            invoice_number_counter: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Names of the seller fields that must be filled before issuing.
    pub fn missing_seller_fields(&self) -> Vec<&'static str> {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        let mut missing = Vec::new();
        if blank(&self.company_name) {
            missing.push("companyName");
        }
        if blank(&self.address) {
            missing.push("address");
        }
        if blank(&self.nip) {
            missing.push("nip");
        }
        missing
    }
}

/// Input for updating a profile. Absent fields keep their stored values.
#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    pub company_name: Option<String>,
    pub address: Option<String>,
    pub nip: Option<String>,
    pub bank_account: Option<Option<String>>,
    pub logo_url: Option<Option<String>>,
    pub invoice_number_format: Option<String>,
}
