//! Seller profile and invoice numbering settings.

use crate::error::InvoicingError;
use crate::models::{UpdateProfile, UserProfile};
use crate::services::clock::{Clock, SystemClock};
use crate::services::numbering::has_counter_placeholder;
use crate::services::observe;
use crate::services::repository::ProfileRepository;
use crate::services::validation::{check_length, non_blank, validate_iban, validate_nip};
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Longest accepted invoice number template.
pub const MAX_NUMBER_FORMAT_LEN: usize = 50;

pub const MAX_COMPANY_NAME_LEN: usize = 255;

pub struct ProfileService {
    profiles: Arc<dyn ProfileRepository>,
    clock: Arc<dyn Clock>,
}

fn validate_number_format(raw: &str) -> Result<String, InvoicingError> {
    let format = raw.trim();
    if format.is_empty() {
        return Err(InvoicingError::validation("Invoice number format must not be blank"));
    }
    if format.chars().count() > MAX_NUMBER_FORMAT_LEN {
        return Err(InvoicingError::validation(format!(
            "Invoice number format is longer than {} characters",
            MAX_NUMBER_FORMAT_LEN
        )));
    }
    if !has_counter_placeholder(format) {
        return Err(InvoicingError::validation(
            "Invoice number format needs a counter placeholder such as {NNN}",
        ));
    }
    Ok(format.to_string())
}

impl ProfileService {
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Self {
        Self::with_clock(profiles, Arc::new(SystemClock))
    }

    pub fn with_clock(profiles: Arc<dyn ProfileRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { profiles, clock }
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get(&self, user_id: Uuid) -> Result<UserProfile, InvoicingError> {
        observe("get_profile", self.load(user_id).await)
    }

    /// Fetch the caller's profile, creating an empty one on first sign-in.
    #[instrument(skip(self, email), fields(user_id = %user_id))]
    pub async fn ensure(
        &self,
        user_id: Uuid,
        email: Option<String>,
    ) -> Result<UserProfile, InvoicingError> {
        observe("ensure_profile", self.get_or_create(user_id, email).await)
    }

    #[instrument(skip(self, cmd), fields(user_id = %user_id))]
    pub async fn update(
        &self,
        user_id: Uuid,
        cmd: UpdateProfile,
    ) -> Result<UserProfile, InvoicingError> {
        observe("update_profile", self.apply_update(user_id, cmd).await)
    }

    async fn load(&self, user_id: Uuid) -> Result<UserProfile, InvoicingError> {
        self.profiles
            .get_profile(user_id)
            .await?
            .ok_or(InvoicingError::NotFound("User profile"))
    }

    async fn get_or_create(
        &self,
        user_id: Uuid,
        email: Option<String>,
    ) -> Result<UserProfile, InvoicingError> {
        if let Some(profile) = self.profiles.get_profile(user_id).await? {
            return Ok(profile);
        }

        let profile = UserProfile::new(user_id, non_blank(email), self.clock.now());
        match self.profiles.create_profile(&profile).await {
            Ok(created) => {
                info!("Profile created on first sign-in");
                Ok(created)
            }
            // A concurrent first request created it.
            Err(AppError::Conflict(_)) => self.load(user_id).await,
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_update(
        &self,
        user_id: Uuid,
        cmd: UpdateProfile,
    ) -> Result<UserProfile, InvoicingError> {
        let mut profile = self.load(user_id).await?;

        if let Some(company_name) = cmd.company_name {
            profile.company_name = non_blank(Some(company_name));
            if let Some(name) = &profile.company_name {
                check_length("Company name", name, MAX_COMPANY_NAME_LEN)?;
            }
        }
        if let Some(address) = cmd.address {
            profile.address = non_blank(Some(address));
        }
        if let Some(nip) = cmd.nip {
            profile.nip = match non_blank(Some(nip)) {
                Some(nip) => Some(validate_nip(&nip)?),
                None => None,
            };
        }
        if let Some(bank_account) = cmd.bank_account {
            profile.bank_account = match non_blank(bank_account) {
                Some(account) => Some(validate_iban(&account)?),
                None => None,
            };
        }
        if let Some(logo_url) = cmd.logo_url {
            profile.logo_url = non_blank(logo_url);
        }
        if let Some(format) = cmd.invoice_number_format {
            profile.invoice_number_format = validate_number_format(&format)?;
        }
        profile.updated_at = self.clock.now();

        let updated = self
            .profiles
            .update_profile(&profile)
            .await?
            .ok_or(InvoicingError::NotFound("User profile"))?;

        info!(complete = updated.missing_seller_fields().is_empty(), "Profile updated");

        Ok(updated)
    }
}
