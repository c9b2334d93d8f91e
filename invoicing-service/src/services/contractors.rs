//! Contractor (buyer) directory per user.

use crate::error::InvoicingError;
use crate::models::{
    normalize_paging, Contractor, CreateContractor, ListContractorsQuery, Paginated,
    UpdateContractor,
};
use crate::services::clock::{Clock, SystemClock};
use crate::services::observe;
use crate::services::repository::ContractorRepository;
use crate::services::validation::{check_length, non_blank, validate_nip};
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const MAX_CONTRACTOR_NAME_LEN: usize = 255;
pub const MAX_EMAIL_LEN: usize = 320;
pub const MAX_PHONE_LEN: usize = 50;

pub struct ContractorService {
    contractors: Arc<dyn ContractorRepository>,
    clock: Arc<dyn Clock>,
}

fn required_name(raw: &str) -> Result<String, InvoicingError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(InvoicingError::validation("Contractor name is required"));
    }
    check_length("Contractor name", name, MAX_CONTRACTOR_NAME_LEN)?;
    Ok(name.to_string())
}

fn bounded(
    field: &str,
    raw: Option<String>,
    max: usize,
) -> Result<Option<String>, InvoicingError> {
    let value = non_blank(raw);
    if let Some(v) = &value {
        check_length(field, v, max)?;
    }
    Ok(value)
}

fn optional_nip(raw: Option<String>) -> Result<Option<String>, InvoicingError> {
    non_blank(raw).map(|nip| validate_nip(&nip)).transpose()
}

impl ContractorService {
    pub fn new(contractors: Arc<dyn ContractorRepository>) -> Self {
        Self::with_clock(contractors, Arc::new(SystemClock))
    }

    pub fn with_clock(contractors: Arc<dyn ContractorRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { contractors, clock }
    }

    #[instrument(skip(self, cmd), fields(user_id = %user_id))]
    pub async fn create(
        &self,
        user_id: Uuid,
        cmd: CreateContractor,
    ) -> Result<Contractor, InvoicingError> {
        observe("create_contractor", self.create_contractor(user_id, cmd).await)
    }

    #[instrument(skip(self, query), fields(user_id = %user_id))]
    pub async fn find_all(
        &self,
        user_id: Uuid,
        query: ListContractorsQuery,
    ) -> Result<Paginated<Contractor>, InvoicingError> {
        observe("list_contractors", self.list(user_id, query).await)
    }

    #[instrument(skip(self), fields(user_id = %user_id, contractor_id = %contractor_id))]
    pub async fn find_one(
        &self,
        user_id: Uuid,
        contractor_id: Uuid,
    ) -> Result<Contractor, InvoicingError> {
        observe("get_contractor", self.load(user_id, contractor_id).await)
    }

    #[instrument(skip(self, cmd), fields(user_id = %user_id, contractor_id = %contractor_id))]
    pub async fn update(
        &self,
        user_id: Uuid,
        contractor_id: Uuid,
        cmd: UpdateContractor,
    ) -> Result<Contractor, InvoicingError> {
        observe(
            "update_contractor",
            self.update_contractor(user_id, contractor_id, cmd).await,
        )
    }

    /// Soft-delete a contractor. Invoices keep their buyer snapshots.
    #[instrument(skip(self), fields(user_id = %user_id, contractor_id = %contractor_id))]
    pub async fn remove(&self, user_id: Uuid, contractor_id: Uuid) -> Result<(), InvoicingError> {
        observe(
            "remove_contractor",
            self.remove_contractor(user_id, contractor_id).await,
        )
    }

    async fn load(&self, user_id: Uuid, contractor_id: Uuid) -> Result<Contractor, InvoicingError> {
        self.contractors
            .get_contractor(user_id, contractor_id)
            .await?
            .ok_or(InvoicingError::NotFound("Contractor"))
    }

    async fn ensure_nip_free(
        &self,
        user_id: Uuid,
        nip: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), InvoicingError> {
        if self.contractors.nip_exists(user_id, nip, exclude).await? {
            warn!(nip = %nip, "Contractor NIP already taken");
            return Err(InvoicingError::NipExists(nip.to_string()));
        }
        Ok(())
    }

    async fn create_contractor(
        &self,
        user_id: Uuid,
        cmd: CreateContractor,
    ) -> Result<Contractor, InvoicingError> {
        let name = required_name(&cmd.name)?;
        let nip = optional_nip(cmd.nip)?;
        if let Some(nip) = &nip {
            self.ensure_nip_free(user_id, nip, None).await?;
        }

        let now = self.clock.now();
        let contractor = Contractor {
            id: Uuid::new_v4(),
            user_id,
            name,
            address: non_blank(cmd.address),
            nip,
            email: bounded("Email", cmd.email, MAX_EMAIL_LEN)?,
            phone: bounded("Phone", cmd.phone, MAX_PHONE_LEN)?,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let created = self
            .contractors
            .insert_contractor(&contractor)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => {
                    InvoicingError::NipExists(contractor.nip.clone().unwrap_or_default())
                }
                other => other.into(),
            })?;

        info!(contractor_id = %created.id, "Contractor created");

        Ok(created)
    }

    async fn list(
        &self,
        user_id: Uuid,
        query: ListContractorsQuery,
    ) -> Result<Paginated<Contractor>, InvoicingError> {
        let (page, limit, _) = normalize_paging(query.page, query.limit);
        let query = ListContractorsQuery {
            page,
            limit,
            ..query
        };
        let (items, total) = self.contractors.list_contractors(user_id, &query).await?;
        Ok(Paginated {
            items,
            total,
            page,
            limit,
        })
    }

    async fn update_contractor(
        &self,
        user_id: Uuid,
        contractor_id: Uuid,
        cmd: UpdateContractor,
    ) -> Result<Contractor, InvoicingError> {
        let mut contractor = self.load(user_id, contractor_id).await?;

        if let Some(name) = cmd.name {
            contractor.name = required_name(&name)?;
        }
        if let Some(nip) = cmd.nip {
            let nip = optional_nip(nip)?;
            if let Some(nip) = &nip {
                if contractor.nip.as_ref() != Some(nip) {
                    self.ensure_nip_free(user_id, nip, Some(contractor_id))
                        .await?;
                }
            }
            contractor.nip = nip;
        }
        if let Some(address) = cmd.address {
            contractor.address = non_blank(address);
        }
        if let Some(email) = cmd.email {
            contractor.email = bounded("Email", email, MAX_EMAIL_LEN)?;
        }
        if let Some(phone) = cmd.phone {
            contractor.phone = bounded("Phone", phone, MAX_PHONE_LEN)?;
        }
        contractor.updated_at = self.clock.now();

        let nip = contractor.nip.clone();
        let updated = self
            .contractors
            .update_contractor(&contractor)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => InvoicingError::NipExists(nip.unwrap_or_default()),
                other => other.into(),
            })?
            .ok_or(InvoicingError::NotFound("Contractor"))?;

        info!("Contractor updated");

        Ok(updated)
    }

    async fn remove_contractor(
        &self,
        user_id: Uuid,
        contractor_id: Uuid,
    ) -> Result<(), InvoicingError> {
        let deleted = self
            .contractors
            .soft_delete_contractor(user_id, contractor_id, self.clock.now())
            .await?;
        if !deleted {
            return Err(InvoicingError::NotFound("Contractor"));
        }
        info!("Contractor deleted");
        Ok(())
    }
}
