use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use nivaran_gateway::DonationGateway;
use nivaran_types::api::NewDonation;
use nivaran_types::models::{DonationRecord, DonationStatus, Role};

use crate::error::{ClientError, ClientResult};
use crate::session_store::SessionStore;

#[derive(Clone)]
pub struct Donations {
    donations: Arc<dyn DonationGateway>,
    store: SessionStore,
}

impl Donations {
    pub fn new(donations: Arc<dyn DonationGateway>, store: SessionStore) -> Self {
        Self { donations, store }
    }

    /// Record a hand-over between the caller and `counterpart_id`, pending
    /// until either side updates it.
    pub async fn record(
        &self,
        counterpart_id: Uuid,
        post_id: Option<Uuid>,
        notes: Option<String>,
    ) -> ClientResult<DonationRecord> {
        let me = self.store.require_profile()?;
        if me.id == counterpart_id {
            return Err(ClientError::ValidationFailed("a donation needs two parties".into()));
        }
        let (donor_id, ngo_id) = match me.role {
            Role::Donor => (me.id, counterpart_id),
            Role::Ngo => (counterpart_id, me.id),
        };

        let record = self
            .donations
            .create_donation_record(NewDonation {
                donor_id,
                ngo_id,
                post_id,
                status: DonationStatus::Pending,
                notes,
            })
            .await?;
        info!(donation = %record.id, "Donation recorded");
        Ok(record)
    }

    /// The caller's donations, newest first, seen from their role. Failures
    /// yield an empty list.
    pub async fn history(&self) -> Vec<DonationRecord> {
        let Ok(me) = self.store.require_profile() else {
            return Vec::new();
        };
        match self.donations.donation_history(me.id, me.role).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to load donation history: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn set_status(
        &self,
        donation_id: Uuid,
        status: DonationStatus,
        notes: Option<String>,
    ) -> ClientResult<DonationRecord> {
        self.store.require_user()?;
        let record = self.donations.update_donation_status(donation_id, status, notes).await?;
        info!(donation = %donation_id, status = status.as_str(), "Donation updated");
        Ok(record)
    }
}
