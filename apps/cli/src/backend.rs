//! Wires the core services to either Supabase or the in-memory backend.

use std::sync::Arc;

use anyhow::Context;
use hopefund_core::campaigns::{CampaignReadModel, CampaignRepositoryTrait, CampaignService};
use hopefund_core::donations::{DonationRepositoryTrait, DonationService};
use hopefund_core::events::{DomainEventSink, LogDomainEventSink};
use hopefund_core::gateway::{ChangeFeedTrait, InMemoryGateway};
use hopefund_core::profile::ProfileService;
use hopefund_core::session::{AuthGatewayTrait, FileSessionStorage, SessionStore};
use hopefund_core::utils::{Clock, SystemClock};
use hopefund_supabase::{RealtimeFeed, SupabaseClient};

use crate::config::Config;

type Gateways = (
    Arc<dyn AuthGatewayTrait>,
    Arc<dyn CampaignRepositoryTrait>,
    Arc<dyn DonationRepositoryTrait>,
);

fn gateways<G>(gateway: Arc<G>) -> Gateways
where
    G: AuthGatewayTrait + CampaignRepositoryTrait + DonationRepositoryTrait + 'static,
{
    (gateway.clone(), gateway.clone(), gateway)
}

pub enum Remote {
    Supabase(Arc<SupabaseClient>),
    Offline(Arc<InMemoryGateway>),
}

pub struct Backend {
    pub remote: Remote,
    pub clock: Arc<dyn Clock>,
    pub session: Arc<SessionStore>,
    pub read_model: Arc<CampaignReadModel>,
    pub campaigns: CampaignService,
    pub donations: DonationService,
    pub profile: ProfileService,
}

impl Backend {
    /// Builds every service and restores the persisted session.
    pub async fn connect(config: &Config, offline: bool) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let (remote, session_file) = if offline {
            tracing::info!("Using the in-memory backend");
            let gateway = Arc::new(InMemoryGateway::seeded(clock.clone()));
            (Remote::Offline(gateway), config.offline_session_file())
        } else {
            let supabase = config.supabase.clone().context(
                "HOPEFUND_SUPABASE_URL and HOPEFUND_SUPABASE_ANON_KEY must be set (or pass --offline)",
            )?;
            tracing::info!("Using Supabase project {}", supabase.url);
            let client = Arc::new(SupabaseClient::new(supabase)?);
            (Remote::Supabase(client), config.session_file.clone())
        };

        let (auth, campaign_repo, donation_repo) = match &remote {
            Remote::Supabase(client) => gateways(client.clone()),
            Remote::Offline(gateway) => gateways(gateway.clone()),
        };

        let sink: Arc<dyn DomainEventSink> = Arc::new(LogDomainEventSink);
        let session = Arc::new(SessionStore::new(
            auth,
            Arc::new(FileSessionStorage::new(session_file)),
            sink.clone(),
        ));
        session.restore().await;

        let read_model = Arc::new(CampaignReadModel::new(
            campaign_repo.clone(),
            clock.clone(),
            sink.clone(),
        ));
        let campaigns = CampaignService::new(
            campaign_repo.clone(),
            session.clone(),
            clock.clone(),
            sink.clone(),
        );
        let donations = DonationService::new(
            donation_repo.clone(),
            session.clone(),
            read_model.clone(),
            sink,
        );
        let profile =
            ProfileService::new(campaign_repo, donation_repo, session.clone(), clock.clone());

        Ok(Self {
            remote,
            clock,
            session,
            read_model,
            campaigns,
            donations,
            profile,
        })
    }

    /// Change feed for live updates. Opens the websocket for Supabase.
    pub fn change_feed(&self) -> anyhow::Result<Arc<dyn ChangeFeedTrait>> {
        match &self.remote {
            Remote::Supabase(client) => Ok(Arc::new(RealtimeFeed::connect(client)?)),
            Remote::Offline(gateway) => Ok(gateway.clone()),
        }
    }

    pub fn offline_gateway(&self) -> Option<&Arc<InMemoryGateway>> {
        match &self.remote {
            Remote::Offline(gateway) => Some(gateway),
            Remote::Supabase(_) => None,
        }
    }
}
