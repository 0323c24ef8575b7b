use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Duration;
use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use super::change_event::{ChangeEvent, ChangeEventType, Table};
use super::subscription::{ChangeCallback, Subscription, SubscriptionRegistry};
use super::ChangeFeedTrait;
use crate::campaigns::{
    Campaign, CampaignCategory, CampaignInsert, CampaignRepositoryTrait, CampaignStatus,
};
use crate::donations::{Donation, DonationRepositoryTrait, DonorDonation, NewDonation};
use crate::errors::{GatewayError, GatewayResult};
use crate::session::{AuthGatewayTrait, Identity, SignUpProfile, UserRole};
use crate::utils::Clock;

/// Gateway operations that can be counted or made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    SignIn,
    SignUp,
    ListCampaigns,
    GetCampaign,
    CreateCampaign,
    MarkCompleted,
    ListOwnedCampaigns,
    RecordDonation,
    ListDonations,
}

#[derive(Default)]
struct MemoryState {
    users: Vec<(Identity, String)>,
    campaigns: Vec<Campaign>,
    donations: Vec<Donation>,
    failures: HashMap<GatewayOp, VecDeque<GatewayError>>,
    calls: HashMap<GatewayOp, usize>,
}

/// Backend held entirely in memory.
///
/// Recording a donation aggregates it into the campaign total and pushes
/// the updated row, the way the hosted backend's trigger does.
pub struct InMemoryGateway {
    state: Mutex<MemoryState>,
    registry: SubscriptionRegistry,
    clock: Arc<dyn Clock>,
    holding: AtomicBool,
    held: Mutex<VecDeque<ChangeEvent>>,
}

impl InMemoryGateway {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            registry: SubscriptionRegistry::new(),
            clock,
            holding: AtomicBool::new(false),
            held: Mutex::new(VecDeque::new()),
        }
    }

    /// Gateway preloaded with demo accounts and campaigns.
    pub fn seeded(clock: Arc<dyn Clock>) -> Self {
        let today = clock.today();
        let now = clock.now();
        let gateway = Self::new(clock);

        gateway.add_user(
            Identity {
                id: "user-donor".to_string(),
                name: "John Doe".to_string(),
                email: "john@example.com".to_string(),
                role: UserRole::Donor,
                avatar: None,
            },
            "password123",
        );
        gateway.add_user(
            Identity {
                id: "user-organizer".to_string(),
                name: "Jane Smith".to_string(),
                email: "jane@example.com".to_string(),
                role: UserRole::Organizer,
                avatar: None,
            },
            "password123",
        );

        let seed = [
            (
                "camp-water",
                "Clean Water for Rural Schools",
                CampaignCategory::Health,
                dec!(15000),
                dec!(9250),
                30,
                None,
            ),
            (
                "camp-books",
                "Library Books for Every Classroom",
                CampaignCategory::Education,
                dec!(5000),
                dec!(5000),
                12,
                Some(CampaignStatus::Completed),
            ),
            (
                "camp-reef",
                "Coral Reef Restoration Project",
                CampaignCategory::Environment,
                dec!(25000),
                dec!(3100),
                60,
                None,
            ),
            (
                "camp-shelter",
                "Winter Shelter for Stray Animals",
                CampaignCategory::Animals,
                dec!(8000),
                dec!(7600),
                -3,
                None,
            ),
            (
                "camp-flood",
                "Emergency Flood Relief Kits",
                CampaignCategory::Disaster,
                dec!(12000),
                dec!(4800),
                20,
                None,
            ),
        ];
        for (index, (id, title, category, goal, raised, days, status)) in
            seed.into_iter().enumerate()
        {
            gateway.add_campaign(Campaign {
                id: id.to_string(),
                title: title.to_string(),
                description: format!(
                    "{} needs your help. Every donation goes straight to the project.",
                    title
                ),
                category,
                goal,
                current_amount: raised,
                deadline: today + Duration::days(days),
                user_id: "user-organizer".to_string(),
                status: status.unwrap_or_default(),
                image_url: None,
                created_at: Some(now - Duration::days(index as i64 + 1)),
            });
        }
        gateway
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_user(&self, identity: Identity, password: &str) {
        self.lock().users.push((identity, password.to_string()));
    }

    pub fn add_campaign(&self, campaign: Campaign) {
        let mut state = self.lock();
        state.campaigns.retain(|c| c.id != campaign.id);
        state.campaigns.push(campaign);
    }

    pub fn campaign(&self, campaign_id: &str) -> Option<Campaign> {
        self.lock()
            .campaigns
            .iter()
            .find(|c| c.id == campaign_id)
            .cloned()
    }

    pub fn donations(&self) -> Vec<Donation> {
        self.lock().donations.clone()
    }

    /// Makes the next call of `op` fail with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, op: GatewayOp, error: GatewayError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    /// Number of calls made to `op`, failed ones included.
    pub fn calls(&self, op: GatewayOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of active change subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// While holding, pushes are queued instead of delivered.
    pub fn hold_pushes(&self, hold: bool) {
        self.holding.store(hold, Ordering::SeqCst);
    }

    /// Delivers queued pushes in order. Returns how many were delivered.
    pub fn flush_pushes(&self) -> usize {
        let queued: Vec<ChangeEvent> = self
            .held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for event in &queued {
            self.registry.dispatch(event);
        }
        queued.len()
    }

    /// Donation from someone else, aggregated and pushed like any other.
    pub fn simulate_donation(&self, campaign_id: &str, amount: Decimal) -> GatewayResult<Campaign> {
        let donation = NewDonation {
            user_id: None,
            campaign_id: Some(campaign_id.to_string()),
            amount,
            is_anonymous: true,
            donor_name: None,
            message: None,
        };
        let (_, events) = self.insert_donation(donation)?;
        self.publish(events);
        self.campaign(campaign_id)
            .ok_or_else(|| GatewayError::NotFound(format!("campaign {}", campaign_id)))
    }

    /// Replaces a campaign row and pushes it as an update.
    pub fn push_campaign(&self, campaign: Campaign) {
        let event = campaign_event(ChangeEventType::Update, &campaign);
        self.add_campaign(campaign);
        self.publish(event.into_iter().collect());
    }

    fn begin(&self, op: GatewayOp) -> GatewayResult<()> {
        let mut state = self.lock();
        *state.calls.entry(op).or_insert(0) += 1;
        match state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn publish(&self, events: Vec<ChangeEvent>) {
        if self.holding.load(Ordering::SeqCst) {
            self.held
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .extend(events);
            return;
        }
        for event in &events {
            let delivered = self.registry.dispatch(event);
            debug!(
                "Pushed {} {} to {} listeners",
                event.table,
                event.event_type.as_str(),
                delivered
            );
        }
    }

    fn insert_donation(&self, new: NewDonation) -> GatewayResult<(Donation, Vec<ChangeEvent>)> {
        if new.amount <= Decimal::ZERO {
            return Err(GatewayError::api(400, "amount must be positive"));
        }
        let now = self.clock.now();
        let mut state = self.lock();
        let mut events = Vec::new();

        if let Some(campaign_id) = &new.campaign_id {
            let campaign = state
                .campaigns
                .iter_mut()
                .find(|c| &c.id == campaign_id)
                .ok_or_else(|| GatewayError::NotFound(format!("campaign {}", campaign_id)))?;
            campaign.current_amount += new.amount;
            events.extend(campaign_event(ChangeEventType::Update, campaign));
        }

        let donation = Donation {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            campaign_id: new.campaign_id,
            amount: new.amount,
            is_anonymous: new.is_anonymous,
            donor_name: new.donor_name,
            message: new.message,
            created_at: Some(now),
        };
        state.donations.push(donation.clone());
        if let Ok(record) = serde_json::to_value(&donation) {
            events.insert(0, ChangeEvent::new(Table::Donations, ChangeEventType::Insert, record));
        }
        Ok((donation, events))
    }
}

fn campaign_event(event_type: ChangeEventType, campaign: &Campaign) -> Option<ChangeEvent> {
    serde_json::to_value(campaign)
        .ok()
        .map(|record| ChangeEvent::new(Table::Campaigns, event_type, record))
}

fn newest_first(campaigns: &mut [Campaign]) {
    campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[async_trait]
impl AuthGatewayTrait for InMemoryGateway {
    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<Identity> {
        self.begin(GatewayOp::SignIn)?;
        self.lock()
            .users
            .iter()
            .find(|(user, pw)| user.email.eq_ignore_ascii_case(email) && pw == password)
            .map(|(user, _)| user.clone())
            .ok_or_else(|| GatewayError::AuthRejected("Invalid login credentials".to_string()))
    }

    async fn sign_up(&self, profile: &SignUpProfile, password: &str) -> GatewayResult<Identity> {
        self.begin(GatewayOp::SignUp)?;
        let mut state = self.lock();
        if state
            .users
            .iter()
            .any(|(user, _)| user.email.eq_ignore_ascii_case(&profile.email))
        {
            return Err(GatewayError::Conflict("User already registered".to_string()));
        }
        let identity = Identity {
            id: Uuid::new_v4().to_string(),
            name: profile.name.clone(),
            email: profile.email.clone(),
            role: profile.role,
            avatar: None,
        };
        state.users.push((identity.clone(), password.to_string()));
        Ok(identity)
    }
}

#[async_trait]
impl CampaignRepositoryTrait for InMemoryGateway {
    async fn list(&self) -> GatewayResult<Vec<Campaign>> {
        self.begin(GatewayOp::ListCampaigns)?;
        let mut campaigns = self.lock().campaigns.clone();
        newest_first(&mut campaigns);
        Ok(campaigns)
    }

    async fn get_by_id(&self, campaign_id: &str) -> GatewayResult<Option<Campaign>> {
        self.begin(GatewayOp::GetCampaign)?;
        Ok(self.campaign(campaign_id))
    }

    async fn create(&self, insert: CampaignInsert) -> GatewayResult<Campaign> {
        self.begin(GatewayOp::CreateCampaign)?;
        let campaign = Campaign {
            id: Uuid::new_v4().to_string(),
            title: insert.title,
            description: insert.description,
            category: insert.category,
            goal: insert.goal,
            current_amount: insert.current_amount,
            deadline: insert.deadline,
            user_id: insert.user_id,
            status: insert.status,
            image_url: insert.image_url,
            created_at: Some(self.clock.now()),
        };
        self.lock().campaigns.push(campaign.clone());
        self.publish(campaign_event(ChangeEventType::Insert, &campaign).into_iter().collect());
        Ok(campaign)
    }

    async fn mark_completed(&self, campaign_id: &str) -> GatewayResult<Campaign> {
        self.begin(GatewayOp::MarkCompleted)?;
        let updated = {
            let mut state = self.lock();
            let campaign = state
                .campaigns
                .iter_mut()
                .find(|c| c.id == campaign_id)
                .ok_or_else(|| GatewayError::NotFound(format!("campaign {}", campaign_id)))?;
            campaign.status = CampaignStatus::Completed;
            campaign.clone()
        };
        self.publish(campaign_event(ChangeEventType::Update, &updated).into_iter().collect());
        Ok(updated)
    }

    async fn list_by_owner(&self, user_id: &str) -> GatewayResult<Vec<Campaign>> {
        self.begin(GatewayOp::ListOwnedCampaigns)?;
        let mut campaigns: Vec<Campaign> = self
            .lock()
            .campaigns
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut campaigns);
        Ok(campaigns)
    }
}

#[async_trait]
impl DonationRepositoryTrait for InMemoryGateway {
    async fn record(&self, donation: NewDonation) -> GatewayResult<Donation> {
        self.begin(GatewayOp::RecordDonation)?;
        let (donation, events) = self.insert_donation(donation)?;
        self.publish(events);
        Ok(donation)
    }

    async fn list_for_donor(&self, user_id: &str) -> GatewayResult<Vec<DonorDonation>> {
        self.begin(GatewayOp::ListDonations)?;
        let state = self.lock();
        let mut history: Vec<DonorDonation> = state
            .donations
            .iter()
            .rev()
            .filter(|d| d.user_id.as_deref() == Some(user_id))
            .map(|d| DonorDonation {
                donation: d.clone(),
                campaign_title: d.campaign_id.as_ref().and_then(|id| {
                    state
                        .campaigns
                        .iter()
                        .find(|c| &c.id == id)
                        .map(|c| c.title.clone())
                }),
            })
            .collect();
        history.sort_by(|a, b| b.donation.created_at.cmp(&a.donation.created_at));
        Ok(history)
    }
}

impl ChangeFeedTrait for InMemoryGateway {
    fn subscribe(
        &self,
        table: Table,
        event_type: ChangeEventType,
        callback: ChangeCallback,
    ) -> Subscription {
        self.registry.subscribe(table, event_type, callback)
    }
}
