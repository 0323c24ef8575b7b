use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::campaigns_model::{progress_percent, Campaign, CampaignFilter, CampaignStatus};
use super::campaigns_traits::CampaignRepositoryTrait;
use super::projection::{AmountAnimation, AnimationKind, Projected};
use crate::constants::{OPTIMISTIC_SETTLE_WINDOW, REMOTE_UPDATE_ANIMATION};
use crate::errors::{Error, ErrorKind, GatewayError, Result};
use crate::events::{DomainEvent, DomainEventSink};
use crate::gateway::{
    ChangeCallback, ChangeEvent, ChangeEventType, ChangeFeedTrait, Subscription, Table,
};
use crate::utils::time_utils::to_chrono;
use crate::utils::Clock;

/// Fetch state of the campaign list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Failed(ErrorKind),
}

/// Detail view state for a single campaign.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum DetailState {
    Loading,
    Ready(CampaignView),
    Failed(ErrorKind),
}

/// What a list card or detail page renders for one campaign.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignView {
    /// Last confirmed record.
    pub campaign: Campaign,
    /// Derived status; never goes back to `Active` once completed.
    pub status: CampaignStatus,
    pub raised: Projected<Decimal>,
    /// Amount to print right now, following any running animation.
    pub displayed_amount: Decimal,
    pub progress_percent: u32,
    pub days_left: i64,
    pub animation: Option<AmountAnimation>,
}

/// Lifetime token of one mounted view.
///
/// A scope fetches the list at most once. Results that arrive after
/// [`ViewScope::close`] are dropped.
#[derive(Clone)]
pub struct ViewScope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    id: u64,
    open: AtomicBool,
    list_fetched: AtomicBool,
}

impl ViewScope {
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        if self.inner.open.swap(false, Ordering::SeqCst) {
            debug!("View scope {} closed", self.inner.id);
        }
    }
}

struct Entry {
    record: Campaign,
    raised: Projected<Decimal>,
    animation: Option<AmountAnimation>,
    completed: bool,
    last_push: u64,
}

impl Entry {
    fn new(record: Campaign, today: NaiveDate) -> Self {
        let completed = record.derived_status(today) == CampaignStatus::Completed;
        Self {
            raised: Projected::Confirmed(record.current_amount),
            record,
            animation: None,
            completed,
            last_push: 0,
        }
    }

    fn displayed(&self, now: DateTime<Utc>) -> Decimal {
        match &self.animation {
            Some(animation) if !animation.is_finished(now) => animation.value_at(now),
            _ => *self.raised.value(),
        }
    }

    fn status(&self, today: NaiveDate) -> CampaignStatus {
        if self.completed {
            CampaignStatus::Completed
        } else {
            self.record.derived_status(today)
        }
    }

    fn view(&self, now: DateTime<Utc>, today: NaiveDate) -> CampaignView {
        let raised = *self.raised.value();
        CampaignView {
            campaign: self.record.clone(),
            status: self.status(today),
            raised: self.raised.clone(),
            displayed_amount: self.displayed(now),
            progress_percent: progress_percent(raised, self.record.goal),
            days_left: self.record.days_left(today),
            animation: self.animation.clone().filter(|a| !a.is_finished(now)),
        }
    }

    fn celebrating(&self, now: DateTime<Utc>) -> bool {
        self.animation
            .as_ref()
            .is_some_and(|a| a.kind == AnimationKind::Celebration && !a.is_finished(now))
    }
}

enum DetailStatus {
    Loading,
    Failed(ErrorKind),
}

#[derive(Default)]
struct ReadModelState {
    load: Option<LoadState>,
    order: Vec<String>,
    entries: HashMap<String, Entry>,
    details: HashMap<String, DetailStatus>,
    push_seq: u64,
    completion_requested: HashSet<String>,
}

/// Per-process cache of campaign records that merges fetched rows, pushed
/// changes and the viewer's own optimistic increments.
pub struct CampaignReadModel {
    repository: Arc<dyn CampaignRepositoryTrait>,
    clock: Arc<dyn Clock>,
    event_sink: Arc<dyn DomainEventSink>,
    state: Mutex<ReadModelState>,
    next_scope: AtomicU64,
    settle_window: Duration,
}

impl CampaignReadModel {
    pub fn new(
        repository: Arc<dyn CampaignRepositoryTrait>,
        clock: Arc<dyn Clock>,
        event_sink: Arc<dyn DomainEventSink>,
    ) -> Self {
        Self {
            repository,
            clock,
            event_sink,
            state: Mutex::new(ReadModelState::default()),
            next_scope: AtomicU64::new(1),
            settle_window: OPTIMISTIC_SETTLE_WINDOW,
        }
    }

    pub fn with_settle_window(mut self, window: Duration) -> Self {
        self.settle_window = window;
        self
    }

    fn lock(&self) -> MutexGuard<'_, ReadModelState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Opens a scope for a newly mounted view.
    pub fn mount(&self) -> ViewScope {
        let id = self.next_scope.fetch_add(1, Ordering::SeqCst);
        ViewScope {
            inner: Arc::new(ScopeInner {
                id,
                open: AtomicBool::new(true),
                list_fetched: AtomicBool::new(false),
            }),
        }
    }

    pub fn load_state(&self) -> LoadState {
        self.lock().load.unwrap_or(LoadState::Idle)
    }

    /// Fetches the full campaign list for `scope`.
    ///
    /// Only the first call per scope reaches the repository; filtering is
    /// done with [`CampaignReadModel::list`] and never refetches.
    pub async fn load(&self, scope: &ViewScope) -> Result<()> {
        if !scope.is_open() || scope.inner.list_fetched.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let started_at_seq = {
            let mut state = self.lock();
            state.load = Some(LoadState::Loading);
            state.push_seq
        };

        let result = self.repository.list().await;

        if !scope.is_open() {
            debug!("Discarding campaign list for closed scope {}", scope.id());
            let mut state = self.lock();
            if state.load == Some(LoadState::Loading) {
                state.load = None;
            }
            return Ok(());
        }

        match result {
            Ok(campaigns) => {
                let count = campaigns.len();
                self.merge_fetched(campaigns, started_at_seq);
                debug!("Loaded {} campaigns", count);
                self.sync_completed_status().await;
                Ok(())
            }
            Err(e) => {
                let err = classify_fetch_error(e);
                warn!("Failed to load campaigns: {}", err);
                self.lock().load = Some(LoadState::Failed(err.kind()));
                // A failed fetch does not count, so the retry control works.
                scope.inner.list_fetched.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    fn merge_fetched(&self, campaigns: Vec<Campaign>, started_at_seq: u64) {
        let today = self.clock.today();
        let mut guard = self.lock();
        let state = &mut *guard;

        let fetched_ids: HashSet<&str> = campaigns.iter().map(|c| c.id.as_str()).collect();
        // Rows pushed in while the fetch was in flight stay in front.
        let mut order: Vec<String> = state
            .order
            .iter()
            .filter(|id| {
                !fetched_ids.contains(id.as_str())
                    && state
                        .entries
                        .get(id.as_str())
                        .is_some_and(|e| e.last_push > started_at_seq)
            })
            .cloned()
            .collect();

        for campaign in campaigns {
            order.push(campaign.id.clone());
            match state.entries.get_mut(&campaign.id) {
                Some(entry)
                    if entry.last_push > started_at_seq || entry.raised.is_optimistic() => {}
                Some(entry) => {
                    entry.raised = Projected::Confirmed(campaign.current_amount);
                    entry.completed |= campaign.derived_status(today) == CampaignStatus::Completed;
                    entry.record = campaign;
                }
                None => {
                    let id = campaign.id.clone();
                    state.entries.insert(id, Entry::new(campaign, today));
                }
            }
        }

        state.order = order;
        state.load = Some(LoadState::Ready);
    }

    /// Cached campaigns matching `filter`, in list order.
    pub fn list(&self, filter: &CampaignFilter) -> Vec<CampaignView> {
        let now = self.clock.now();
        let today = now.date_naive();
        let state = self.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.entries.get(id))
            .filter(|entry| filter.matches(&entry.record))
            .filter(|entry| filter.status.map_or(true, |s| entry.status(today) == s))
            .map(|entry| entry.view(now, today))
            .collect()
    }

    /// Detail state for `campaign_id` from the cache.
    pub fn get(&self, campaign_id: &str) -> DetailState {
        let now = self.clock.now();
        let state = self.lock();
        if let Some(entry) = state.entries.get(campaign_id) {
            return DetailState::Ready(entry.view(now, now.date_naive()));
        }
        match state.details.get(campaign_id) {
            Some(DetailStatus::Failed(kind)) => DetailState::Failed(*kind),
            _ => DetailState::Loading,
        }
    }

    /// Fetches a single campaign unless it is already cached.
    pub async fn load_detail(&self, scope: &ViewScope, campaign_id: &str) -> DetailState {
        let cached = self.get(campaign_id);
        if matches!(cached, DetailState::Ready(_)) || !scope.is_open() {
            return cached;
        }

        self.lock()
            .details
            .insert(campaign_id.to_string(), DetailStatus::Loading);

        let result = self.repository.get_by_id(campaign_id).await;

        {
            let mut state = self.lock();
            if !scope.is_open() {
                debug!("Discarding campaign {} for closed scope {}", campaign_id, scope.id());
                if matches!(state.details.get(campaign_id), Some(DetailStatus::Loading)) {
                    state.details.remove(campaign_id);
                }
                return DetailState::Loading;
            }

            match result {
                Ok(Some(campaign)) => {
                    state.details.remove(campaign_id);
                    if !state.entries.contains_key(campaign_id) {
                        let today = self.clock.today();
                        state
                            .entries
                            .insert(campaign_id.to_string(), Entry::new(campaign, today));
                    }
                }
                Ok(None) => {
                    state.details.insert(
                        campaign_id.to_string(),
                        DetailStatus::Failed(ErrorKind::NotFound),
                    );
                }
                Err(e) => {
                    let kind = classify_fetch_error(e).kind();
                    warn!("Failed to load campaign {}: {:?}", campaign_id, kind);
                    state
                        .details
                        .insert(campaign_id.to_string(), DetailStatus::Failed(kind));
                }
            }
        }

        self.sync_completed_status().await;
        self.get(campaign_id)
    }

    /// Most recently created completed campaigns.
    pub fn completed_showcase(&self, limit: usize) -> Vec<CampaignView> {
        let mut completed =
            self.list(&CampaignFilter::default().with_status(CampaignStatus::Completed));
        completed.sort_by(|a, b| b.campaign.created_at.cmp(&a.campaign.created_at));
        completed.truncate(limit);
        completed
    }

    /// Displayed total for `campaign_id`, ignoring animations.
    pub fn current_total(&self, campaign_id: &str) -> Option<Decimal> {
        self.lock()
            .entries
            .get(campaign_id)
            .map(|entry| *entry.raised.value())
    }

    /// Applies one pushed change. Pushes are authoritative and applied in
    /// the order they are passed in.
    pub fn on_remote_change(&self, event: &ChangeEvent) -> Result<()> {
        if event.table != Table::Campaigns {
            return Ok(());
        }
        let campaign: Campaign = event.decode()?;
        let campaign_id = campaign.id.clone();

        let now = self.clock.now();
        let today = now.date_naive();
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            state.push_seq += 1;
            let seq = state.push_seq;

            match state.entries.get_mut(&campaign_id) {
                Some(entry) => {
                    let previous_total = *entry.raised.value();
                    let previous_display = entry.displayed(now);
                    if entry.raised.is_optimistic() {
                        debug!(
                            "Push for {} replaces optimistic total {} with {}",
                            campaign_id, previous_total, campaign.current_amount
                        );
                    }
                    entry.raised = entry.raised.clone().confirm(campaign.current_amount);

                    if campaign.current_amount != previous_total && !entry.celebrating(now) {
                        entry.animation = Some(AmountAnimation::new(
                            AnimationKind::RemoteUpdate,
                            previous_display,
                            campaign.current_amount,
                            now,
                            REMOTE_UPDATE_ANIMATION,
                        ));
                    }
                    entry.completed |= campaign.derived_status(today) == CampaignStatus::Completed;
                    entry.record = campaign;
                    entry.last_push = seq;
                }
                None => {
                    let mut entry = Entry::new(campaign, today);
                    entry.last_push = seq;
                    state.entries.insert(campaign_id.clone(), entry);
                    state.order.insert(0, campaign_id.clone());
                }
            }
            state.details.remove(&campaign_id);
        }

        self.event_sink
            .emit(DomainEvent::campaigns_changed(vec![campaign_id]));
        Ok(())
    }

    /// Subscribes to campaign inserts and updates. A single pump task
    /// applies them in arrival order until the returned handle is detached
    /// or dropped.
    pub fn attach(self: &Arc<Self>, feed: &dyn ChangeFeedTrait) -> LiveSync {
        let (tx, mut rx) = mpsc::unbounded_channel::<ChangeEvent>();
        let callback: ChangeCallback = Arc::new(move |event: ChangeEvent| {
            // The receiver is gone once the pump stops.
            let _ = tx.send(event);
        });

        let subscriptions = vec![
            feed.subscribe(Table::Campaigns, ChangeEventType::Insert, callback.clone()),
            feed.subscribe(Table::Campaigns, ChangeEventType::Update, callback),
        ];

        let model = Arc::clone(self);
        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = model.on_remote_change(&event) {
                    warn!("Ignoring campaign push: {}", e);
                    continue;
                }
                model.sync_completed_status().await;
            }
        });

        info!("Live campaign sync attached");
        LiveSync {
            subscriptions,
            pump: Some(pump),
        }
    }

    /// Records the viewer's own donation as a display-only increment and
    /// starts the celebration from `observed` to the new total.
    ///
    /// `observed` is the total read before the donation was written. If it
    /// no longer matches, a push already carried the authoritative total and
    /// no guess is layered on top. Returns `None` for uncached campaigns.
    pub fn apply_optimistic(
        &self,
        campaign_id: &str,
        observed: Decimal,
        amount: Decimal,
        celebration: Duration,
    ) -> Option<(Projected<Decimal>, AmountAnimation)> {
        let now = self.clock.now();
        let mut state = self.lock();
        let entry = state.entries.get_mut(campaign_id)?;

        if *entry.raised.value() == observed {
            entry.raised = entry.raised.increment(amount, now);
        } else {
            debug!(
                "Total for {} moved from {} to {} during submission, keeping pushed value",
                campaign_id,
                observed,
                entry.raised.value()
            );
        }

        let animation = AmountAnimation::new(
            AnimationKind::Celebration,
            observed,
            *entry.raised.value(),
            now,
            celebration,
        );
        entry.animation = Some(animation.clone());
        Some((entry.raised.clone(), animation))
    }

    /// Accepts optimistic totals that waited longer than the settle window
    /// for a push. Returns the settled campaign ids.
    pub fn settle_stale(&self, now: DateTime<Utc>) -> Vec<String> {
        let window = to_chrono(self.settle_window);
        let mut state = self.lock();
        let mut settled = Vec::new();
        for (id, entry) in state.entries.iter_mut() {
            let stale = entry
                .raised
                .optimistic_since()
                .is_some_and(|since| since + window <= now);
            if stale {
                entry.raised = entry.raised.clone().settle();
                settled.push(id.clone());
            }
        }
        if !settled.is_empty() {
            info!("Accepted {} optimistic totals without a push", settled.len());
        }
        settled
    }

    /// Writes the `completed` status for campaigns that crossed their goal
    /// or deadline while stored as active. Each id is written at most once
    /// unless the write fails.
    pub async fn sync_completed_status(&self) -> usize {
        let today = self.clock.today();
        let pending: Vec<String> = {
            let mut state = self.lock();
            let candidates: Vec<String> = state
                .entries
                .iter()
                .filter(|(id, entry)| {
                    entry.record.status == CampaignStatus::Active
                        && entry.status(today) == CampaignStatus::Completed
                        && !state.completion_requested.contains(id.as_str())
                })
                .map(|(id, _)| id.clone())
                .collect();
            for id in &candidates {
                state.completion_requested.insert(id.clone());
            }
            candidates
        };

        let mut written = 0;
        for campaign_id in pending {
            match self.repository.mark_completed(&campaign_id).await {
                Ok(_) => {
                    if let Some(entry) = self.lock().entries.get_mut(&campaign_id) {
                        entry.record.status = CampaignStatus::Completed;
                        entry.completed = true;
                    }
                    info!("Campaign {} marked completed", campaign_id);
                    self.event_sink
                        .emit(DomainEvent::campaign_completed(campaign_id));
                    written += 1;
                }
                Err(e) => {
                    warn!("Failed to mark campaign {} completed: {}", campaign_id, e);
                    self.lock().completion_requested.remove(&campaign_id);
                }
            }
        }
        written
    }
}

fn classify_fetch_error(err: GatewayError) -> Error {
    match err {
        GatewayError::NotFound(what) => Error::NotFound(what),
        other => Error::TransientFailure(other.to_string()),
    }
}

/// Handle for an attached live sync. Dropping it unsubscribes and stops the
/// pump.
pub struct LiveSync {
    subscriptions: Vec<Subscription>,
    pump: Option<JoinHandle<()>>,
}

impl LiveSync {
    pub fn is_attached(&self) -> bool {
        self.pump.is_some() && self.subscriptions.iter().all(Subscription::is_active)
    }

    pub fn detach(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
            debug!("Live campaign sync detached");
        }
    }
}

impl Drop for LiveSync {
    fn drop(&mut self) {
        self.stop();
    }
}
