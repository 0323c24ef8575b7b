//! Campaigns module - models, the read model that reconciles pushes with
//! optimistic totals, and campaign creation.

mod campaigns_model;
mod campaigns_read_model;
mod campaigns_service;
mod campaigns_traits;
mod projection;

#[cfg(test)]
mod campaigns_model_tests;

pub use campaigns_model::{
    progress_percent, Campaign, CampaignCategory, CampaignFilter, CampaignInsert,
    CampaignStatus, NewCampaign,
};
pub use campaigns_read_model::{
    CampaignReadModel, CampaignView, DetailState, LiveSync, LoadState, ViewScope,
};
pub use campaigns_service::CampaignService;
pub use campaigns_traits::{CampaignRepositoryTrait, CampaignServiceTrait};
pub use projection::{AmountAnimation, AnimationKind, Projected};
