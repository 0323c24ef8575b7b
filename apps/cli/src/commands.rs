//! Command execution.

use std::time::Duration;

use anyhow::{bail, Context};
use hopefund_core::access::AccessGuard;
use hopefund_core::campaigns::{
    CampaignFilter, CampaignServiceTrait, CampaignStatus, CampaignView, DetailState, NewCampaign,
};
use hopefund_core::constants::COMPLETED_SHOWCASE_LIMIT;
use hopefund_core::donations::{DonationError, DonationForm, DonationServiceTrait};
use hopefund_core::profile::ProfileServiceTrait;
use hopefund_core::session::{Credentials, SignUpProfile};
use rust_decimal::Decimal;

use crate::backend::Backend;
use crate::output::OutputFormat;
use crate::{Commands, CreateCampaignArgs, DonateArgs};

const WATCH_TICK: Duration = Duration::from_millis(250);
const SIMULATED_GIFT_EVERY: Duration = Duration::from_secs(3);

pub async fn execute(
    command: Commands,
    backend: &Backend,
    out: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        Commands::Login { email, password } => {
            let identity = backend
                .session
                .sign_in(Credentials::new(email, password))
                .await?;
            out.print(&identity, |i| format!("Signed in as {} <{}>", i.name, i.email))
        }
        Commands::Signup {
            name,
            email,
            password,
            role,
        } => {
            let identity = backend
                .session
                .sign_up(SignUpProfile { name, email, role }, &password)
                .await?;
            out.print(&identity, |i| {
                format!("Welcome, {}! Signed in as {}", i.name, i.role.as_str())
            })
        }
        Commands::Logout => {
            backend.session.sign_out().await;
            out.print(&backend.session.snapshot(), |_| "Signed out".to_string())
        }
        Commands::Whoami => out.print(&backend.session.snapshot(), |s| match &s.identity {
            Some(i) => format!("{} <{}> ({})", i.name, i.email, i.role.as_str()),
            None => "Not signed in".to_string(),
        }),
        Commands::Campaigns {
            category,
            query,
            status,
        } => {
            let mut filter = CampaignFilter::default();
            if let Some(category) = category {
                filter = filter.with_category(category);
            }
            if let Some(query) = query {
                filter = filter.with_query(query);
            }
            if let Some(status) = status {
                filter = filter.with_status(status.into());
            }
            load_campaigns(backend).await?;
            let views = backend.read_model.list(&filter);
            out.print(&views, |views| render_list(views, "No campaigns match"))
        }
        Commands::Campaign { id } => {
            let scope = backend.read_model.mount();
            let detail = backend.read_model.load_detail(&scope, &id).await;
            scope.close();
            match detail {
                DetailState::Ready(view) => out.print(&view, render_detail),
                DetailState::Failed(kind) => bail!("Could not load campaign {}: {:?}", id, kind),
                DetailState::Loading => bail!("Campaign {} is still loading", id),
            }
        }
        Commands::Showcase => {
            load_campaigns(backend).await?;
            let views = backend.read_model.completed_showcase(COMPLETED_SHOWCASE_LIMIT);
            out.print(&views, |views| render_list(views, "No completed campaigns yet"))
        }
        Commands::Watch {
            id,
            seconds,
            simulate,
        } => watch(backend, &id, seconds, simulate, out).await,
        Commands::Donate(args) => donate(backend, args, out).await,
        Commands::CreateCampaign(args) => create_campaign(backend, args, out).await,
        Commands::Dashboard => {
            let stats = backend.profile.dashboard().await?;
            out.print(&stats, |s| {
                format!(
                    "Campaigns: {} ({} active)\nDonations: {} totalling ${}",
                    s.total_campaigns, s.active_campaigns, s.total_donations, s.total_amount_donated
                )
            })
        }
        Commands::History => {
            let history = backend.profile.donation_history().await?;
            out.print(&history, |rows| {
                if rows.is_empty() {
                    return "No donations yet".to_string();
                }
                rows.iter()
                    .map(|row| {
                        let date = row
                            .created_at
                            .map(|at| at.format("%Y-%m-%d").to_string())
                            .unwrap_or_else(|| "-".to_string());
                        format!("{}  ${:>10}  {}", date, row.amount, row.campaign_title)
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Commands::Route { path } => {
            let decision = AccessGuard::evaluate(&backend.session.state(), &path);
            out.print(&decision, |d| format!("{:?}", d))
        }
    }
}

/// Loads the list once and writes any newly derived completions back.
async fn load_campaigns(backend: &Backend) -> anyhow::Result<()> {
    let scope = backend.read_model.mount();
    let loaded = backend.read_model.load(&scope).await;
    scope.close();
    loaded.context("Could not load campaigns")?;

    let written = backend.read_model.sync_completed_status().await;
    if written > 0 {
        tracing::info!("Marked {} campaign(s) completed", written);
    }
    Ok(())
}

fn render_list(views: &[CampaignView], empty: &str) -> String {
    if views.is_empty() {
        return empty.to_string();
    }
    views
        .iter()
        .map(|v| {
            format!(
                "{:<14} {:<40} ${:>10} / ${:<10} {:>3}%  {}",
                v.campaign.id,
                v.campaign.title,
                v.displayed_amount,
                v.campaign.goal,
                v.progress_percent,
                v.status.as_str()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_detail(view: &CampaignView) -> String {
    let mut lines = vec![
        format!("{} [{}]", view.campaign.title, view.campaign.category),
        view.campaign.description.clone(),
        format!(
            "Raised ${} of ${} ({}%)",
            view.displayed_amount, view.campaign.goal, view.progress_percent
        ),
    ];
    lines.push(match view.status {
        CampaignStatus::Completed => "Status: completed".to_string(),
        CampaignStatus::Active => format!("Status: active, {} day(s) left", view.days_left.max(0)),
    });
    lines.join("\n")
}

async fn donate(backend: &Backend, args: DonateArgs, out: OutputFormat) -> anyhow::Result<()> {
    if args.campaign.is_some() {
        // The projection needs the campaign in the read model.
        load_campaigns(backend).await?;
    }

    let form = DonationForm {
        amount: args.amount,
        first_name: args.first_name,
        last_name: args.last_name,
        email: args.email,
        phone: args.phone,
        comments: args.comments,
        anonymous: args.anonymous,
        campaign_id: args.campaign,
    };

    match backend.donations.submit(form).await {
        Ok(receipt) => out.print(&receipt, |r| {
            let mut text = format!(
                "Thank you! Donation {} of ${} recorded.",
                r.donation.id, r.donation.amount
            );
            if let Some(projection) = &r.projection {
                text.push_str(&format!("\nCampaign total is now ${}", projection.value()));
            }
            text
        }),
        Err(DonationError::Invalid(fields)) => {
            for field in &fields {
                eprintln!("  {}: {}", field.field, field.message);
            }
            bail!("Please correct the fields above")
        }
        Err(DonationError::AuthRequired { redirect_to }) => {
            bail!("Sign in first (hopefund login), then retry. Return path: {}", redirect_to)
        }
        Err(err) => Err(err.into()),
    }
}

async fn create_campaign(
    backend: &Backend,
    args: CreateCampaignArgs,
    out: OutputFormat,
) -> anyhow::Result<()> {
    let created = backend
        .campaigns
        .create_campaign(NewCampaign {
            title: args.title,
            description: args.description,
            category: args.category,
            goal: args.goal,
            deadline: args.deadline,
            image_url: args.image_url,
        })
        .await?;
    out.print(&created, |c| format!("Campaign {} created: {}", c.id, c.title))
}

async fn watch(
    backend: &Backend,
    id: &str,
    seconds: Option<u64>,
    simulate: bool,
    out: OutputFormat,
) -> anyhow::Result<()> {
    let scope = backend.read_model.mount();
    if let DetailState::Failed(kind) = backend.read_model.load_detail(&scope, id).await {
        bail!("Could not load campaign {}: {:?}", id, kind);
    }

    let feed = backend.change_feed()?;
    let live = backend.read_model.attach(feed.as_ref());

    let simulator = match (simulate, backend.offline_gateway()) {
        (true, Some(gateway)) => {
            let gateway = gateway.clone();
            let campaign_id = id.to_string();
            Some(tokio::spawn(async move {
                let mut every = tokio::time::interval(SIMULATED_GIFT_EVERY);
                every.tick().await;
                loop {
                    every.tick().await;
                    if let Err(e) = gateway.simulate_donation(&campaign_id, Decimal::new(25, 0)) {
                        tracing::warn!("Simulated donation failed: {}", e);
                        break;
                    }
                }
            }))
        }
        (true, None) => bail!("--simulate is only available with --offline"),
        _ => None,
    };

    let stop_at = seconds.map(|s| tokio::time::Instant::now() + Duration::from_secs(s));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(WATCH_TICK);
    let mut last_shown: Option<Decimal> = None;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = ticker.tick() => {
                backend.read_model.settle_stale(backend.clock.now());
                if let DetailState::Ready(view) = backend.read_model.get(id) {
                    if last_shown != Some(view.displayed_amount) {
                        last_shown = Some(view.displayed_amount);
                        out.print(&view, |v| {
                            format!(
                                "{}  ${} / ${} ({}%)",
                                v.campaign.title,
                                v.displayed_amount,
                                v.campaign.goal,
                                v.progress_percent
                            )
                        })?;
                    }
                }
                if stop_at.is_some_and(|at| tokio::time::Instant::now() >= at) {
                    break;
                }
            }
        }
    }

    if let Some(simulator) = simulator {
        simulator.abort();
    }
    live.detach();
    scope.close();
    Ok(())
}
