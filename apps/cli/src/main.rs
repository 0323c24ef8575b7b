//! HopeFund CLI - browse campaigns, donate and manage a session from the
//! terminal, against Supabase or the built-in offline backend.

mod backend;
mod commands;
mod config;
mod output;

use clap::{Args, Parser, Subcommand, ValueEnum};
use chrono::NaiveDate;
use hopefund_core::campaigns::{CampaignCategory, CampaignStatus};
use hopefund_core::session::UserRole;
use rust_decimal::Decimal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use backend::Backend;
use config::{Config, LogFormat};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "hopefund")]
#[command(about = "HopeFund donation platform client", long_about = None)]
#[command(version)]
struct Cli {
    /// Use the seeded in-memory backend instead of Supabase
    #[arg(long, global = true)]
    offline: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    output: OutputFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "HOPEFUND_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and sign in
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "HOPEFUND_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "donor")]
        role: UserRole,
    },

    /// Forget the stored session
    Logout,

    /// Show the current session
    Whoami,

    /// List campaigns
    Campaigns {
        #[arg(long)]
        category: Option<CampaignCategory>,
        /// Case-insensitive match on title or description
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        status: Option<StatusArg>,
    },

    /// Show one campaign
    Campaign { id: String },

    /// Recently completed campaigns
    Showcase,

    /// Follow a campaign's raised amount live
    Watch {
        id: String,
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
        /// Offline only: inject a donation from another donor every few seconds
        #[arg(long)]
        simulate: bool,
    },

    /// Make a donation
    Donate(DonateArgs),

    /// Start a campaign
    CreateCampaign(CreateCampaignArgs),

    /// Totals for the signed-in account
    Dashboard,

    /// Donations made by the signed-in account
    History,

    /// Check whether a route renders for the current session
    Route { path: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StatusArg {
    Active,
    Completed,
}

impl From<StatusArg> for CampaignStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Active => CampaignStatus::Active,
            StatusArg::Completed => CampaignStatus::Completed,
        }
    }
}

#[derive(Args)]
struct DonateArgs {
    /// Amount, e.g. 50 or "$1,000.50"
    #[arg(long)]
    amount: String,
    /// Target campaign; omit for a general donation
    #[arg(long)]
    campaign: Option<String>,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    comments: Option<String>,
    #[arg(long)]
    anonymous: bool,
}

#[derive(Args)]
struct CreateCampaignArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    description: String,
    #[arg(long, default_value = "other")]
    category: CampaignCategory,
    #[arg(long)]
    goal: Decimal,
    /// YYYY-MM-DD
    #[arg(long)]
    deadline: NaiveDate,
    #[arg(long)]
    image_url: Option<String>,
}

fn init_tracing(format: LogFormat, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false).with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();
    init_tracing(config.log_format, cli.verbose);

    let backend = Backend::connect(&config, cli.offline).await?;
    commands::execute(cli.command, &backend, cli.output).await
}
