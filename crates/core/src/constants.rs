use std::time::Duration;

/// Storage key under which the signed-in identity is persisted.
pub const SESSION_STORAGE_KEY: &str = "user";

/// Upper bound for resolving a persisted session at startup.
pub const SESSION_RESTORE_TIMEOUT: Duration = Duration::from_secs(3);

/// Length of the celebration shown after a confirmed donation submission.
pub const DONATION_CELEBRATION: Duration = Duration::from_secs(2);

/// Length of the highlight shown when a push changes a campaign total.
pub const REMOTE_UPDATE_ANIMATION: Duration = Duration::from_secs(2);

/// How long an optimistic total waits for a corrective push before it is
/// accepted as-is.
pub const OPTIMISTIC_SETTLE_WINDOW: Duration = Duration::from_secs(10);

/// Number of completed campaigns shown in the success-stories section.
pub const COMPLETED_SHOWCASE_LIMIT: usize = 3;

/// Route that hosts the sign-in / sign-up forms.
pub const AUTH_ROUTE: &str = "/login";

/// Query parameter carrying the encoded return destination.
pub const RETURN_PARAM: &str = "redirect";

/// Campaign title used for donations that target no specific campaign.
pub const GENERAL_DONATION_TITLE: &str = "General Donation";

/// Display name used for anonymous donors.
pub const ANONYMOUS_DONOR: &str = "Anonymous";
