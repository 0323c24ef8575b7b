use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::access::return_destination;
use crate::campaigns::{
    Campaign, CampaignCategory, CampaignReadModel, CampaignStatus, DetailState, Projected,
};
use crate::constants::ANONYMOUS_DONOR;
use crate::donations::{DonationError, DonationForm, DonationService, DonationServiceTrait};
use crate::errors::{ErrorKind, GatewayError};
use crate::events::{DomainEvent, MockDomainEventSink};
use crate::gateway::{GatewayOp, InMemoryGateway};
use crate::session::{Credentials, InMemorySessionStorage, SessionStore};
use crate::utils::{Clock, ManualClock};

struct Fixture {
    gateway: Arc<InMemoryGateway>,
    session: Arc<SessionStore>,
    read_model: Arc<CampaignReadModel>,
    sink: MockDomainEventSink,
    service: DonationService,
}

async fn fixture(raised: Decimal) -> Fixture {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
    ));
    let gateway = Arc::new(InMemoryGateway::seeded(clock.clone()));
    gateway.add_campaign(Campaign {
        id: "c1".to_string(),
        title: "School meals".to_string(),
        description: "Hot lunches for a whole term".to_string(),
        category: CampaignCategory::Education,
        goal: dec!(10000),
        current_amount: raised,
        deadline: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
        user_id: "user-organizer".to_string(),
        status: CampaignStatus::Active,
        image_url: None,
        created_at: Some(clock.now()),
    });

    let sink = MockDomainEventSink::new();
    let session = Arc::new(SessionStore::new(
        gateway.clone(),
        Arc::new(InMemorySessionStorage::new()),
        Arc::new(sink.clone()),
    ));
    session.restore().await;

    let read_model = Arc::new(CampaignReadModel::new(
        gateway.clone(),
        clock,
        Arc::new(sink.clone()),
    ));
    let scope = read_model.mount();
    read_model.load(&scope).await.unwrap();

    let service = DonationService::new(
        gateway.clone(),
        session.clone(),
        read_model.clone(),
        Arc::new(sink.clone()),
    );
    Fixture {
        gateway,
        session,
        read_model,
        sink,
        service,
    }
}

async fn sign_in(f: &Fixture) {
    f.session
        .sign_in(Credentials::new("john@example.com", "password123"))
        .await
        .unwrap();
}

fn form(amount: &str) -> DonationForm {
    DonationForm {
        amount: amount.to_string(),
        first_name: "John".to_string(),
        last_name: "Doe".to_string(),
        email: "john@example.com".to_string(),
        phone: None,
        comments: Some("  Keep it up! ".to_string()),
        anonymous: false,
        campaign_id: Some("c1".to_string()),
    }
}

async fn drain_pump() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_invalid_form_fails_before_anything_else() {
    let f = fixture(dec!(200)).await;
    let bad = DonationForm {
        amount: "-5".to_string(),
        first_name: "J".to_string(),
        email: "nope".to_string(),
        ..form("0")
    };

    let err = f.service.submit(bad).await.unwrap_err();
    match &err {
        DonationError::Invalid(fields) => {
            let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
            assert_eq!(names, vec!["amount", "firstName", "email"]);
        }
        other => panic!("Expected field errors, got {:?}", other),
    }
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(f.gateway.calls(GatewayOp::RecordDonation), 0);
}

#[tokio::test]
async fn test_signed_out_donor_is_sent_to_sign_in_with_target_kept() {
    let f = fixture(dec!(200)).await;

    let err = f.service.submit(form("50")).await.unwrap_err();

    match err {
        DonationError::AuthRequired { redirect_to } => {
            assert_eq!(redirect_to, "/login?redirect=%2Fdonate%3Fcampaign%3Dc1");
            assert_eq!(return_destination(&redirect_to), "/donate?campaign=c1");
        }
        other => panic!("Expected auth redirect, got {:?}", other),
    }
    assert_eq!(f.gateway.calls(GatewayOp::RecordDonation), 0);
    assert_eq!(f.read_model.current_total("c1"), Some(dec!(200)));
}

#[tokio::test]
async fn test_projection_is_r_plus_a_until_push_confirms() {
    let f = fixture(dec!(200)).await;
    sign_in(&f).await;
    let _live = f.read_model.attach(f.gateway.as_ref());
    f.gateway.hold_pushes(true);

    let receipt = f.service.submit(form("50")).await.unwrap();

    let projection = receipt.projection.unwrap();
    assert!(projection.is_optimistic());
    assert_eq!(*projection.value(), dec!(250));
    let animation = receipt.animation.unwrap();
    assert_eq!((animation.from, animation.to), (dec!(200), dec!(250)));
    assert_eq!(animation.duration, Duration::from_secs(2));

    f.gateway.flush_pushes();
    drain_pump().await;
    assert_eq!(f.read_model.current_total("c1"), Some(dec!(250)));
    match f.read_model.get("c1") {
        DetailState::Ready(view) => {
            assert_eq!(view.raised, Projected::Confirmed(dec!(250)));
        }
        other => panic!("Expected ready detail, got {:?}", other),
    }
}

#[tokio::test]
async fn test_projection_converges_to_server_total() {
    let f = fixture(dec!(200)).await;
    sign_in(&f).await;
    let _live = f.read_model.attach(f.gateway.as_ref());
    f.gateway.hold_pushes(true);

    // Another donor's gift reaches the server first.
    f.gateway.simulate_donation("c1", dec!(30)).unwrap();
    let receipt = f.service.submit(form("50")).await.unwrap();
    assert_eq!(*receipt.projection.unwrap().value(), dec!(250));

    f.gateway.flush_pushes();
    drain_pump().await;
    assert_eq!(f.read_model.current_total("c1"), Some(dec!(280)));
}

#[tokio::test]
async fn test_failed_submission_keeps_form_and_total() {
    let f = fixture(dec!(200)).await;
    sign_in(&f).await;
    f.gateway.fail_next(
        GatewayOp::RecordDonation,
        GatewayError::Unavailable("connection reset".into()),
    );

    let submitted = form("75");
    let err = f.service.submit(submitted.clone()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SubmissionFailed);
    assert!(err.kind().is_retryable());
    assert_eq!(err.form(), Some(&submitted));
    assert!(!err.to_string().contains("connection reset"));
    assert_eq!(f.read_model.current_total("c1"), Some(dec!(200)));
    assert!(f.gateway.donations().is_empty());
}

#[tokio::test]
async fn test_anonymous_donation_keeps_donor_reference() {
    let f = fixture(dec!(200)).await;
    sign_in(&f).await;

    let receipt = f
        .service
        .submit(DonationForm {
            anonymous: true,
            ..form("20")
        })
        .await
        .unwrap();

    let stored = &f.gateway.donations()[0];
    assert_eq!(stored.user_id.as_deref(), Some("user-donor"));
    assert_eq!(stored.donor_name, None);
    assert_eq!(stored.donor_display(), ANONYMOUS_DONOR);
    assert_eq!(stored.message.as_deref(), Some("Keep it up!"));
    assert!(receipt.donation.is_anonymous);
}

#[tokio::test]
async fn test_named_donation_displays_donor() {
    let f = fixture(dec!(200)).await;
    sign_in(&f).await;

    let receipt = f.service.submit(form("$1,000.50")).await.unwrap();
    assert_eq!(receipt.donation.amount, dec!(1000.50));
    assert_eq!(receipt.donation.donor_display(), "John Doe");
}

#[tokio::test]
async fn test_general_donation_has_no_projection() {
    let f = fixture(dec!(200)).await;
    sign_in(&f).await;
    f.sink.clear();

    let receipt = f
        .service
        .submit(DonationForm {
            campaign_id: None,
            ..form("15")
        })
        .await
        .unwrap();

    assert!(receipt.projection.is_none());
    assert!(receipt.animation.is_none());
    assert_eq!(
        f.sink.events(),
        vec![DomainEvent::donation_recorded(
            receipt.donation.id.clone(),
            None,
            dec!(15)
        )]
    );
}

#[tokio::test]
async fn test_each_submission_creates_one_record() {
    let f = fixture(dec!(200)).await;
    sign_in(&f).await;

    f.service.submit(form("10")).await.unwrap();
    f.service.submit(form("10")).await.unwrap();

    assert_eq!(f.gateway.donations().len(), 2);
    assert_eq!(f.gateway.campaign("c1").unwrap().current_amount, dec!(220));
}
