use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::constants::SESSION_STORAGE_KEY;
use crate::errors::{Error, ErrorKind, GatewayError, GatewayResult, Result};
use crate::events::{DomainEvent, MockDomainEventSink};
use crate::session::{
    AuthGatewayTrait, Credentials, Identity, IdentityUpdate, InMemorySessionStorage,
    SessionState, SessionStorageTrait, SessionStore, SignUpProfile, UserRole,
};

// --- Mock AuthGateway ---
struct MockAuthGateway {
    users: Mutex<Vec<(Identity, String)>>,
    calls: AtomicUsize,
}

impl MockAuthGateway {
    fn new() -> Self {
        Self {
            users: Mutex::new(vec![
                (
                    identity("1", "John Doe", "john@example.com", UserRole::Donor),
                    "password123".to_string(),
                ),
                (
                    identity("2", "Jane Smith", "jane@example.com", UserRole::Organizer),
                    "password123".to_string(),
                ),
            ]),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthGatewayTrait for MockAuthGateway {
    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<Identity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|(user, pw)| user.email == email && pw == password)
            .map(|(user, _)| user.clone())
            .ok_or_else(|| GatewayError::AuthRejected("Invalid login credentials".to_string()))
    }

    async fn sign_up(&self, profile: &SignUpProfile, password: &str) -> GatewayResult<Identity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|(user, _)| user.email == profile.email) {
            return Err(GatewayError::Conflict("User already registered".to_string()));
        }
        let created = identity(
            &(users.len() + 1).to_string(),
            &profile.name,
            &profile.email,
            profile.role,
        );
        users.push((created.clone(), password.to_string()));
        Ok(created)
    }
}

// --- Storage that never answers ---
struct HangingStorage;

#[async_trait]
impl SessionStorageTrait for HangingStorage {
    async fn load(&self, _key: &str) -> Result<Option<String>> {
        futures::future::pending().await
    }

    async fn save(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    async fn clear(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

// --- Storage that answers after a delay ---
struct SlowStorage {
    inner: InMemorySessionStorage,
    delay: Duration,
}

#[async_trait]
impl SessionStorageTrait for SlowStorage {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        tokio::time::sleep(self.delay).await;
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.inner.save(key, value).await
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.inner.clear(key).await
    }
}

// --- Storage whose saves can be held open ---
struct GatedSaveStorage {
    inner: InMemorySessionStorage,
    gated: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedSaveStorage {
    fn new() -> Self {
        Self {
            inner: InMemorySessionStorage::new(),
            gated: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl SessionStorageTrait for GatedSaveStorage {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        if self.gated.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.save(key, value).await
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.inner.clear(key).await
    }
}

fn identity(id: &str, name: &str, email: &str, role: UserRole) -> Identity {
    Identity {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role,
        avatar: None,
    }
}

fn store_with(
    storage: Arc<dyn SessionStorageTrait>,
) -> (SessionStore, Arc<MockAuthGateway>, MockDomainEventSink) {
    let auth = Arc::new(MockAuthGateway::new());
    let sink = MockDomainEventSink::new();
    let store = SessionStore::new(auth.clone(), storage, Arc::new(sink.clone()));
    (store, auth, sink)
}

#[tokio::test]
async fn test_sign_in_authenticates_and_persists_without_password() {
    let storage = Arc::new(InMemorySessionStorage::new());
    let (store, _, sink) = store_with(storage.clone());
    store.restore().await;

    let identity = store
        .sign_in(Credentials::new("john@example.com", "password123"))
        .await
        .unwrap();

    let snapshot = store.snapshot();
    assert!(snapshot.is_authenticated);
    assert_eq!(snapshot.identity.unwrap().id, identity.id);
    assert_eq!(identity.id, "1");

    let persisted = storage.raw(SESSION_STORAGE_KEY).unwrap();
    assert!(persisted.contains("john@example.com"));
    assert!(!persisted.contains("password123"));
    assert!(!persisted.to_lowercase().contains("password"));

    assert_eq!(
        sink.events(),
        vec![DomainEvent::session_changed(Some("1".to_string()))]
    );
}

#[tokio::test]
async fn test_invalid_credentials_leave_prior_session_untouched() {
    let storage = Arc::new(InMemorySessionStorage::new());
    let (store, _, _) = store_with(storage.clone());
    store.restore().await;
    store
        .sign_in(Credentials::new("john@example.com", "password123"))
        .await
        .unwrap();
    let persisted_before = storage.raw(SESSION_STORAGE_KEY);

    let err = store
        .sign_in(Credentials::new("jane@example.com", "wrong"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidCredentials));
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    assert_eq!(store.current_identity().unwrap().id, "1");
    assert_eq!(storage.raw(SESSION_STORAGE_KEY), persisted_before);
}

#[tokio::test]
async fn test_invalid_credentials_when_signed_out_stay_signed_out() {
    let (store, _, _) = store_with(Arc::new(InMemorySessionStorage::new()));
    store.restore().await;

    let err = store
        .sign_in(Credentials::new("nobody@example.com", "password123"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidCredentials));
    assert_eq!(store.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_blank_credentials_rejected_without_gateway_call() {
    let (store, auth, _) = store_with(Arc::new(InMemorySessionStorage::new()));
    let err = store.sign_in(Credentials::new("  ", "")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidCredentials));
    assert_eq!(auth.calls(), 0);
}

#[tokio::test]
async fn test_sign_out_twice_is_safe() {
    let storage = Arc::new(InMemorySessionStorage::new());
    let (store, _, sink) = store_with(storage.clone());
    store.restore().await;
    store
        .sign_in(Credentials::new("john@example.com", "password123"))
        .await
        .unwrap();

    store.sign_out().await;
    assert_eq!(store.state(), SessionState::Unauthenticated);
    assert!(storage.raw(SESSION_STORAGE_KEY).is_none());

    store.sign_out().await;
    assert_eq!(store.state(), SessionState::Unauthenticated);
    assert!(!store.snapshot().is_authenticated);

    let sign_outs = sink
        .events()
        .into_iter()
        .filter(|e| *e == DomainEvent::session_changed(None))
        .count();
    assert_eq!(sign_outs, 1);
}

#[tokio::test]
async fn test_restore_reads_persisted_identity() {
    let persisted = serde_json::to_string(&identity(
        "2",
        "Jane Smith",
        "jane@example.com",
        UserRole::Organizer,
    ))
    .unwrap();
    let storage = Arc::new(InMemorySessionStorage::with_entry(
        SESSION_STORAGE_KEY,
        &persisted,
    ));
    let (store, auth, _) = store_with(storage);

    assert_eq!(store.state(), SessionState::Uninitialized);
    let snapshot = store.restore().await;

    assert!(snapshot.is_authenticated);
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.identity.unwrap().role, UserRole::Organizer);
    assert_eq!(auth.calls(), 0);

    // Second call is a no-op.
    assert!(store.restore().await.is_authenticated);
}

#[tokio::test]
async fn test_restore_with_corrupt_record_fails_open() {
    let storage = Arc::new(InMemorySessionStorage::with_entry(
        SESSION_STORAGE_KEY,
        "{not json",
    ));
    let (store, _, _) = store_with(storage);

    let snapshot = store.restore().await;
    assert!(!snapshot.is_authenticated);
    assert!(!snapshot.is_loading);
    assert_eq!(store.state(), SessionState::Unauthenticated);
}

#[tokio::test(start_paused = true)]
async fn test_restore_never_blocks_past_timeout() {
    let (store, _, _) = store_with(Arc::new(HangingStorage));
    let store = store.with_restore_timeout(Duration::from_millis(500));

    let snapshot = store.restore().await;
    assert_eq!(store.state(), SessionState::Unauthenticated);
    assert!(!snapshot.is_loading);
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_during_restore_wins() {
    let persisted = serde_json::to_string(&identity(
        "2",
        "Jane Smith",
        "jane@example.com",
        UserRole::Organizer,
    ))
    .unwrap();
    let storage = Arc::new(SlowStorage {
        inner: InMemorySessionStorage::with_entry(SESSION_STORAGE_KEY, &persisted),
        delay: Duration::from_secs(1),
    });
    let (store, _, _) = store_with(storage);
    let store = Arc::new(store);

    let restoring = {
        let store = store.clone();
        tokio::spawn(async move { store.restore().await })
    };
    tokio::task::yield_now().await;
    assert!(store.snapshot().is_loading);

    store
        .sign_in(Credentials::new("john@example.com", "password123"))
        .await
        .unwrap();

    restoring.await.unwrap();
    assert_eq!(store.current_identity().unwrap().id, "1");
}

#[tokio::test]
async fn test_sign_up_creates_and_signs_in() {
    let (store, _, _) = store_with(Arc::new(InMemorySessionStorage::new()));
    store.restore().await;

    let identity = store
        .sign_up(
            SignUpProfile {
                name: " Sam Volunteer ".to_string(),
                email: "sam@example.com".to_string(),
                role: UserRole::Volunteer,
            },
            "longenough",
        )
        .await
        .unwrap();

    assert_eq!(identity.name, "Sam Volunteer");
    assert_eq!(store.current_identity().unwrap().role, UserRole::Volunteer);
}

#[tokio::test]
async fn test_sign_up_duplicate_email() {
    let (store, _, _) = store_with(Arc::new(InMemorySessionStorage::new()));
    store.restore().await;

    let err = store
        .sign_up(
            SignUpProfile {
                name: "John Again".to_string(),
                email: "john@example.com".to_string(),
                role: UserRole::Donor,
            },
            "password123",
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DuplicateIdentity);
    assert_eq!(store.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_sign_up_validation_fails_fast() {
    let (store, auth, _) = store_with(Arc::new(InMemorySessionStorage::new()));

    let err = store
        .sign_up(
            SignUpProfile {
                name: "J".to_string(),
                email: "not-an-email".to_string(),
                role: UserRole::Donor,
            },
            "short",
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    match err {
        Error::Validation(validation) => {
            let fields: Vec<&str> = validation
                .field_errors()
                .iter()
                .map(|f| f.field.as_str())
                .collect();
            assert_eq!(fields, vec!["name", "email", "password"]);
        }
        other => panic!("Expected validation error, got {:?}", other),
    }
    assert_eq!(auth.calls(), 0);
}

#[tokio::test]
async fn test_update_profile_requires_session() {
    let (store, _, _) = store_with(Arc::new(InMemorySessionStorage::new()));
    store.restore().await;

    let err = store
        .update_profile(IdentityUpdate {
            name: Some("Someone".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotAuthenticated));
}

#[tokio::test]
async fn test_update_profile_merges_and_persists() {
    let storage = Arc::new(InMemorySessionStorage::new());
    let (store, _, _) = store_with(storage.clone());
    store.restore().await;
    store
        .sign_in(Credentials::new("jane@example.com", "password123"))
        .await
        .unwrap();

    let updated = store
        .update_profile(IdentityUpdate {
            avatar: Some(Some("https://example.com/jane.png".to_string())),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(updated.name, "Jane Smith");
    assert_eq!(updated.avatar.as_deref(), Some("https://example.com/jane.png"));

    let persisted: Identity =
        serde_json::from_str(&storage.raw(SESSION_STORAGE_KEY).unwrap()).unwrap();
    assert_eq!(persisted, updated);
}

#[tokio::test]
async fn test_sign_out_during_profile_save_stays_signed_out() {
    let storage = Arc::new(GatedSaveStorage::new());
    let (store, _, _) = store_with(storage.clone());
    let store = Arc::new(store);
    store.restore().await;
    store
        .sign_in(Credentials::new("john@example.com", "password123"))
        .await
        .unwrap();

    storage.gated.store(true, Ordering::SeqCst);
    let updating = tokio::spawn({
        let store = store.clone();
        async move {
            store
                .update_profile(IdentityUpdate {
                    name: Some("Johnny".to_string()),
                    ..Default::default()
                })
                .await
        }
    });
    storage.entered.notified().await;

    store.sign_out().await;
    storage.release.notify_one();
    let result = updating.await.unwrap();

    assert!(matches!(result, Err(Error::NotAuthenticated)));
    assert_eq!(store.state(), SessionState::Unauthenticated);
    assert_eq!(storage.inner.raw(SESSION_STORAGE_KEY), None);
}
