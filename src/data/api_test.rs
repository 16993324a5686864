use super::*;
use crate::auth::AuthUser;
use crate::data::types::{Event, EventStatus, Profile, ProfileUpdate, Visibility};
use crate::session::SessionState;
use crate::test_support::{MockBackend, MockRoutes};
use axum::http::Method;
use serde_json::json;
use tokio::sync::watch;

// =========================================================================
// Helpers
// =========================================================================

const USER_ID: &str = "2d3e4f50-6172-4839-a4b5-c6d7e8f90a1b";

fn session() -> Arc<Session> {
    Arc::new(Session {
        access_token: "at".into(),
        refresh_token: "rt".into(),
        expires_at: u64::MAX,
        user: AuthUser { id: USER_ID.parse().unwrap(), email: Some("sam@example.com".into()) },
    })
}

/// API against a backend nothing listens on; only cache hits and local
/// checks can succeed.
fn api(session: Option<Arc<Session>>) -> (RegistrationApi, watch::Sender<SessionState>) {
    let (tx, rx) = watch::channel(SessionState::resolved(session));
    let config = BackendConfig::new("http://127.0.0.1:1", "anon").unwrap();
    let http = config.http_client().unwrap();
    (RegistrationApi::new(&config, http, SessionHandle::new(rx)), tx)
}

/// API against a local backend answering with `routes`.
async fn live_api(routes: MockRoutes) -> (RegistrationApi, MockBackend, watch::Sender<SessionState>) {
    let backend = routes.serve().await;
    let (tx, rx) = watch::channel(SessionState::resolved(Some(session())));
    let config = BackendConfig::new(&backend.url, "anon").unwrap();
    let http = config.http_client().unwrap();
    (RegistrationApi::new(&config, http, SessionHandle::new(rx)), backend, tx)
}

fn team_row(id: Uuid) -> serde_json::Value {
    json!({
        "id": id,
        "name": "Apex Hunters",
        "logo": null,
        "owner": USER_ID,
        "status": "active",
        "created_at": "2025-03-01T10:00:00Z",
        "created_by": USER_ID,
        "updated_by": USER_ID
    })
}

fn event() -> Event {
    Event {
        id: Uuid::new_v4(),
        name: "Spring Sprint".into(),
        date_start: "2025-04-12".into(),
        date_end: "2025-04-13".into(),
        status: EventStatus::Published,
        visibility: Visibility::Public,
        venue: None,
        description: None,
        hero_image_url: None,
    }
}

// =========================================================================
// Identity
// =========================================================================

#[tokio::test]
async fn caller_scoped_reads_need_a_session() {
    let (api, _tx) = api(None);
    assert!(matches!(api.my_entries().await, Err(ApiError::NotAuthenticated)));
    assert!(matches!(api.my_teams().await, Err(ApiError::NotAuthenticated)));
    assert!(matches!(api.profile().await, Err(ApiError::NotAuthenticated)));
    assert!(matches!(api.documents().await, Err(ApiError::NotAuthenticated)));
    assert!(matches!(api.document_url("u/a.pdf").await, Err(ApiError::NotAuthenticated)));
}

#[tokio::test]
async fn sign_out_is_seen_by_the_next_call() {
    let (api, tx) = api(Some(session()));
    assert_eq!(api.require_session().await.unwrap().user_id().to_string(), USER_ID);
    tx.send_replace(SessionState::resolved(None));
    assert!(matches!(api.require_session().await, Err(ApiError::NotAuthenticated)));
}

#[tokio::test]
async fn switching_users_drops_cached_rows() {
    let (api, tx) = api(Some(session()));
    let team_id = Uuid::new_v4();
    api.cache().insert(cache::key(["events"]), Arc::new(vec![event()])).await;
    api.cache().insert(cache::key(["team".to_owned(), team_id.to_string()]), Arc::new(0_u8)).await;

    // Same user: cached rows are served.
    assert_eq!(api.events().await.unwrap().len(), 1);
    assert_eq!(api.cache().len().await, 2);

    let other = Arc::new(Session {
        user: AuthUser { id: Uuid::new_v4(), email: None },
        ..(*session()).clone()
    });
    tx.send_replace(SessionState::resolved(Some(other)));

    // The id-keyed team row was fetched under the previous user's policies.
    assert!(matches!(api.team(team_id).await, Err(ApiError::Request(_))));
    assert!(api.cache().is_empty().await);
}

#[tokio::test]
async fn signing_out_drops_cached_rows() {
    let (api, tx) = api(Some(session()));
    api.cache().insert(cache::key(["events"]), Arc::new(vec![event()])).await;
    tx.send_replace(SessionState::resolved(None));

    assert!(matches!(api.events().await, Err(ApiError::Request(_))));
    assert!(api.cache().is_empty().await);
}

// =========================================================================
// Cache keys
// =========================================================================

#[tokio::test]
async fn events_are_served_from_the_events_key() {
    let (api, _tx) = api(None);
    let cached = Arc::new(vec![event()]);
    api.cache().insert(cache::key(["events"]), Arc::clone(&cached)).await;

    let events = api.events().await.unwrap();
    assert!(Arc::ptr_eq(&events, &cached));
}

#[tokio::test]
async fn profile_is_keyed_by_user() {
    let (api, _tx) = api(Some(session()));
    let profile = Arc::new(Profile {
        id: USER_ID.parse().unwrap(),
        first_name: Some("Sam".into()),
        last_name: None,
        email: None,
        phone: None,
        team_name: None,
        avatar_url: None,
    });
    api.cache().insert(cache::key(["profile", USER_ID]), Arc::clone(&profile)).await;

    assert_eq!(api.profile().await.unwrap().display_name(), "Sam");
    // Empty update never reaches the backend.
    let same = api.update_profile(ProfileUpdate::default()).await.unwrap();
    assert!(Arc::ptr_eq(&same, &profile));
}

#[tokio::test]
async fn miss_against_dead_backend_is_request_error() {
    let (api, _tx) = api(Some(session()));
    let err = api.events().await.unwrap_err();
    assert!(matches!(err, ApiError::Request(_)));
    assert!(api.cache().is_empty().await);
}

// =========================================================================
// Mutations
// =========================================================================

#[tokio::test]
async fn invalid_registration_is_rejected_before_any_request() {
    let (api, _tx) = api(Some(session()));
    let form = RegistrationForm { event_id: Some(Uuid::new_v4()), ..RegistrationForm::default() };
    let err = api.register_for_event(form).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid input: Please select a class. Driver name is required. Driver email is required."
    );
}

#[tokio::test]
async fn blank_team_name_is_rejected() {
    let (api, _tx) = api(Some(session()));
    let update = types::TeamUpdate { name: Some("   ".into()), ..types::TeamUpdate::default() };
    let err = api.update_team(Uuid::new_v4(), update).await.unwrap_err();
    assert!(matches!(err, ApiError::Invalid(ref p) if p == &vec!["Team name is required"]));
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let (api, _tx) = api(Some(session()));
    let bytes = vec![0_u8; usize::try_from(MAX_UPLOAD_BYTES).unwrap() + 1];
    let err = api
        .upload_document("big.pdf", bytes, "application/pdf", types::DocumentType::Medical)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Invalid(_)));
}

#[tokio::test]
async fn failed_upload_leaves_cache_alone() {
    let (api, _tx) = api(Some(session()));
    api.cache().insert(cache::key(["documents", USER_ID]), Arc::new(Vec::<types::Document>::new())).await;
    let err = api
        .upload_document("scan.pdf", vec![1, 2, 3], "application/pdf", types::DocumentType::License)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Request(_)));
    assert_eq!(api.cache().len().await, 1);
}

#[tokio::test]
async fn document_url_falls_back_to_public_url() {
    let (api, _tx) = api(Some(session()));
    let url = api.document_url("u/license-1.pdf").await.unwrap();
    assert_eq!(url, "http://127.0.0.1:1/storage/v1/object/public/documents/u/license-1.pdf");
}

// =========================================================================
// Against a live backend
// =========================================================================

#[tokio::test]
async fn registering_drops_cached_entries_only() {
    let entry_id = Uuid::new_v4();
    let event_id = Uuid::new_v4();
    let class_id = Uuid::new_v4();
    let (api, backend, _tx) = live_api(MockRoutes::new().on(
        Method::POST,
        "/rest/v1/entries",
        201,
        json!({
            "id": entry_id,
            "event_id": event_id,
            "class_id": class_id,
            "profile": USER_ID,
            "status": "pending",
            "driver_name": "Sam Rivera",
            "driver_email": "sam@example.com",
            "kart_number": null,
            "created_at": "2025-03-01T10:00:00Z"
        }),
    ))
    .await;
    api.cache().insert(cache::key(["my-entries", USER_ID]), Arc::new(0_u8)).await;
    api.cache().insert(cache::key(["events"]), Arc::new(vec![event()])).await;

    let form = RegistrationForm {
        event_id: Some(event_id),
        class_id: Some(class_id),
        driver_name: "Sam Rivera".into(),
        driver_email: "sam@example.com".into(),
        kart_number: String::new(),
    };
    let entry = api.register_for_event(form).await.expect("registration should succeed");

    assert_eq!(entry.id, entry_id);
    assert_eq!(api.cache().len().await, 1);
    assert!(api.cache().get::<Vec<Event>>(&cache::key(["events"])).await.is_some());

    let sent = backend.requests_to(&Method::POST, "/rest/v1/entries");
    assert_eq!(sent.len(), 1);
    let body: serde_json::Value = serde_json::from_str(&sent[0].body).unwrap();
    assert_eq!(body["status"], "pending");
    assert_eq!(body["profile"], USER_ID);
}

#[tokio::test]
async fn team_update_drops_team_and_membership_keys() {
    let team_id = Uuid::new_v4();
    let (api, backend, _tx) =
        live_api(MockRoutes::new().on(Method::PATCH, "/rest/v1/teams", 200, json!([team_row(team_id)]))).await;
    api.cache().insert(cache::key(["team".to_owned(), team_id.to_string()]), Arc::new(0_u8)).await;
    api.cache().insert(cache::key(["my-teams", USER_ID]), Arc::new(0_u8)).await;
    api.cache().insert(cache::key(["events"]), Arc::new(vec![event()])).await;

    let update = types::TeamUpdate { name: Some(" Apex Hunters ".into()), ..types::TeamUpdate::default() };
    let team = api.update_team(team_id, update).await.expect("team update should succeed");

    assert_eq!(team.id, team_id);
    assert_eq!(api.cache().len().await, 1);

    let sent = backend.requests_to(&Method::PATCH, "/rest/v1/teams");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].query.contains(&format!("id=eq.{team_id}")));
    let body: serde_json::Value = serde_json::from_str(&sent[0].body).unwrap();
    assert_eq!(body["name"], "Apex Hunters");
    assert_eq!(body["updated_by"], USER_ID);
}

#[tokio::test]
async fn team_update_matching_no_rows_is_not_permitted() {
    let team_id = Uuid::new_v4();
    let (api, _backend, _tx) = live_api(MockRoutes::new().on(Method::PATCH, "/rest/v1/teams", 200, json!([]))).await;
    api.cache().insert(cache::key(["team".to_owned(), team_id.to_string()]), Arc::new(0_u8)).await;

    let update = types::TeamUpdate { status: Some(types::TeamStatus::Inactive), ..types::TeamUpdate::default() };
    let err = api.update_team(team_id, update).await.unwrap_err();

    assert!(matches!(err, ApiError::NotPermitted(m) if m == teams::TEAM_UPDATE_DENIED));
    assert_eq!(api.cache().len().await, 1);
}

#[tokio::test]
async fn profile_update_matching_no_rows_is_not_permitted() {
    let (api, backend, _tx) =
        live_api(MockRoutes::new().on(Method::PATCH, "/rest/v1/profiles", 200, json!([]))).await;

    let update = ProfileUpdate { first_name: Some("Sam".into()), ..ProfileUpdate::default() };
    let err = api.update_profile(update).await.unwrap_err();

    assert!(matches!(err, ApiError::NotPermitted(m) if m == profile::PROFILE_UPDATE_FAILED));
    let sent = backend.requests_to(&Method::PATCH, "/rest/v1/profiles");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].query.contains(&format!("id=eq.{USER_ID}")));
}

#[tokio::test]
async fn rejected_document_row_removes_uploaded_object() {
    let (api, backend, _tx) = live_api(
        MockRoutes::new()
            .on(Method::POST, "/storage/v1/object/documents/", 200, json!({ "Key": "documents/u/a.pdf" }))
            .on(
                Method::POST,
                "/rest/v1/documents",
                403,
                json!({ "message": "new row violates row-level security policy" }),
            )
            .on(Method::DELETE, "/storage/v1/object/documents", 200, json!([])),
    )
    .await;
    api.cache().insert(cache::key(["documents", USER_ID]), Arc::new(0_u8)).await;

    let err = api
        .upload_document("scan.pdf", vec![1, 2, 3], "application/pdf", types::DocumentType::License)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Response { status: 403, .. }));

    let uploads = backend.requests_to(&Method::POST, "/storage/v1/object/documents/");
    assert_eq!(uploads.len(), 1);
    let object = uploads[0].path.trim_start_matches("/storage/v1/object/documents/").to_owned();
    assert!(object.starts_with(&format!("{USER_ID}/license-")));
    assert!(object.ends_with(".pdf"));

    let removals = backend.requests_to(&Method::DELETE, "/storage/v1/object/documents");
    assert_eq!(removals.len(), 1);
    let body: serde_json::Value = serde_json::from_str(&removals[0].body).unwrap();
    assert_eq!(body, json!({ "prefixes": [object] }));

    assert_eq!(api.cache().len().await, 1);
}

#[tokio::test]
async fn recorded_document_drops_cached_documents() {
    let document_id = Uuid::new_v4();
    let (api, backend, _tx) = live_api(
        MockRoutes::new()
            .on(Method::POST, "/storage/v1/object/documents/", 200, json!({ "Key": "documents/u/a.pdf" }))
            .on(
                Method::POST,
                "/rest/v1/documents",
                201,
                json!({
                    "id": document_id,
                    "entry_id": null,
                    "profile": USER_ID,
                    "file_name": "scan.pdf",
                    "file_url": format!("{USER_ID}/medical-1.pdf"),
                    "document_type": "medical",
                    "created_at": "2025-03-01T10:00:00Z"
                }),
            ),
    )
    .await;
    api.cache().insert(cache::key(["documents", USER_ID]), Arc::new(0_u8)).await;

    let document = api
        .upload_document("scan.pdf", vec![1, 2, 3], "application/pdf", types::DocumentType::Medical)
        .await
        .expect("upload should succeed");

    assert_eq!(document.id, document_id);
    assert!(api.cache().is_empty().await);
    assert!(backend.requests_to(&Method::DELETE, "/storage/v1").is_empty());

    let inserts = backend.requests_to(&Method::POST, "/rest/v1/documents");
    let body: serde_json::Value = serde_json::from_str(&inserts[0].body).unwrap();
    assert_eq!(body["document_type"], "medical");
    assert_eq!(body["file_name"], "scan.pdf");
}

#[tokio::test]
async fn signed_document_url_is_made_absolute() {
    let (api, backend, _tx) = live_api(MockRoutes::new().on(
        Method::POST,
        "/storage/v1/object/sign/documents/",
        200,
        json!({ "signedURL": "/object/sign/documents/u/license-1.pdf?token=t" }),
    ))
    .await;

    let url = api.document_url("u/license-1.pdf").await.unwrap();

    assert_eq!(url, format!("{}/storage/v1/object/sign/documents/u/license-1.pdf?token=t", backend.url));
    let sent = backend.requests_to(&Method::POST, "/storage/v1/object/sign/documents/u/license-1.pdf");
    let body: serde_json::Value = serde_json::from_str(&sent[0].body).unwrap();
    assert_eq!(body["expiresIn"], SIGNED_URL_TTL_SECS);
}
