//! LINE callback flow against mocked token endpoint and backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use fable_client::FailureKind;
use fable_oauth::{
    CallbackGate, CallbackOutcome, CallbackParams, GatePhase, MemoryStateStorage, OAuthError,
    Provider, StateGuard, StatePolicy, StateStorage,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{Harness, backend_login_reply};

async fn mount_token_endpoint(h: &Harness, status: u16, body: serde_json::Value, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth2/v2.1/token"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .expect(calls)
        .mount(&h.server)
        .await;
}

async fn mount_backend_login(h: &Harness, access_token: &str, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/auth/line"))
        .and(body_partial_json(json!({"accessToken": access_token})))
        .respond_with(ResponseTemplate::new(200).set_body_json(backend_login_reply("sess-line")))
        .expect(calls)
        .mount(&h.server)
        .await;
}

#[tokio::test]
async fn test_code_exchanged_and_backend_login_with_access_token() {
    let h = Harness::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/v2.1/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc"))
        .and(body_string_contains("client_id=1650000000"))
        .and(body_string_contains("client_secret=channel-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "t1",
            "token_type": "Bearer",
            "expires_in": 2592000
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    mount_backend_login(&h, "t1", 1).await;

    // Stored state "xyz" in both tiers.
    let short = Arc::new(MemoryStateStorage::new());
    let long = Arc::new(MemoryStateStorage::new());
    for tier in [&short, &long] {
        tier.set(&Provider::Line.state_key(), "xyz").unwrap();
    }
    let login = h.line_login(StateGuard::new(short.clone(), long.clone()));

    let gate = CallbackGate::new();
    let outcome = login
        .handle_callback(&gate, &CallbackParams::from_query("code=abc&state=xyz"))
        .await;

    match outcome {
        CallbackOutcome::Succeeded {
            session,
            redirect_to,
        } => {
            assert_eq!(session.session_token, "sess-line");
            assert_eq!(redirect_to, "/");
        }
        other => panic!("expected success, got {:?}", other),
    }
    assert_eq!(gate.phase(), GatePhase::Completed);
    assert!(short.get("line_oauth_state").unwrap().is_none());
    assert!(long.get("line_oauth_state").unwrap().is_none());
    assert_eq!(h.broker.token().await.as_deref(), Some("sess-line"));
    assert_eq!(h.notifier.successes(), vec!["Logged in with LINE"]);
}

#[tokio::test]
async fn test_begin_then_callback_roundtrip() {
    let h = Harness::start().await;
    mount_token_endpoint(&h, 200, json!({"access_token": "t2"}), 1).await;
    mount_backend_login(&h, "t2", 1).await;

    let login = h.line_login(StateGuard::default());
    let url = url::Url::parse(&login.begin()).unwrap();
    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert_eq!(state.len(), 43);

    let params = CallbackParams {
        code: Some("code-2".into()),
        state: Some(state),
        ..Default::default()
    };
    let outcome = login.handle_callback(&CallbackGate::new(), &params).await;
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_duplicate_concurrent_callbacks_login_once() {
    let h = Harness::start().await;
    mount_token_endpoint(&h, 200, json!({"access_token": "t1"}), 1).await;
    mount_backend_login(&h, "t1", 1).await;

    let guard = StateGuard::default();
    let login = h.line_login(guard.clone());
    let state = guard.issue(Provider::Line);
    let params = CallbackParams {
        code: Some("abc".into()),
        state: Some(state.value),
        ..Default::default()
    };

    let gate = CallbackGate::new();
    let (a, b) = tokio::join!(
        login.handle_callback(&gate, &params),
        login.handle_callback(&gate, &params)
    );

    let successes = [&a, &b].iter().filter(|o| o.is_success()).count();
    let ignored = [&a, &b]
        .iter()
        .filter(|o| matches!(o, CallbackOutcome::Ignored))
        .count();
    assert_eq!((successes, ignored), (1, 1));
    assert_eq!(h.notifier.events().len(), 1);
    // Mock expectations (one token call, one backend login) are verified on drop.
}

#[tokio::test]
async fn test_missing_state_never_exchanges() {
    let h = Harness::start().await;
    mount_token_endpoint(&h, 200, json!({"access_token": "t1"}), 0).await;
    mount_backend_login(&h, "t1", 0).await;

    let login = h.line_login(StateGuard::default());
    let outcome = login
        .handle_callback(&CallbackGate::new(), &CallbackParams::from_query("code=abc"))
        .await;

    match outcome {
        CallbackOutcome::Failed {
            error,
            redirect_to,
            after,
        } => {
            assert!(matches!(error, OAuthError::MissingState));
            assert_eq!(error.kind(), FailureKind::ProtocolFailure);
            assert_eq!(redirect_to, "/login");
            assert_eq!(after, Duration::from_secs(3));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(h.notifier.errors().len(), 1);
}

#[tokio::test]
async fn test_evicted_state_still_proceeds_to_exchange() {
    let h = Harness::start().await;
    mount_token_endpoint(&h, 200, json!({"access_token": "t1"}), 1).await;
    mount_backend_login(&h, "t1", 1).await;

    // Nothing stored in either tier.
    let login = h.line_login(StateGuard::default());
    let outcome = login
        .handle_callback(
            &CallbackGate::new(),
            &CallbackParams::from_query("code=abc&state=whatever"),
        )
        .await;
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_strict_policy_stops_on_evicted_state() {
    let h = Harness::start().await;
    mount_token_endpoint(&h, 200, json!({"access_token": "t1"}), 0).await;

    let login = h.line_login(StateGuard::default().with_policy(StatePolicy::Strict));
    let outcome = login
        .handle_callback(
            &CallbackGate::new(),
            &CallbackParams::from_query("code=abc&state=whatever"),
        )
        .await;
    assert!(matches!(
        outcome,
        CallbackOutcome::Failed {
            error: OAuthError::StateNotFound,
            ..
        }
    ));
}

#[tokio::test]
async fn test_token_endpoint_400_fails_without_backend_login() {
    let h = Harness::start().await;
    mount_token_endpoint(
        &h,
        400,
        json!({"error": "invalid_grant", "error_description": "authorization code expired"}),
        1,
    )
    .await;
    mount_backend_login(&h, "t1", 0).await;

    let guard = StateGuard::default();
    let login = h.line_login(guard.clone());
    let state = guard.issue(Provider::Line);
    let params = CallbackParams {
        code: Some("stale".into()),
        state: Some(state.value),
        ..Default::default()
    };

    let outcome = login.handle_callback(&CallbackGate::new(), &params).await;
    match outcome {
        CallbackOutcome::Failed {
            error,
            redirect_to,
            after,
        } => {
            assert!(matches!(error, OAuthError::TokenExchangeFailed { status: 400, .. }));
            assert_eq!(redirect_to, "/login");
            assert_eq!(after, Duration::from_secs(3));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    // The provider's error body is not shown to the user.
    assert!(!h.notifier.errors()[0].contains("invalid_grant"));
    assert!(h.store.raw().await.is_none());
}

#[tokio::test]
async fn test_token_response_without_access_token() {
    let h = Harness::start().await;
    mount_token_endpoint(&h, 200, json!({"token_type": "Bearer"}), 1).await;
    mount_backend_login(&h, "t1", 0).await;

    let login = h.line_login(StateGuard::default());
    let outcome = login
        .handle_callback(
            &CallbackGate::new(),
            &CallbackParams::from_query("code=abc&state=s"),
        )
        .await;
    assert!(matches!(
        outcome,
        CallbackOutcome::Failed {
            error: OAuthError::MissingAccessToken,
            ..
        }
    ));
}

#[tokio::test]
async fn test_provider_error_redirect() {
    let h = Harness::start().await;
    mount_token_endpoint(&h, 200, json!({"access_token": "t1"}), 0).await;

    let login = h.line_login(StateGuard::default());
    let outcome = login
        .handle_callback(
            &CallbackGate::new(),
            &CallbackParams::from_query("error=access_denied&state=s"),
        )
        .await;
    assert!(matches!(
        outcome,
        CallbackOutcome::Failed {
            error: OAuthError::ProviderDenied { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_missing_code() {
    let h = Harness::start().await;
    let login = h.line_login(StateGuard::default());
    let outcome = login
        .handle_callback(&CallbackGate::new(), &CallbackParams::from_query("state=s"))
        .await;
    assert!(matches!(
        outcome,
        CallbackOutcome::Failed {
            error: OAuthError::MissingCode,
            ..
        }
    ));
}

#[tokio::test]
async fn test_backend_rejects_line_token() {
    let h = Harness::start().await;
    mount_token_endpoint(&h, 200, json!({"access_token": "t1"}), 1).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/line"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "LINE account not linked"})))
        .mount(&h.server)
        .await;

    let login = h.line_login(StateGuard::default());
    let outcome = login
        .handle_callback(
            &CallbackGate::new(),
            &CallbackParams::from_query("code=abc&state=s"),
        )
        .await;

    match outcome {
        CallbackOutcome::Failed { error, .. } => {
            assert_eq!(error.kind(), FailureKind::AuthFailure);
            assert_eq!(error.user_message(), "LINE account not linked");
        }
        other => panic!("expected failure, got {:?}", other),
    }
}
