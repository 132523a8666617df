//! Session negotiation against a scripted browser and operator.

mod support;

use std::time::Duration;

use bookcapture_core::driver::LaunchMode;
use bookcapture_core::session::NegotiationSettings;
use bookcapture_core::{
    DocumentTarget, Endpoints, NegotiatorState, SessionError, SessionNegotiator, SessionStore,
};
use support::{FakeSite, SESSION_COOKIE, ScriptedPrompter, VALID_TOKEN};

fn negotiation(login_timeout: Duration) -> NegotiationSettings {
    NegotiationSettings {
        login_timeout,
        ui_timeout: Duration::ZERO,
        ..NegotiationSettings::default()
    }
}

fn target() -> DocumentTarget {
    DocumentTarget::new("3245678")
}

fn viewer_url() -> String {
    Endpoints::default().viewer_url(&target())
}

#[tokio::test]
async fn test_interactive_login_persists_and_is_reused_without_login() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let site = FakeSite::with_pages(3);
    site.script_login(&viewer_url());

    let mut first = SessionNegotiator::new(SessionStore::new(&path), negotiation(Duration::from_secs(5)));
    assert_eq!(first.state(), NegotiatorState::InteractiveLogin);
    let prompter = ScriptedPrompter::default();
    let context = first.establish(&site, &prompter, &target()).await.unwrap();
    assert_eq!(context.origin(), NegotiatorState::UseFreshCredentials);
    assert_eq!(context.credentials().cookies()[0].name, SESSION_COOKIE);
    context.close().await.unwrap();
    assert!(path.exists());
    assert!(prompter.asked().is_empty());
    assert_eq!(site.launches(), [LaunchMode::Interactive, LaunchMode::Capture]);

    // A later run trusts the stored session and never opens a login window.
    let second_site = FakeSite::with_pages(3);
    let mut second = SessionNegotiator::new(SessionStore::new(&path), negotiation(Duration::from_secs(5)));
    assert_eq!(second.state(), NegotiatorState::UseStoredCredentials);
    let prompter = ScriptedPrompter::confirming(&[true]);
    let context = second.establish(&second_site, &prompter, &target()).await.unwrap();
    assert_eq!(context.origin(), NegotiatorState::UseStoredCredentials);
    assert_eq!(context.credentials().cookies()[0].value(), VALID_TOKEN);
    assert_eq!(second_site.launches(), [LaunchMode::Capture]);
    assert_eq!(prompter.asked().len(), 1);
}

#[tokio::test]
async fn test_login_timeout_is_reported_and_nothing_is_saved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    // No navigations scripted: the operator never completes the login.
    let site = FakeSite::with_pages(3);

    let mut negotiator =
        SessionNegotiator::new(SessionStore::new(&path), negotiation(Duration::from_millis(50)));
    let err = negotiator
        .establish(&site, &ScriptedPrompter::default(), &target())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::LoginTimeout { .. }));
    assert!(err.is_recoverable());
    assert!(!path.exists());
    assert_eq!(negotiator.state(), NegotiatorState::InteractiveLogin);
    assert_eq!(site.read(|s| s.closed), 1);
}

#[tokio::test]
async fn test_login_that_never_leaves_the_reader_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let site = FakeSite::with_pages(3);
    let url = viewer_url();
    // Reloads of the reader alone do not count as a completed login.
    site.update(|s| s.login_navigations = vec![url.clone(), url]);

    let mut negotiator = SessionNegotiator::new(
        SessionStore::new(dir.path().join("session.json")),
        negotiation(Duration::from_millis(50)),
    );
    let err = negotiator
        .establish(&site, &ScriptedPrompter::default(), &target())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::LoginTimeout { .. }));
}

#[tokio::test]
async fn test_landing_on_another_document_is_not_a_completed_login() {
    let dir = tempfile::tempdir().unwrap();
    let site = FakeSite::with_pages(3);
    // Same prefix as the reader URL, different document.
    let other = format!("{}1", viewer_url());
    site.update(|s| s.login_navigations = vec![support::LOGIN_URL.to_string(), other]);

    let mut negotiator = SessionNegotiator::new(
        SessionStore::new(dir.path().join("session.json")),
        negotiation(Duration::from_millis(50)),
    );
    let err = negotiator
        .establish(&site, &ScriptedPrompter::default(), &target())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::LoginTimeout { .. }));
}

#[tokio::test]
async fn test_return_with_extra_query_parameters_completes_login() {
    let dir = tempfile::tempdir().unwrap();
    let site = FakeSite::with_pages(3);
    let back = format!("{}&from=sso", viewer_url());
    site.update(|s| s.login_navigations = vec![support::LOGIN_URL.to_string(), back]);

    let mut negotiator = SessionNegotiator::new(
        SessionStore::new(dir.path().join("session.json")),
        negotiation(Duration::from_secs(5)),
    );
    let context = negotiator
        .establish(&site, &ScriptedPrompter::default(), &target())
        .await
        .unwrap();
    assert_eq!(context.origin(), NegotiatorState::UseFreshCredentials);
}

#[tokio::test]
async fn test_declining_stored_session_falls_back_to_login() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(
        &path,
        r#"[{"name":"reader_session","value":"stale","domain":"127.0.0.1","path":"/"}]"#,
    )
    .unwrap();
    let site = FakeSite::with_pages(3);
    site.script_login(&viewer_url());

    let mut negotiator = SessionNegotiator::new(SessionStore::new(&path), negotiation(Duration::from_secs(5)));
    let prompter = ScriptedPrompter::confirming(&[false]);
    let context = negotiator.establish(&site, &prompter, &target()).await.unwrap();

    assert_eq!(context.origin(), NegotiatorState::UseFreshCredentials);
    assert_eq!(
        site.launches(),
        [LaunchMode::Capture, LaunchMode::Interactive, LaunchMode::Capture]
    );
    let saved = SessionStore::new(&path).load().unwrap().unwrap();
    assert_eq!(saved.cookies()[0].value(), VALID_TOKEN);
}

#[tokio::test]
async fn test_trust_question_is_asked_once_per_negotiator() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(
        &path,
        r#"[{"name":"reader_session","value":"fresh-token","domain":"127.0.0.1"}]"#,
    )
    .unwrap();
    let site = FakeSite::with_pages(3);
    site.script_login(&viewer_url());

    let mut negotiator = SessionNegotiator::new(SessionStore::new(&path), negotiation(Duration::from_secs(5)));
    let prompter = ScriptedPrompter::confirming(&[true]);
    let context = negotiator.establish(&site, &prompter, &target()).await.unwrap();
    context.close().await.unwrap();

    negotiator.report_access_denied();
    assert_eq!(negotiator.state(), NegotiatorState::InteractiveLogin);
    let context = negotiator.establish(&site, &prompter, &target()).await.unwrap();
    context.close().await.unwrap();

    assert_eq!(prompter.asked().len(), 1);
    assert_eq!(
        site.launches(),
        [LaunchMode::Capture, LaunchMode::Interactive, LaunchMode::Capture]
    );
}

#[tokio::test]
async fn test_corrupt_session_file_is_treated_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{not json").unwrap();
    let site = FakeSite::with_pages(3);
    site.script_login(&viewer_url());

    let mut negotiator = SessionNegotiator::new(SessionStore::new(&path), negotiation(Duration::from_secs(5)));
    let prompter = ScriptedPrompter::default();
    negotiator.establish(&site, &prompter, &target()).await.unwrap();

    assert!(prompter.asked().is_empty());
    assert_eq!(site.launches()[0], LaunchMode::Interactive);
}
