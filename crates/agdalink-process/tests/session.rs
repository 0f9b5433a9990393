//! End-to-end session wiring against a scripted fake prover.
#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use agdalink_dispatch::{handler, Event};
use agdalink_process::{ConnectionError, ProcessSession, Request, SessionConfig};
use tokio::sync::mpsc;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Write an executable fixture script and return its path.
fn write_fixture(name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let dir = std::env::temp_dir().join(format!("agdalink-session-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let path = dir.join(name);
    std::fs::write(&path, body).expect("fixture should be writable");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("fixture should be chmod-able");
    path
}

fn config_for(script: PathBuf) -> SessionConfig {
    SessionConfig {
        executable: Some(script),
        ..SessionConfig::default()
    }
}

const FAKE_PROVER: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo "Agda version 9.9.9"
    exit 0
fi
printf 'Agda2> '
while IFS= read -r line; do
    echo '(agda2-status-action "Checking")'
    echo '((last . 2) . (agda2-give-action 0 "x"))'
    echo '((last . 1) . (agda2-goals-action (0)))'
    printf 'Agda2> '
done
"#;

async fn recv(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("event should arrive in time")
        .expect("event channel should stay open")
}

#[tokio::test]
async fn full_turn_is_delivered_in_order() {
    let script = write_fixture("fake-prover", FAKE_PROVER);
    let mut session = ProcessSession::open(config_for(script))
        .await
        .expect("session should open");

    assert_eq!(session.version(), "9.9.9");

    let (tx, mut rx) = mpsc::unbounded_channel();
    session
        .subscribe(handler(move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event);
            }
        }))
        .expect("first subscription should succeed");

    session
        .send(&Request::new("/tmp/Proof.agda", "Cmd_load {file} {libraries}"))
        .await
        .expect("request should write");

    // Startup prompt swallowed; the turn opens with the NonLast status.
    match recv(&mut rx).await {
        Event::Response(payload) => assert!(payload.starts_with("(agda2-status-action")),
        other => panic!("expected a response, got {other:?}"),
    }

    // Turn boundary: marker first, then Lasts by ascending priority even
    // though priority 2 arrived first.
    assert!(matches!(recv(&mut rx).await, Event::TurnCompleted));
    let Event::Response(first_last) = recv(&mut rx).await else {
        panic!("expected first last response");
    };
    assert!(first_last.starts_with("((last . 1)"));
    let Event::Response(second_last) = recv(&mut rx).await else {
        panic!("expected second last response");
    };
    assert!(second_last.starts_with("((last . 2)"));

    session.close().await;
    session.close().await; // idempotent
}

#[tokio::test]
async fn second_subscription_is_rejected() {
    let script = write_fixture("fake-prover-sub", FAKE_PROVER);
    let mut session = ProcessSession::open(config_for(script))
        .await
        .expect("session should open");

    let quiet = || handler(|_| async {});
    session.subscribe(quiet()).expect("first subscribe");
    assert!(matches!(
        session.subscribe(quiet()),
        Err(ConnectionError::AlreadySubscribed)
    ));

    session.close().await;
}

#[tokio::test]
async fn send_after_close_fails() {
    let script = write_fixture("fake-prover-closed", FAKE_PROVER);
    let mut session = ProcessSession::open(config_for(script))
        .await
        .expect("session should open");

    session.close().await;
    assert!(matches!(
        session.send(&Request::new("/tmp/A.agda", "Cmd_metas")).await,
        Err(ConnectionError::Closed)
    ));
}

#[tokio::test]
async fn probe_without_version_fails_validation() {
    let script = write_fixture(
        "mute-prover",
        "#!/bin/sh\necho \"no recognizable banner here\"\n",
    );
    let result = ProcessSession::open(config_for(script)).await;
    assert!(matches!(
        result,
        Err(ConnectionError::ValidationFailed { .. })
    ));
}

#[tokio::test]
async fn failing_probe_fails_validation() {
    let script = write_fixture("broken-prover", "#!/bin/sh\nexit 3\n");
    let result = ProcessSession::open(config_for(script)).await;
    assert!(matches!(
        result,
        Err(ConnectionError::ValidationFailed { .. })
    ));
}

#[tokio::test]
async fn unknown_program_fails_path_search() {
    let config = SessionConfig {
        program: "agdalink-no-such-prover".to_string(),
        ..SessionConfig::default()
    };
    let result = ProcessSession::open(config).await;
    assert!(matches!(
        result,
        Err(ConnectionError::PathSearchFailed { .. })
    ));
}

#[tokio::test]
async fn transport_failure_is_forwarded_in_band() {
    // A prover that exits right after its startup prompt: the stream ends,
    // which must not panic the pipeline. (EOF is an orderly end, so no
    // event is required — this guards the wiring, not the taxonomy.)
    let script = write_fixture(
        "flaky-prover",
        r#"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo "Agda version 9.9.9"
    exit 0
fi
printf 'Agda2> '
echo '(agda2-status-action "Gone")'
exit 0
"#,
    );
    let mut session = ProcessSession::open(config_for(script))
        .await
        .expect("session should open");

    let (tx, mut rx) = mpsc::unbounded_channel();
    session
        .subscribe(handler(move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event);
            }
        }))
        .expect("subscription should succeed");

    let event = recv(&mut rx).await;
    assert!(matches!(event, Event::Response(_)));

    session.close().await;
}
