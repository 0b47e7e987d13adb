// tests/integration/failure_test.rs

//! Sessions that must stop early: rejected language, unreachable service,
//! missing result, silent service.

use crate::integration::fake_service::{FakeService, Received, Script, line, lines_of};
use crate::integration::fixtures::{builder_for, three_file_config, write_file};
use moss_client::{Language, MossClient, MossError, SessionState, TransportLimits};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::net::TcpListener;

fn header_lines() -> Vec<Received> {
    vec![
        line("moss 12345"),
        line("directory 0"),
        line("X 0"),
        line("maxmatches 10"),
        line("show 250"),
        line("language python"),
    ]
}

#[tokio::test]
async fn test_rejected_language_stops_after_headers() {
    let service = FakeService::start(Script {
        ack: Some("no\n"),
        ..Script::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = three_file_config(service.addr, &dir);

    let mut client = MossClient::connect(config).await.unwrap();
    let err = client.send().await.unwrap_err();
    assert_eq!(err, MossError::UnsupportedLanguage(Language::Python));
    assert_eq!(err.to_string(), "Unsupported language: python");
    assert_eq!(client.state(), SessionState::Closed);

    // No file, query or end bytes after the rejection.
    assert_eq!(service.transcript().await, header_lines());

    client.close().await;
}

#[tokio::test]
async fn test_rejection_ignores_case_and_whitespace() {
    let service = FakeService::start(Script {
        ack: Some("  No \r\n"),
        ..Script::default()
    })
    .await;
    let config = builder_for(service.addr).build().unwrap();

    let err = MossClient::submit(config).await.unwrap_err();
    assert!(matches!(err, MossError::UnsupportedLanguage(Language::Python)));
    assert_eq!(service.transcript().await, header_lines());
}

#[tokio::test]
async fn test_unreachable_service_is_a_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = builder_for(addr).build().unwrap();
    let err = MossClient::submit(config).await.unwrap_err();
    assert!(err.is_connection_error(), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_empty_ack_proceeds_to_upload() {
    // The service half-closes instead of acknowledging: the client treats that
    // as an empty reply, uploads everything, then fails waiting for a result.
    let service = FakeService::start(Script {
        ack: None,
        ..Script::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = three_file_config(service.addr, &dir);

    let err = MossClient::submit(config).await.unwrap_err();
    match err {
        MossError::Connection(io) => assert_eq!(io.kind(), ErrorKind::UnexpectedEof),
        other => panic!("expected a connection error, got {other:?}"),
    }

    let lines = lines_of(&service.transcript().await);
    assert_eq!(lines.iter().filter(|l| l.starts_with("file ")).count(), 3);
    assert_eq!(lines.last().unwrap(), "query 0 integration run\n");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_unreadable_file_aborts_before_query() {
    let service = FakeService::start(Script::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let base = write_file(&dir, "skeleton.py", 10);
    // A regular file whose first page is unmapped: reads fail even for root.
    let unreadable = std::path::Path::new("/proc/self/mem");
    let config = builder_for(service.addr)
        .add_base_file(&base)
        .unwrap()
        .add_submission_file(unreadable)
        .unwrap()
        .build()
        .unwrap();

    let mut client = MossClient::connect(config).await.unwrap();
    let err = client.send().await.unwrap_err();
    match &err {
        MossError::FileAccess { path, .. } => assert_eq!(path, unreadable),
        other => panic!("expected a file access error, got {other:?}"),
    }
    assert!(err.to_string().contains("/proc/self/mem"));
    assert_eq!(client.state(), SessionState::Closed);

    // The base file went out; nothing after the failing file did.
    let lines = lines_of(&service.transcript().await);
    assert_eq!(lines.iter().filter(|l| l.starts_with("file ")).count(), 1);
    assert!(!lines.iter().any(|l| l.starts_with("query ")));
    assert!(!lines.contains(&"end\n".to_string()));
}

#[tokio::test]
async fn test_failed_open_leaves_client_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut client = MossClient::new(builder_for(addr).build().unwrap());
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(client.open().await.unwrap_err().is_connection_error());
    assert_eq!(client.state(), SessionState::Closed);
    assert!(matches!(
        client.open().await.unwrap_err(),
        MossError::InvalidState(_)
    ));
}

#[tokio::test]
async fn test_missing_result_is_a_connection_error() {
    let service = FakeService::start(Script {
        result: None,
        ..Script::default()
    })
    .await;
    let config = builder_for(service.addr).build().unwrap();

    let mut client = MossClient::connect(config).await.unwrap();
    let err = client.send().await.unwrap_err();
    assert!(err.is_connection_error());
    assert_eq!(client.state(), SessionState::Closed);

    // The failed session never sends `end`.
    let log = service.transcript().await;
    assert_eq!(log.last(), Some(&line("query 0 integration run")));
}

#[tokio::test]
async fn test_silent_service_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let holder = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let config = builder_for(addr)
        .limits(TransportLimits {
            read_timeout: Duration::from_millis(100),
            ..TransportLimits::default()
        })
        .build()
        .unwrap();

    let err = MossClient::submit(config).await.unwrap_err();
    match err {
        MossError::Connection(io) => assert_eq!(io.kind(), ErrorKind::TimedOut),
        other => panic!("expected a timeout, got {other:?}"),
    }
    holder.abort();
}
