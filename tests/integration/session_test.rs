// tests/integration/session_test.rs

//! End-to-end sessions against the fake service.

use crate::integration::fake_service::{FakeService, Received, Script, line, lines_of};
use crate::integration::fixtures::{builder_for, three_file_config, write_file};
use moss_client::connection::file_label;
use moss_client::{MossClient, SessionState, TransportLimits};

#[tokio::test]
async fn test_three_file_session_wire_format() {
    let service = FakeService::start(Script::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let (config, [base, first, second]) = three_file_config(service.addr, &dir);

    let url = MossClient::submit(config).await.unwrap();
    assert_eq!(url, "http://moss.stanford.edu/results/1/123456789");

    let log = service.transcript().await;
    let expected = vec![
        line("moss 12345"),
        line("directory 0"),
        line("X 0"),
        line("maxmatches 10"),
        line("show 250"),
        line("language python"),
        line(&format!("file 0 python 10 {}", file_label(&base))),
        Received::Payload(std::fs::read(&base).unwrap()),
        line(&format!("file 1 python 5 {}", file_label(&first))),
        Received::Payload(std::fs::read(&first).unwrap()),
        line(&format!("file 2 python 7 {}", file_label(&second))),
        Received::Payload(std::fs::read(&second).unwrap()),
        line("query 0 integration run"),
        line("end"),
    ];
    assert_eq!(log, expected);
}

#[tokio::test]
async fn test_flags_and_thresholds_are_rendered() {
    let service = FakeService::start(Script::default()).await;
    let config = builder_for(service.addr)
        .directory_mode(true)
        .experimental(true)
        .max_ignore_threshold(3)
        .max_matches_displayed(40)
        .build()
        .unwrap();

    MossClient::submit(config).await.unwrap();

    let lines = lines_of(&service.transcript().await);
    assert_eq!(
        &lines[..6],
        &[
            "moss 12345\n",
            "directory 1\n",
            "X 1\n",
            "maxmatches 3\n",
            "show 40\n",
            "language python\n",
        ]
    );
}

#[tokio::test]
async fn test_submission_indices_follow_base_files() {
    let service = FakeService::start(Script::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let mut builder = builder_for(service.addr);
    for name in ["b1.py", "b2.py"] {
        builder = builder.add_base_file(write_file(&dir, name, 3)).unwrap();
    }
    for name in ["s1.py", "s2.py", "s3.py", "s4.py"] {
        builder = builder
            .add_submission_file(write_file(&dir, name, 4))
            .unwrap();
    }

    MossClient::submit(builder.build().unwrap()).await.unwrap();

    let indices: Vec<String> = lines_of(&service.transcript().await)
        .iter()
        .filter(|l| l.starts_with("file "))
        .map(|l| l.split(' ').nth(1).unwrap().to_string())
        .collect();
    assert_eq!(indices, ["0", "0", "1", "2", "3", "4"]);
}

#[tokio::test]
async fn test_comment_is_sent_verbatim() {
    let service = FakeService::start(Script::default()).await;
    let config = builder_for(service.addr)
        .comment("CS 101  -  lab\t4")
        .build()
        .unwrap();

    MossClient::submit(config).await.unwrap();

    let lines = lines_of(&service.transcript().await);
    assert!(lines.contains(&"query 0 CS 101  -  lab\t4\n".to_string()));
}

#[tokio::test]
async fn test_arbitrary_ack_text_proceeds() {
    let service = FakeService::start(Script {
        ack: Some("language accepted, carry on\n"),
        ..Script::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = three_file_config(service.addr, &dir);

    assert!(MossClient::submit(config).await.is_ok());
    let lines = lines_of(&service.transcript().await);
    assert_eq!(lines.iter().filter(|l| l.starts_with("file ")).count(), 3);
}

#[tokio::test]
async fn test_end_line_can_be_disabled() {
    let service = FakeService::start(Script::default()).await;
    let config = builder_for(service.addr)
        .limits(TransportLimits {
            send_end: false,
            ..TransportLimits::default()
        })
        .build()
        .unwrap();

    MossClient::submit(config).await.unwrap();

    let lines = lines_of(&service.transcript().await);
    assert_eq!(lines.last().unwrap(), "query 0 integration run\n");
}

#[tokio::test]
async fn test_explicit_lifecycle_and_double_close() {
    let service = FakeService::start(Script::default()).await;
    let config = builder_for(service.addr).build().unwrap();

    let mut client = MossClient::new(config);
    assert_eq!(client.state(), SessionState::Disconnected);
    client.open().await.unwrap();
    assert_eq!(client.state(), SessionState::Connected);

    let url = client.send().await.unwrap();
    assert!(url.starts_with("http://"));
    assert_eq!(client.state(), SessionState::ResponseReceived);

    client.close().await;
    client.close().await;
    assert_eq!(client.state(), SessionState::Closed);

    let log = service.transcript().await;
    assert_eq!(log.last(), Some(&line("end")));
}

#[tokio::test]
async fn test_result_is_trimmed_and_bounded() {
    let service = FakeService::start(Script {
        result: Some("  \r\nhttp://moss.stanford.edu/results/9/abcdef  \r\n"),
        ..Script::default()
    })
    .await;
    let config = builder_for(service.addr)
        .limits(TransportLimits {
            max_response_bytes: 4096,
            ..TransportLimits::default()
        })
        .build()
        .unwrap();

    let url = MossClient::submit(config).await.unwrap();
    assert_eq!(url, "http://moss.stanford.edu/results/9/abcdef");
    service.transcript().await;
}
