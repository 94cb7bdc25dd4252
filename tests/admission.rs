//! Integration tests for capacity-bounded admission and the FIFO queue.

mod common;
use common::{ChannelSpec, TestClient, TestServer};

const QUEUED_AT_HEAD: &str = "there are 0 user(s) ahead of you.";

async fn fill(port: u16, prefix: &str, count: usize) -> Vec<TestClient> {
    let mut clients = Vec::with_capacity(count);
    for i in 0..count {
        let client = TestClient::join(port, &format!("{prefix}{i}"))
            .await
            .expect("member should be welcomed");
        clients.push(client);
    }
    clients
}

#[tokio::test]
async fn test_sixth_client_waits_then_is_promoted() {
    let port = 17101;
    let _server = TestServer::spawn(&[ChannelSpec::new("general", port, 5)])
        .await
        .expect("Failed to spawn test server");

    let mut members = fill(port, "user", 5).await;

    let mut sixth = TestClient::join(port, "late").await.expect("connect sixth");
    sixth
        .expect(QUEUED_AT_HEAD)
        .await
        .expect("sixth client should be told it heads the queue");

    members[0].send("/list").await.unwrap();
    members[0]
        .expect("[ Channel ] general 5/5/1")
        .await
        .expect("list should show a full channel with one queued");

    members[0].send("/quit").await.unwrap();
    members[1]
        .expect_all(&["user0 has left the channel.", "late has joined the channel."])
        .await
        .expect("queued client should be promoted into the freed slot");

    members[1].send("/list").await.unwrap();
    members[1]
        .expect("[ Channel ] general 5/5/0")
        .await
        .expect("queue should be empty after promotion");
}

#[tokio::test]
async fn test_queue_is_first_in_first_out() {
    let port = 17102;
    let _server = TestServer::spawn(&[ChannelSpec::new("general", port, 5)])
        .await
        .expect("Failed to spawn test server");

    let mut members = fill(port, "m", 5).await;

    let mut first = TestClient::join(port, "first").await.unwrap();
    first.expect(QUEUED_AT_HEAD).await.unwrap();
    let mut second = TestClient::join(port, "second").await.unwrap();
    second
        .expect("there are 1 user(s) ahead of you.")
        .await
        .unwrap();

    members[0].send("/quit").await.unwrap();
    let seen = members[4]
        .recv_until(|line| line.contains("has joined the channel."))
        .await
        .unwrap();
    assert!(
        seen.last().unwrap().contains("first has joined the channel."),
        "expected first to be admitted before second, got {seen:?}"
    );

    second
        .expect(QUEUED_AT_HEAD)
        .await
        .expect("second should move to the head of the queue");

    members[1].send("/quit").await.unwrap();
    members[4]
        .expect("second has joined the channel.")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_duplicate_username_is_rejected_and_closed() {
    let port = 17103;
    let _server = TestServer::spawn(&[ChannelSpec::new("general", port, 5)])
        .await
        .expect("Failed to spawn test server");

    let mut alice = TestClient::join(port, "alice").await.unwrap();

    let mut imposter = TestClient::connect(port, "alice").await.unwrap();
    let lines = imposter.expect_closed().await.unwrap();
    assert_eq!(lines.len(), 1, "got {lines:?}");
    assert!(lines[0].ends_with("Cannot connect to the general channel."));

    // The first alice is untouched.
    alice.send("/list").await.unwrap();
    alice.expect("[ Channel ] general 1/5/0").await.unwrap();
}

#[tokio::test]
async fn test_username_with_separator_is_rejected() {
    let port = 17104;
    let _server = TestServer::spawn(&[ChannelSpec::new("general", port, 5)])
        .await
        .expect("Failed to spawn test server");

    let mut client = TestClient::connect(port, "general:bob").await.unwrap();
    let lines = client.expect_closed().await.unwrap();
    assert!(lines.iter().any(|l| l.ends_with("Cannot connect to the general channel.")));
}

#[tokio::test]
async fn test_queued_client_disconnect_leaves_queue() {
    let port = 17105;
    let _server = TestServer::spawn(&[ChannelSpec::new("general", port, 5)])
        .await
        .expect("Failed to spawn test server");

    let mut members = fill(port, "m", 5).await;
    let mut waiting = TestClient::join(port, "waiting").await.unwrap();
    waiting.expect(QUEUED_AT_HEAD).await.unwrap();
    drop(waiting);

    // Give the server a moment to notice the closed socket.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    members[0].send("/list").await.unwrap();
    members[0].expect("[ Channel ] general 5/5/0").await.unwrap();
}
