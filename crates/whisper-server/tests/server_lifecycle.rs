//! Server-level integration tests: binding, concurrent connections, and
//! recovery from a malformed request on one connection without disturbing
//! another.

use tempfile::tempdir;
use whisper_crypto::generate_keypair;
use whisper_server::{Server, ServerConfig};

async fn start_server() -> std::net::SocketAddr {
    let dir = tempdir().unwrap();
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        data_dir: dir.keep(),
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

#[tokio::test]
async fn binds_to_an_ephemeral_port_and_reports_it() {
    let addr = start_server().await;
    assert_ne!(addr.port(), 0);
}

#[tokio::test]
async fn two_connections_serve_concurrently_without_interfering() {
    let addr = start_server().await;

    let alice_key = generate_keypair(512).unwrap();
    let bob_key = generate_keypair(512).unwrap();

    let alice = whisper_client::Client::connect("127.0.0.1", addr.port(), "alice", alice_key)
        .await
        .unwrap();
    let bob =
        whisper_client::Client::connect("127.0.0.1", addr.port(), "bob", bob_key).await.unwrap();

    let (alice_result, bob_result) =
        tokio::join!(alice.create_note("a-title", "a-body"), bob.create_note("b-title", "b-body"));
    alice_result.unwrap();
    bob_result.unwrap();

    let alice_notes = alice.list_notes().await.unwrap();
    let bob_notes = bob.list_notes().await.unwrap();
    assert_eq!(alice_notes.len(), 1);
    assert_eq!(alice_notes[0].title, "a-title");
    assert_eq!(bob_notes.len(), 1);
    assert_eq!(bob_notes[0].title, "b-title");
}

#[tokio::test]
async fn a_connection_surviving_bad_requests_does_not_affect_a_second_connection() {
    let addr = start_server().await;

    let carol_key = generate_keypair(512).unwrap();
    let carol =
        whisper_client::Client::connect("127.0.0.1", addr.port(), "carol", carol_key).await.unwrap();

    // Requesting a note that does not exist is a per-request error, not a
    // connection-ending one; the connection must stay usable afterward.
    let missing = carol.get_note(999).await;
    assert!(missing.is_err());
    carol.create_note("still-alive", "yes").await.unwrap();

    let dave_key = generate_keypair(512).unwrap();
    let dave =
        whisper_client::Client::connect("127.0.0.1", addr.port(), "dave", dave_key).await.unwrap();
    dave.create_note("unrelated", "fine").await.unwrap();
}
