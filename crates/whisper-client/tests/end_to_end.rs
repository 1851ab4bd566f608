//! End-to-end scenarios against a real in-process server.

use std::net::SocketAddr;

use tempfile::tempdir;
use whisper_crypto::generate_keypair;
use whisper_server::{Server, ServerConfig};

async fn start_server() -> SocketAddr {
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
async fn s1_auth_round_trip() {
    let addr = start_server().await;
    let key = generate_keypair(512).unwrap();

    let client = whisper_client::Client::connect(
        "127.0.0.1",
        addr.port(),
        "alice",
        key.clone(),
    )
    .await
    .unwrap();
    drop(client);

    // reconnect with the same key: succeeds
    whisper_client::Client::connect("127.0.0.1", addr.port(), "alice", key).await.unwrap();

    // reconnect with a different key: fails
    let other_key = generate_keypair(512).unwrap();
    let result =
        whisper_client::Client::connect("127.0.0.1", addr.port(), "alice", other_key).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn s2_note_lifecycle() {
    let addr = start_server().await;
    let key = generate_keypair(512).unwrap();
    let client =
        whisper_client::Client::connect("127.0.0.1", addr.port(), "alice", key).await.unwrap();

    client.create_note("Groceries", "eggs\nmilk").await.unwrap();

    let notes = client.list_notes().await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, 0);
    assert_eq!(notes[0].title, "Groceries");

    let (title, body) = client.get_note(0).await.unwrap();
    assert_eq!(title, "Groceries");
    assert_eq!(body, "eggs\nmilk");
}

#[tokio::test]
async fn s3_directory_and_message() {
    let addr = start_server().await;

    let bob_key = generate_keypair(512).unwrap();
    let alice_key = generate_keypair(512).unwrap();

    // alice authenticates first so she's a known recipient.
    {
        let alice =
            whisper_client::Client::connect("127.0.0.1", addr.port(), "alice", alice_key.clone())
                .await
                .unwrap();
        drop(alice);
    }

    let bob =
        whisper_client::Client::connect("127.0.0.1", addr.port(), "bob", bob_key).await.unwrap();
    let alice_public = bob.get_key("alice").await.unwrap();
    assert_eq!(
        alice_public.n,
        whisper_crypto::PublicKeyInfo::from(&alice_key.to_public_key()).n
    );

    bob.send_message("alice", "hello").await.unwrap();
    drop(bob);

    let alice =
        whisper_client::Client::connect("127.0.0.1", addr.port(), "alice", alice_key).await.unwrap();
    let messages = alice.list_messages().await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].from, "bob");

    let (from, text) = alice.get_message(0).await.unwrap();
    assert_eq!(from, "bob");
    assert_eq!(text, "hello");
}

#[tokio::test]
async fn s4_unknown_kind_does_not_kill_connection() {
    use whisper_proto::{Envelope, Payload, envelope};

    let addr = start_server().await;
    let key = generate_keypair(512).unwrap();

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let public: whisper_crypto::PublicKeyInfo = (&key.to_public_key()).into();
    envelope::write(
        &mut stream,
        0,
        &Payload::Auth(whisper_proto::payloads::AuthRequest { nick: "carol".into(), key: public }),
    )
    .await
    .unwrap();

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = whisper_proto::EnvelopeReader::new(read_half);
    let auth_response = reader.read_envelope().await.unwrap();
    assert_eq!(auth_response.id, 0);

    let crafted = Envelope { id: 1, kind: "nonsense".to_string(), body: serde_json::Value::Null };
    let bytes = serde_json::to_vec(&crafted).unwrap();
    use tokio::io::AsyncWriteExt;
    write_half.write_all(&bytes).await.unwrap();
    write_half.flush().await.unwrap();

    let error_response = reader.read_envelope().await.unwrap();
    assert_eq!(error_response.id, 1);
    assert!(matches!(error_response.open().unwrap(), Payload::Error(_)));

    envelope::write(
        &mut write_half,
        2,
        &Payload::ListNotesRequest(whisper_proto::payloads::ListNotesRequest {}),
    )
    .await
    .unwrap();
    let ok_response = reader.read_envelope().await.unwrap();
    assert_eq!(ok_response.id, 2);
    assert!(matches!(ok_response.open().unwrap(), Payload::ListNotesResponse(_)));
}
