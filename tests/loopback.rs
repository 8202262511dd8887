//! End-to-end loopback tests: full handshake, data exchange through the
//! link tasks, and both teardown outcomes.

use std::time::Duration;

use srudp::prelude::*;
use srudp::transport;

async fn establish() -> (Link, Link) {
    let setup = async {
        let server_socket = PeerSocket::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = server_socket.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let session = transport::listen(&server_socket, Proposal::default())
                .await
                .unwrap();
            Link::spawn(server_socket, session)
        });

        let client_socket = PeerSocket::connect(addr).await.unwrap();
        let session = transport::connect(&client_socket, Proposal::default())
            .await
            .unwrap();
        let client = Link::spawn(client_socket, session);

        (server.await.unwrap(), client)
    };
    // A handshake regression must fail the suite, not hang it.
    tokio::time::timeout(Duration::from_secs(5), setup)
        .await
        .expect("handshake stalled")
}

#[tokio::test]
async fn test_handshake_completes_with_default_proposals() {
    // The default 32-byte payload proposal exceeds the fixed 16-byte
    // handshake payload region; the exchange must still complete.
    let server_socket = PeerSocket::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = server_socket.local_addr().unwrap();

    let server = tokio::spawn(async move {
        transport::listen(&server_socket, Proposal::default())
            .await
            .unwrap()
    });
    let client_socket = PeerSocket::connect(addr).await.unwrap();

    let handshakes = async {
        let client = transport::connect(&client_socket, Proposal::default())
            .await
            .unwrap();
        (server.await.unwrap(), client)
    };
    let (server_session, client_session) =
        tokio::time::timeout(Duration::from_secs(5), handshakes)
            .await
            .expect("handshake stalled");

    assert_eq!(client_session.negotiated, server_session.negotiated);
    assert_eq!(client_session.negotiated.payload, 32);
    assert_eq!(client_session.negotiated.window, 16);
}

#[tokio::test]
async fn test_bidirectional_exchange_and_clean_teardown() {
    let (mut server, mut client) = establish().await;

    // 100 bytes against a 32-byte payload: four fragments, one message.
    let request: Vec<u8> = (0..100u8).collect();
    client.send(request.clone()).await.unwrap();

    let received = server.next_message().await.unwrap();
    assert_eq!(received, request);

    server.send("acknowledged, over").await.unwrap();
    let reply = client.next_message().await.unwrap();
    assert_eq!(reply, b"acknowledged, over");

    client.close().await.unwrap();
    let client_end = client.join().await.unwrap();
    let server_end = server.join().await.unwrap();
    assert_eq!(client_end, Teardown::Clean);
    assert_eq!(server_end, Teardown::Clean);
}

#[tokio::test]
async fn test_many_messages_arrive_in_order() {
    let (mut server, client) = establish().await;

    let messages: Vec<Vec<u8>> = (0..20)
        .map(|i| format!("message number {i} with some body text").into_bytes())
        .collect();
    for message in &messages {
        client.send(message.clone()).await.unwrap();
    }

    for expected in &messages {
        let got = server.next_message().await.unwrap();
        assert_eq!(&got, expected);
    }

    client.close().await.unwrap();
    assert_eq!(client.join().await.unwrap(), Teardown::Clean);
    assert_eq!(server.join().await.unwrap(), Teardown::Clean);
}

#[tokio::test]
async fn test_delivery_survives_fault_injection() {
    let server_socket = PeerSocket::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = server_socket.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let session = transport::listen(&server_socket, Proposal::default())
            .await
            .unwrap();
        Link::spawn(server_socket, session)
    });

    let mut client_socket = PeerSocket::connect(addr).await.unwrap();
    let session = transport::connect(&client_socket, Proposal::default())
        .await
        .unwrap();
    // Handshake ran clean; from here, a third of the client's datagrams
    // get dropped or corrupted and the ARQ engine has to recover.
    client_socket.set_fault(FaultPlan::new(30));
    let client = Link::spawn(client_socket, session);
    let mut server = server.await.unwrap();

    let messages: Vec<Vec<u8>> = (0..10)
        .map(|i| format!("lossy channel message {i}").into_bytes())
        .collect();
    for message in &messages {
        client.send(message.clone()).await.unwrap();
    }

    let deadline = Duration::from_secs(30);
    for expected in &messages {
        let got = tokio::time::timeout(deadline, server.next_message())
            .await
            .expect("delivery stalled")
            .unwrap();
        assert_eq!(&got, expected);
    }

    client.close().await.unwrap();
    client.join().await.unwrap();
    server.join().await.unwrap();
}

#[tokio::test]
async fn test_close_against_silent_peer_times_out() {
    let server_socket = PeerSocket::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = server_socket.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let session = transport::listen(&server_socket, Proposal::default())
            .await
            .unwrap();
        // Keep the socket open but never service it again.
        (server_socket, session)
    });

    let mut client_socket = PeerSocket::connect(addr).await.unwrap();
    client_socket.set_timeout(Duration::from_millis(10));
    let session = transport::connect(&client_socket, Proposal::default())
        .await
        .unwrap();
    let client = Link::spawn(client_socket, session);
    let _hold = server.await.unwrap();

    client.close().await.unwrap();
    assert_eq!(client.join().await.unwrap(), Teardown::TimedOut);
}
