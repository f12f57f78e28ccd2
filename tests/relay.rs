use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use text_relay::{ChannelSink, ChatClient, DisplayEvent, FrameCodec, RelayServer};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_util::codec::Framed;

const WAIT: Duration = Duration::from_secs(3);

type Events = UnboundedReceiver<DisplayEvent>;
type RawPeer = Framed<TcpStream, FrameCodec>;

async fn start_server() -> (RelayServer, SocketAddr, Events) {
    let (sink, events) = ChannelSink::new();
    let server = RelayServer::new("127.0.0.1", Arc::new(sink));
    let addr = server.start(0).await.expect("server should start");
    (server, addr, events)
}

async fn start_client(addr: SocketAddr) -> (ChatClient, Events) {
    let (sink, mut events) = ChannelSink::new();
    let client = ChatClient::new(Arc::new(sink));
    client
        .connect("127.0.0.1", addr.port())
        .await
        .expect("client should connect");
    let connected = next_event(&mut events).await;
    assert_eq!(connected, DisplayEvent::system("Connected to server"));
    (client, events)
}

async fn raw_peer(addr: SocketAddr) -> RawPeer {
    Framed::new(
        TcpStream::connect(addr).await.expect("raw peer should connect"),
        FrameCodec::new(),
    )
}

async fn next_event(events: &mut Events) -> DisplayEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("sink closed")
}

/// Skip events until one matches
async fn expect_event(events: &mut Events, wanted: &DisplayEvent) {
    loop {
        if &next_event(events).await == wanted {
            return;
        }
    }
}

async fn next_frame(peer: &mut RawPeer) -> String {
    timeout(WAIT, peer.next())
        .await
        .expect("timed out waiting for frame")
        .expect("stream ended")
        .expect("frame should decode")
}

async fn wait_for_sessions(server: &RelayServer, count: usize) {
    timeout(WAIT, async {
        while server.session_count().await != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("registry never reached {count} sessions"));
}

#[tokio::test]
async fn message_reaches_every_other_client_verbatim() {
    let (server, addr, _server_events) = start_server().await;
    let (alice, mut alice_events) = start_client(addr).await;
    let mut bob = raw_peer(addr).await;
    let mut carol = raw_peer(addr).await;
    wait_for_sessions(&server, 3).await;

    alice.send("Alice", "hello there").await.unwrap();

    assert_eq!(next_frame(&mut bob).await, "Alice: hello there");
    assert_eq!(next_frame(&mut carol).await, "Alice: hello there");

    // Alice only sees her local echo, never her own frame relayed back.
    assert_eq!(
        next_event(&mut alice_events).await,
        DisplayEvent::new("Alice", "hello there", true)
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(alice_events.try_recv().is_err());

    alice.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn two_user_scenario() {
    let (server, addr, mut server_events) = start_server().await;

    let (user1, mut user1_events) = start_client(addr).await;
    wait_for_sessions(&server, 1).await;
    user1.send("User 1", "hi").await.unwrap();
    expect_event(&mut server_events, &DisplayEvent::new("User 1", "hi", false)).await;

    let (user2, _user2_events) = start_client(addr).await;
    wait_for_sessions(&server, 2).await;
    user2.send("User 2", "yo").await.unwrap();

    assert_eq!(
        next_event(&mut user1_events).await,
        DisplayEvent::new("User 1", "hi", true)
    );
    assert_eq!(
        next_event(&mut user1_events).await,
        DisplayEvent::new("User 2", "yo", false)
    );

    user1.disconnect().await;
    user2.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn exit_signal_removes_session_without_relay() {
    let (server, addr, mut server_events) = start_server().await;
    let (alice, _alice_events) = start_client(addr).await;
    let mut bob = raw_peer(addr).await;
    let mut carol = raw_peer(addr).await;
    wait_for_sessions(&server, 3).await;

    alice.leave("Alice").await;
    wait_for_sessions(&server, 2).await;
    expect_event(
        &mut server_events,
        &DisplayEvent::system("Client 127.0.0.1 has disconnected"),
    )
    .await;

    bob.send("Bob: still here").await.unwrap();
    assert_eq!(next_frame(&mut carol).await, "Bob: still here");

    server.broadcast("after exit").await;
    assert_eq!(next_frame(&mut bob).await, "Server: after exit");
    assert_eq!(next_frame(&mut carol).await, "Server: after exit");

    server.stop().await;
}

#[tokio::test]
async fn dropped_connection_is_unregistered() {
    let (server, addr, _server_events) = start_server().await;
    let dropped = raw_peer(addr).await;
    let mut bob = raw_peer(addr).await;
    let mut carol = raw_peer(addr).await;
    wait_for_sessions(&server, 3).await;

    drop(dropped);
    wait_for_sessions(&server, 2).await;

    bob.send("Bob: anyone?").await.unwrap();
    assert_eq!(next_frame(&mut carol).await, "Bob: anyone?");

    server.stop().await;
}

#[tokio::test]
async fn broadcast_during_disconnect_reaches_remaining_sessions() {
    let (server, addr, _server_events) = start_server().await;
    let mut peers = Vec::new();
    for _ in 0..5 {
        peers.push(raw_peer(addr).await);
    }
    wait_for_sessions(&server, 5).await;

    let leaving = peers.remove(0);
    let server = Arc::new(server);
    let broadcaster = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.broadcast("fan-out").await })
    };
    drop(leaving);

    timeout(WAIT, broadcaster)
        .await
        .expect("broadcast must not deadlock")
        .expect("broadcast must not panic");

    for peer in &mut peers {
        assert_eq!(next_frame(peer).await, "Server: fan-out");
    }

    wait_for_sessions(&server, 4).await;
    server.stop().await;
}

#[tokio::test]
async fn stop_disconnects_clients_once() {
    let (server, addr, mut server_events) = start_server().await;
    let (client, mut client_events) = start_client(addr).await;
    wait_for_sessions(&server, 1).await;

    server.stop().await;
    server.stop().await;
    assert!(!server.is_running());
    expect_event(&mut server_events, &DisplayEvent::system("Server stopped")).await;

    let lost = next_event(&mut client_events).await;
    assert!(lost.content.starts_with("Lost connection to server: "));
    assert!(!client.is_connected());

    client.disconnect().await;
    client.disconnect().await;

    assert!(matches!(
        client.send("Client", "anyone?").await,
        Err(text_relay::RelayError::NotConnected)
    ));
    assert_eq!(
        next_event(&mut client_events).await,
        DisplayEvent::system("Not connected to server")
    );
}

#[tokio::test]
async fn non_ascii_text_survives_the_relay() {
    let (server, addr, _server_events) = start_server().await;
    let (alice, _alice_events) = start_client(addr).await;
    let (_bob, mut bob_events) = start_client(addr).await;
    wait_for_sessions(&server, 2).await;

    alice.send("Zoë", "¿qué tal? 你好 \u{1F600}").await.unwrap();

    assert_eq!(
        next_event(&mut bob_events).await,
        DisplayEvent::new("Zoë", "¿qué tal? 你好 \u{1F600}", false)
    );

    server.stop().await;
}

#[tokio::test]
async fn stop_completes_with_a_peer_that_never_reads() {
    let (server, addr, _server_events) = start_server().await;
    let _stalled = TcpStream::connect(addr).await.expect("stalled peer should connect");
    let mut reader = raw_peer(addr).await;
    wait_for_sessions(&server, 2).await;

    let server = Arc::new(server);
    let flood = {
        let server = Arc::clone(&server);
        let payload = "x".repeat(60_000);
        tokio::spawn(async move {
            while server.is_running() {
                server.broadcast(&payload).await;
            }
        })
    };
    // Drain the healthy peer until the stalled one's buffers are full.
    let _ = timeout(Duration::from_millis(500), async {
        while reader.next().await.is_some() {}
    })
    .await;

    timeout(WAIT, server.stop())
        .await
        .expect("stop waited behind a peer that stopped reading");
    timeout(WAIT, flood)
        .await
        .expect("broadcast loop should end after stop")
        .expect("broadcast loop should not panic");
    assert_eq!(server.session_count().await, 0);
}
