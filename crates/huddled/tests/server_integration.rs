//! Integration tests for the TCP chat server.
//!
//! These tests drive a real `ChatServer` over loopback TCP, covering
//! onboarding, group commands, chat fan-out, disconnect cleanup, and
//! graceful shutdown.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.
//! We test the panic-free behavior of production code through assertions.

use std::net::SocketAddr;
use std::time::Duration;

use huddled::config::ServerConfig;
use huddled::registry::{spawn_registry, RegistryHandle, RemovalReason, SessionEvent};
use huddled::server::ChatServer;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for any single server reply
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to watch a connection to confirm nothing arrives
const SILENCE_WINDOW: Duration = Duration::from_millis(150);

/// Number of lines in the welcome text
const WELCOME_LINES: usize = 5;

const PROMPT: &str = "Please enter your username: ";

// ============================================================================
// Test Helpers
// ============================================================================

/// Test server context that manages server lifecycle.
struct TestServer {
    addr: SocketAddr,
    registry: RegistryHandle,
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Spawns a server on an ephemeral loopback port.
    async fn spawn() -> Self {
        Self::spawn_with(ServerConfig {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..ServerConfig::default()
        })
        .await
    }

    /// Spawns a server with a custom configuration.
    async fn spawn_with(config: ServerConfig) -> Self {
        let registry = spawn_registry(config.max_sessions);
        let cancel_token = CancellationToken::new();
        let server = ChatServer::new(config, registry.clone(), cancel_token.clone());

        let listener = server.bind().await.expect("bind test server");
        let addr = listener.local_addr().expect("local addr");

        let task = tokio::spawn(async move { server.serve(listener).await });

        TestServer {
            addr,
            registry,
            cancel_token,
            task,
        }
    }

    /// Opens a raw client connection.
    async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr)
            .await
            .expect("connect to server");
        TestClient::new(stream)
    }

    /// Connects and completes onboarding under `name`.
    async fn join_as(&self, name: &str) -> TestClient {
        let mut client = self.connect().await;
        client.onboard(name).await;
        client
    }

    /// Shuts the server down and waits for it to finish.
    async fn shutdown(self) {
        self.cancel_token.cancel();
        timeout(RECV_TIMEOUT, self.task)
            .await
            .expect("server should stop")
            .expect("server task should not panic");
    }
}

/// Test client connection with line helpers.
struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Sends one line to the server.
    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Receives one newline-terminated line from the server.
    async fn recv(&mut self) -> String {
        let mut line = String::new();
        timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for server")
            .unwrap();
        line
    }

    /// Receives the unterminated name prompt.
    async fn recv_prompt(&mut self) -> String {
        let mut buf = vec![0u8; PROMPT.len()];
        timeout(RECV_TIMEOUT, self.reader.read_exact(&mut buf))
            .await
            .expect("timed out waiting for prompt")
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    /// Reads the prompt, sends `name`, and consumes the welcome text.
    async fn onboard(&mut self, name: &str) -> Vec<String> {
        assert_eq!(self.recv_prompt().await, PROMPT);
        self.send(name).await;
        let mut welcome = Vec::with_capacity(WELCOME_LINES);
        for _ in 0..WELCOME_LINES {
            welcome.push(self.recv().await);
        }
        welcome
    }

    /// Asserts that nothing arrives within the silence window.
    async fn expect_silence(&mut self) {
        let mut buf = [0u8; 1];
        let pending = timeout(SILENCE_WINDOW, self.reader.read(&mut buf)).await;
        assert!(pending.is_err(), "unexpected data from server");
    }

    /// Waits for the server to close the connection.
    async fn expect_closed(&mut self) {
        let mut rest = Vec::new();
        let read = timeout(RECV_TIMEOUT, self.reader.read_to_end(&mut rest))
            .await
            .expect("server should close the connection");
        assert!(read.is_ok());
    }
}

/// Waits until the registry reports `count` removals.
async fn wait_for_removals(events: &mut broadcast::Receiver<SessionEvent>, count: usize) {
    let mut seen = 0;
    while seen < count {
        let event = timeout(RECV_TIMEOUT, events.recv())
            .await
            .expect("timed out waiting for removal")
            .unwrap();
        if matches!(event, SessionEvent::Removed { .. }) {
            seen += 1;
        }
    }
}

// ============================================================================
// Onboarding Tests
// ============================================================================

#[tokio::test]
async fn test_prompt_sent_on_connect() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    assert_eq!(client.recv_prompt().await, PROMPT);

    server.shutdown().await;
}

#[tokio::test]
async fn test_welcome_lists_commands() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    let welcome = client.onboard("Alice").await;

    assert_eq!(
        welcome[0],
        "Welcome Alice! You can use the following commands:\n"
    );
    for command in ["/users", "/join <group_name>", "/groups", "/leave"] {
        assert!(
            welcome.iter().any(|line| line.starts_with(command)),
            "welcome is missing {command}"
        );
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_identities_are_unique() {
    let server = TestServer::spawn().await;

    let mut clients = Vec::new();
    for i in 0..8 {
        clients.push(server.join_as(&format!("user{i}")).await);
    }

    let sessions = server.registry.get_all_sessions().await;
    assert_eq!(sessions.len(), 8);
    let mut ids: Vec<_> = sessions.iter().map(|s| s.id).collect();
    ids.dedup();
    assert_eq!(ids.len(), 8);

    server.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_names_are_allowed() {
    let server = TestServer::spawn().await;
    let _first = server.join_as("Alice").await;
    let mut second = server.join_as("Alice").await;

    second.send("/users").await;
    assert_eq!(second.recv().await, "Connected Users:\n");
    assert_eq!(second.recv().await, "1. Alice\n");
    assert_eq!(second.recv().await, "2. Alice\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_unnamed_session_is_not_listed() {
    let server = TestServer::spawn().await;
    let mut lurker = server.connect().await;
    lurker.recv_prompt().await;
    let mut alice = server.join_as("Alice").await;

    alice.send("/users").await;
    assert_eq!(alice.recv().await, "Connected Users:\n");
    assert_eq!(alice.recv().await, "1. Alice\n");

    // The unnamed session does not receive global chat either
    alice.send("anyone?").await;
    lurker.expect_silence().await;

    server.shutdown().await;
}

// ============================================================================
// Group Command Tests
// ============================================================================

#[tokio::test]
async fn test_group_users_listed_in_join_order() {
    let server = TestServer::spawn().await;
    let mut alice = server.join_as("Alice").await;
    let mut bob = server.join_as("Bob").await;

    alice.send("/join team").await;
    assert_eq!(alice.recv().await, "Created group team\n");
    bob.send("/join team").await;
    assert_eq!(bob.recv().await, "Successfully joined group team\n");

    alice.send("/users").await;
    assert_eq!(alice.recv().await, "Users connected to team:\n");
    assert_eq!(alice.recv().await, "1. Alice\n");
    assert_eq!(alice.recv().await, "2. Bob\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_groups_lists_member_counts() {
    let server = TestServer::spawn().await;
    let mut alice = server.join_as("Alice").await;
    let mut bob = server.join_as("Bob").await;
    let mut carol = server.join_as("Carol").await;

    alice.send("/join red").await;
    alice.recv().await;
    bob.send("/join blue").await;
    bob.recv().await;
    carol.send("/join blue").await;
    carol.recv().await;

    alice.send("/groups").await;
    assert_eq!(alice.recv().await, "Available Groups:\n");
    assert_eq!(alice.recv().await, "- blue (2 user/s)\n");
    assert_eq!(alice.recv().await, "- red (1 user/s)\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_leave_without_group() {
    let server = TestServer::spawn().await;
    let mut alice = server.join_as("Alice").await;

    alice.send("/leave").await;
    assert_eq!(alice.recv().await, "You are not part of any group.\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_join_twice_is_rejected() {
    let server = TestServer::spawn().await;
    let mut alice = server.join_as("Alice").await;

    alice.send("/join team").await;
    alice.recv().await;
    alice.send("/join other").await;
    assert_eq!(alice.recv().await, "You are already a part of a group.\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_rejoin_after_leave() {
    let server = TestServer::spawn().await;
    let mut alice = server.join_as("Alice").await;

    alice.send("/join team").await;
    assert_eq!(alice.recv().await, "Created group team\n");
    alice.send("/leave").await;
    assert_eq!(alice.recv().await, "You have left the group team\n");

    // The empty group is hidden but still exists
    alice.send("/groups").await;
    assert_eq!(alice.recv().await, "Available Groups:\n");
    alice.expect_silence().await;

    alice.send("/join team").await;
    assert_eq!(alice.recv().await, "Successfully joined group team\n");

    server.shutdown().await;
}

// ============================================================================
// Chat Tests
// ============================================================================

#[tokio::test]
async fn test_group_chat_stays_in_group() {
    let server = TestServer::spawn().await;
    let mut alice = server.join_as("Alice").await;
    let mut bob = server.join_as("Bob").await;
    let mut carol = server.join_as("Carol").await;

    alice.send("/join team").await;
    alice.recv().await;
    bob.send("/join team").await;
    bob.recv().await;

    alice.send("hello").await;

    assert_eq!(bob.recv().await, "[team] Alice: hello\n");
    carol.expect_silence().await;
    alice.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_global_chat_reaches_ungrouped_sessions() {
    let server = TestServer::spawn().await;
    let mut alice = server.join_as("Alice").await;
    let mut bob = server.join_as("Bob").await;
    let mut carol = server.join_as("Carol").await;

    carol.send("/join team").await;
    carol.recv().await;

    alice.send("hi all").await;

    assert_eq!(bob.recv().await, "[Global] Alice: hi all\n");
    // Global scope covers every named session, grouped or not
    assert_eq!(carol.recv().await, "[Global] Alice: hi all\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_crlf_lines_are_trimmed() {
    let server = TestServer::spawn().await;
    let mut alice = server.join_as("Alice").await;
    let mut bob = server.join_as("Bob").await;

    alice.send("/join team\r").await;
    assert_eq!(alice.recv().await, "Created group team\n");
    alice.send("/leave\r").await;
    alice.recv().await;

    alice.send("hey\r").await;
    assert_eq!(bob.recv().await, "[Global] Alice: hey\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_messages_in_one_packet_are_split() {
    let server = TestServer::spawn().await;
    let mut alice = server.join_as("Alice").await;
    let mut bob = server.join_as("Bob").await;

    alice
        .writer
        .write_all(b"one\ntwo\nthree\n")
        .await
        .unwrap();

    assert_eq!(bob.recv().await, "[Global] Alice: one\n");
    assert_eq!(bob.recv().await, "[Global] Alice: two\n");
    assert_eq!(bob.recv().await, "[Global] Alice: three\n");

    server.shutdown().await;
}

// ============================================================================
// Disconnect Tests
// ============================================================================

#[tokio::test]
async fn test_abrupt_disconnect_removes_member() {
    let server = TestServer::spawn().await;
    let mut events = server.registry.subscribe();
    let mut alice = server.join_as("Alice").await;
    let mut bob = server.join_as("Bob").await;

    alice.send("/join team").await;
    alice.recv().await;
    bob.send("/join team").await;
    bob.recv().await;

    drop(alice);
    wait_for_removals(&mut events, 1).await;

    bob.send("/users").await;
    assert_eq!(bob.recv().await, "Users connected to team:\n");
    assert_eq!(bob.recv().await, "1. Bob\n");
    bob.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_frees_registry_entries() {
    let server = TestServer::spawn().await;
    let mut events = server.registry.subscribe();

    for i in 0..5 {
        let mut client = server.join_as(&format!("user{i}")).await;
        client.send("/join crowd").await;
        client.recv().await;
    }
    wait_for_removals(&mut events, 5).await;

    assert!(server.registry.get_all_sessions().await.is_empty());
    assert!(server.registry.list_groups().await.unwrap().is_empty());

    server.shutdown().await;
}

// ============================================================================
// Shutdown Tests
// ============================================================================

#[tokio::test]
async fn test_shutdown_closes_clients() {
    let server = TestServer::spawn().await;
    let mut alice = server.join_as("Alice").await;
    let mut pending = server.connect().await;
    pending.recv_prompt().await;

    let registry = server.registry.clone();
    server.shutdown().await;

    alice.expect_closed().await;
    pending.expect_closed().await;
    assert!(registry.get_all_sessions().await.is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let server = TestServer::spawn().await;
    let addr = server.addr;
    server.shutdown().await;

    // Give the OS a moment to release the socket
    sleep(Duration::from_millis(20)).await;
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_shutdown_interrupts_broadcast_to_stalled_peer() {
    // No write timeout, and a grace period longer than the shutdown wait,
    // so only closing the stalled link can let the sender's task finish.
    let server = TestServer::spawn_with(ServerConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        write_timeout_ms: None,
        shutdown_grace_ms: 10_000,
        ..ServerConfig::default()
    })
    .await;
    let mut alice = server.join_as("Alice").await;
    let mut bob = server.join_as("Bob").await;

    // Bob never reads. Once his buffers fill, Alice's session blocks on the
    // write to him and stops reading, so her own sends back up too.
    let chunk = "z".repeat(4000);
    let mut backed_up = false;
    for _ in 0..5000 {
        if timeout(Duration::from_millis(200), alice.send(&chunk))
            .await
            .is_err()
        {
            backed_up = true;
            break;
        }
    }
    assert!(backed_up, "sender should block behind the stalled peer");

    let registry = server.registry.clone();
    server.shutdown().await;

    assert!(registry.get_all_sessions().await.is_empty());
    bob.expect_closed().await;
    alice.expect_closed().await;
}

#[tokio::test]
async fn test_shutdown_reason_recorded() {
    let server = TestServer::spawn().await;
    let mut events = server.registry.subscribe();
    let _alice = server.join_as("Alice").await;

    server.cancel_token.cancel();

    loop {
        let event = timeout(RECV_TIMEOUT, events.recv()).await.unwrap().unwrap();
        if let SessionEvent::Removed { reason, .. } = event {
            assert_eq!(reason, RemovalReason::Shutdown);
            break;
        }
    }

    timeout(RECV_TIMEOUT, server.task).await.unwrap().unwrap();
}
