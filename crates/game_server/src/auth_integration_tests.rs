//! End-to-end login tests over real TCP connections.

use crate::auth::{Account, AccountId, AccountRepository, InMemoryAccountRepository, RepositoryError};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::messaging::{ClientCommand, LoginRequest, Ping, ServerEvent};
use crate::server::GameServer;
use crate::session::SessionRegistry;
use async_trait::async_trait;
use lodestone_core::codec::{read_packet, write_packet};
use lodestone_core::ShutdownState;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

struct RunningServer {
    addr: SocketAddr,
    sessions: Arc<SessionRegistry>,
    shutdown: ShutdownState,
    task: JoinHandle<Result<(), ServerError>>,
}

impl RunningServer {
    async fn start(config: ServerConfig, repository: Arc<dyn AccountRepository>) -> Self {
        let server = GameServer::with_repository(config, repository);
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let sessions = server.sessions().clone();
        let shutdown = ShutdownState::new();
        let state = shutdown.clone();
        let task = tokio::spawn(async move { server.serve(listener, state).await });
        Self {
            addr,
            sessions,
            shutdown,
            task,
        }
    }

    async fn stop(self) {
        self.shutdown.initiate_shutdown();
        timeout(Duration::from_secs(10), self.task).await.unwrap().unwrap().unwrap();
    }
}

fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.bind_address = "127.0.0.1:0".parse().unwrap();
    config.simulation.tick_interval_ms = 10;
    config
}

async fn send(stream: &mut TcpStream, command: ClientCommand) {
    write_packet(stream, &command.to_packet()).await.unwrap();
    stream.flush().await.unwrap();
}

async fn login(addr: SocketAddr, username: &str, password: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    send(
        &mut stream,
        ClientCommand::Login(LoginRequest {
            username: username.into(),
            password: password.into(),
        }),
    )
    .await;
    stream
}

async fn next_event(stream: &mut TcpStream) -> Option<ServerEvent> {
    let packet = timeout(READ_TIMEOUT, read_packet(stream, 4096)).await.unwrap().unwrap()?;
    Some(ServerEvent::from_packet(&packet).unwrap())
}

/// Answers lookups only after a long pause and counts how often it was asked.
struct StallingRepository {
    calls: AtomicUsize,
}

#[async_trait]
impl AccountRepository for StallingRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        sleep(Duration::from_secs(30)).await;
        Ok(Some(Account::new(AccountId(1), username, "secret")))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn successful_login_registers_a_session() {
    let repository = Arc::new(InMemoryAccountRepository::new());
    repository.insert("ada", "lovelace");
    let server = RunningServer::start(test_config(), repository).await;

    let mut stream = login(server.addr, "ada", "lovelace").await;
    let entity = match next_event(&mut stream).await {
        Some(ServerEvent::LoginAccepted { entity }) => entity,
        other => panic!("expected LoginAccepted, got {other:?}"),
    };
    assert_eq!(server.sessions.len(), 1);
    assert_eq!(server.sessions.snapshot()[0].entity(), entity);

    send(&mut stream, ClientCommand::Ping(Ping { nonce: 9 })).await;
    assert_eq!(next_event(&mut stream).await, Some(ServerEvent::Pong { nonce: 9 }));

    server.stop().await;
    assert_eq!(next_event(&mut stream).await, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_account_is_rejected_and_disconnected() {
    let server = RunningServer::start(test_config(), Arc::new(InMemoryAccountRepository::new())).await;

    let mut stream = login(server.addr, "nobody", "whatever").await;
    assert_eq!(next_event(&mut stream).await, Some(ServerEvent::rejected("invalid credentials")));
    assert_eq!(next_event(&mut stream).await, None);
    assert!(server.sessions.is_empty());

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_password_is_rejected() {
    let repository = Arc::new(InMemoryAccountRepository::new());
    repository.insert("ada", "lovelace");
    let server = RunningServer::start(test_config(), repository).await;

    let mut stream = login(server.addr, "ada", "babbage").await;
    assert_eq!(next_event(&mut stream).await, Some(ServerEvent::rejected("invalid credentials")));
    assert_eq!(next_event(&mut stream).await, None);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn saturated_account_workers_time_the_login_out() {
    let mut config = test_config();
    config.accounts.workers = 1;
    config.accounts.job_queue_capacity = 1;
    config.accounts.job_consume_timeout_ms = 100;
    config.accounts.fetch_timeout_ms = 10_000;
    let repository = Arc::new(StallingRepository {
        calls: AtomicUsize::new(0),
    });
    let server = RunningServer::start(config, repository.clone()).await;

    // The only worker stalls on the first lookup; the second fills the queue.
    let _busy = login(server.addr, "first", "secret").await;
    sleep(Duration::from_millis(100)).await;
    let _queued = login(server.addr, "second", "secret").await;
    sleep(Duration::from_millis(100)).await;
    assert_eq!(repository.calls.load(Ordering::SeqCst), 1);

    let mut stream = login(server.addr, "third", "secret").await;
    assert_eq!(next_event(&mut stream).await, Some(ServerEvent::rejected("request timed out")));
    assert_eq!(next_event(&mut stream).await, None);
    assert_eq!(repository.calls.load(Ordering::SeqCst), 1);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn garbage_framing_drops_the_connection() {
    let server = RunningServer::start(test_config(), Arc::new(InMemoryAccountRepository::new())).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    // Kind 1 followed by a length whose fifth byte still has the continuation bit.
    stream.write_all(&[1, 0xff, 0xff, 0xff, 0xff, 0xff]).await.unwrap();
    stream.flush().await.unwrap();
    assert_eq!(next_event(&mut stream).await, None);

    server.stop().await;
}
