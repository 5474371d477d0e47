//! Login handling: credentials in, authentication outcome out.

use super::account::Account;
use super::workers::{AccountJob, AccountWorkerPool, SubmitError};
use crate::connection::ConnectionManager;
use crate::messaging::{ClientCommand, Inbound, LoginRequest, ServerEvent, AUTH_EVENTS};
use dashmap::DashSet;
use lodestone_core::{ConnectionId, Mail, Mailbox, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Result of checking a set of credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success(Account),
    AccountNotFound,
    PasswordMismatch,
    /// The workers were saturated or did not answer in time.
    TimedOut,
    /// The repository failed.
    FetchError(String),
}

impl AuthOutcome {
    /// Text of the rejection sent to the client, or `None` on success.
    pub fn rejection_reason(&self) -> Option<&'static str> {
        match self {
            AuthOutcome::Success(_) => None,
            AuthOutcome::AccountNotFound | AuthOutcome::PasswordMismatch => Some("invalid credentials"),
            AuthOutcome::TimedOut => Some("request timed out"),
            AuthOutcome::FetchError(_) => Some("internal server error"),
        }
    }
}

/// Checks credentials against the repository through the worker pool.
#[derive(Debug)]
pub struct Authenticator {
    workers: AccountWorkerPool,
    fetch_timeout: Duration,
}

impl Authenticator {
    pub fn new(workers: AccountWorkerPool, fetch_timeout: Duration) -> Self {
        Self { workers, fetch_timeout }
    }

    /// Authenticates `request`.
    ///
    /// A request that cannot be queued within the pool's consume timeout never
    /// reaches the repository and yields [`AuthOutcome::TimedOut`].
    pub async fn authenticate(&self, request: &LoginRequest) -> AuthOutcome {
        let (respond_to, response) = oneshot::channel();
        let job = AccountJob::FindByUsername {
            username: request.username.clone(),
            respond_to,
        };
        match self.workers.submit(job).await {
            Ok(()) => {}
            Err(SubmitError::Timeout) => return AuthOutcome::TimedOut,
            Err(e @ SubmitError::Closed) => return AuthOutcome::FetchError(e.to_string()),
        }

        match timeout(self.fetch_timeout, response).await {
            Err(_) => AuthOutcome::TimedOut,
            Ok(Err(_)) => AuthOutcome::FetchError("account worker dropped the request".to_string()),
            Ok(Ok(Err(e))) => AuthOutcome::FetchError(e.to_string()),
            Ok(Ok(Ok(None))) => AuthOutcome::AccountNotFound,
            Ok(Ok(Ok(Some(account)))) => {
                if account.verify_password(&request.password) {
                    AuthOutcome::Success(account)
                } else {
                    AuthOutcome::PasswordMismatch
                }
            }
        }
    }

    pub fn shutdown(self) {
        self.workers.shutdown();
    }
}

/// Consumes `auth.login` and answers every request on its own task.
///
/// Accepted clients are announced on `auth.events`; the simulation turns them
/// into sessions. Rejected clients get a `LoginRejected` and are disconnected.
///
/// At most `max_pending_logins` requests are authenticated at once. A request
/// beyond that is rejected as timed out, and a second login from a connection
/// whose first one is still pending is ignored.
pub struct LoginService {
    authenticator: Arc<Authenticator>,
    router: Arc<Router<Inbound>>,
    connections: Arc<ConnectionManager>,
    permits: Arc<Semaphore>,
    pending: Arc<DashSet<ConnectionId>>,
}

impl LoginService {
    pub fn new(
        authenticator: Arc<Authenticator>,
        router: Arc<Router<Inbound>>,
        connections: Arc<ConnectionManager>,
        max_pending_logins: usize,
    ) -> Self {
        Self {
            authenticator,
            router,
            connections,
            permits: Arc::new(Semaphore::new(max_pending_logins.max(1))),
            pending: Arc::new(DashSet::new()),
        }
    }

    /// Serves login mail until the mailbox closes.
    pub async fn run(self, mut mailbox: Mailbox<Inbound>) {
        info!("🔐 Login service started");
        while let Some(mail) = mailbox.recv().await {
            let Mail { client, payload, .. } = &mail;
            let client = *client;
            match payload {
                Inbound::Command(ClientCommand::Login(request)) => {
                    if self.pending.contains(&client) {
                        debug!("Connection {} already has a login pending", client);
                        continue;
                    }
                    let Ok(permit) = self.permits.clone().try_acquire_owned() else {
                        warn!("🚦 Too many pending logins, turning connection {} away", client);
                        conclude(client, &request.username, AuthOutcome::TimedOut, &self.router, &self.connections).await;
                        continue;
                    };
                    self.pending.insert(client);

                    let request = request.clone();
                    let expired = mail.is_expired();
                    let authenticator = self.authenticator.clone();
                    let router = self.router.clone();
                    let connections = self.connections.clone();
                    let pending = self.pending.clone();
                    tokio::spawn(async move {
                        let outcome = if expired {
                            AuthOutcome::TimedOut
                        } else {
                            authenticator.authenticate(&request).await
                        };
                        conclude(client, &request.username, outcome, &router, &connections).await;
                        pending.remove(&client);
                        drop(permit);
                    });
                }
                other => debug!("Login service ignoring {:?} from connection {}", other, client),
            }
        }
        info!("🔐 Login service stopped");
    }
}

async fn conclude(
    client: ConnectionId,
    username: &str,
    outcome: AuthOutcome,
    router: &Router<Inbound>,
    connections: &ConnectionManager,
) {
    let reason = match outcome {
        AuthOutcome::Success(account) => {
            info!("✅ Connection {} authenticated as '{}'", client, account.username);
            if router.publish(AUTH_EVENTS, Mail::new(client, Inbound::Authenticated(account))).await {
                return;
            }
            error!("Could not hand connection {} to the simulation", client);
            "internal server error"
        }
        AuthOutcome::FetchError(ref e) => {
            error!("Account lookup for '{}' failed: {}", username, e);
            "internal server error"
        }
        ref other => {
            warn!("🚫 Login for '{}' on connection {} rejected: {:?}", username, client, other);
            other.rejection_reason().unwrap_or("internal server error")
        }
    };

    let Some(connection) = connections.get(client) else {
        debug!("Connection {} left before its login was answered", client);
        return;
    };
    connection.send(ServerEvent::rejected(reason).to_packet());
    connection.flush();
    connection.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccountId, AccountRepository, InMemoryAccountRepository, RepositoryError};
    use crate::config::AccountConfig;
    use crate::connection::Outbound;
    use crate::messaging::AUTH_LOGIN;
    use async_trait::async_trait;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tokio::time::sleep;

    /// Takes a while per lookup and records how many ran at the same time.
    #[derive(Default)]
    struct SlowRepository {
        calls: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl AccountRepository for SlowRepository {
        async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            sleep(Duration::from_millis(200)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(Some(Account::new(AccountId(1), username, "secret")))
        }
    }

    struct LoginHarness {
        router: Arc<Router<Inbound>>,
        connections: Arc<ConnectionManager>,
        events: Mailbox<Inbound>,
    }

    async fn start_service(repository: Arc<SlowRepository>, max_pending_logins: usize) -> LoginHarness {
        let config = AccountConfig {
            workers: 4,
            job_queue_capacity: 16,
            job_consume_timeout_ms: 100,
            fetch_timeout_ms: 10_000,
            max_pending_logins,
        };
        let authenticator = Arc::new(Authenticator::new(
            AccountWorkerPool::start(repository, &config),
            config.fetch_timeout(),
        ));
        let router = Arc::new(Router::new(Default::default()));
        let connections = Arc::new(ConnectionManager::new());
        let mailbox = router.subscribe(AUTH_LOGIN).await;
        let events = router.subscribe(AUTH_EVENTS).await;
        let service = LoginService::new(authenticator, router.clone(), connections.clone(), max_pending_logins);
        tokio::spawn(service.run(mailbox));
        LoginHarness {
            router,
            connections,
            events,
        }
    }

    fn connect(connections: &ConnectionManager) -> (ConnectionId, mpsc::Receiver<Outbound>) {
        let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let (connection, outbound) = connections.register(addr, 8);
        (connection.id(), outbound)
    }

    async fn submit(router: &Router<Inbound>, client: ConnectionId, username: &str) {
        let mail = Mail::new(client, Inbound::Command(ClientCommand::Login(login(username, "secret"))));
        assert!(router.publish(AUTH_LOGIN, mail).await);
    }

    fn rejection(outbound: &mut mpsc::Receiver<Outbound>) -> Option<ServerEvent> {
        match outbound.try_recv() {
            Ok(Outbound::Packet(packet)) => ServerEvent::from_packet(&packet).ok(),
            _ => None,
        }
    }

    fn authenticator() -> Authenticator {
        let repository = Arc::new(InMemoryAccountRepository::new());
        repository.insert("ada", "lovelace");
        let config = AccountConfig {
            workers: 1,
            job_queue_capacity: 4,
            job_consume_timeout_ms: 100,
            fetch_timeout_ms: 1000,
            max_pending_logins: 8,
        };
        Authenticator::new(AccountWorkerPool::start(repository, &config), config.fetch_timeout())
    }

    fn login(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn outcomes_cover_each_credential_case() {
        let authenticator = authenticator();

        assert!(matches!(
            authenticator.authenticate(&login("ada", "lovelace")).await,
            AuthOutcome::Success(account) if account.username == "ada"
        ));
        assert_eq!(authenticator.authenticate(&login("ada", "nope")).await, AuthOutcome::PasswordMismatch);
        assert_eq!(authenticator.authenticate(&login("eve", "x")).await, AuthOutcome::AccountNotFound);
        authenticator.shutdown();
    }

    #[test]
    fn rejection_reasons() {
        assert_eq!(AuthOutcome::AccountNotFound.rejection_reason(), Some("invalid credentials"));
        assert_eq!(AuthOutcome::PasswordMismatch.rejection_reason(), Some("invalid credentials"));
        assert_eq!(AuthOutcome::TimedOut.rejection_reason(), Some("request timed out"));
        assert_eq!(
            AuthOutcome::FetchError("disk".into()).rejection_reason(),
            Some("internal server error")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn logins_beyond_the_pending_limit_are_turned_away() {
        let repository = Arc::new(SlowRepository::default());
        let mut h = start_service(repository.clone(), 2).await;

        let mut clients = Vec::new();
        for n in 0..5 {
            let (id, outbound) = connect(&h.connections);
            submit(&h.router, id, &format!("player{n}")).await;
            clients.push(outbound);
        }

        for _ in 0..2 {
            let mail = h.events.recv().await.expect("login service running");
            assert!(matches!(mail.payload, Inbound::Authenticated(_)));
        }
        assert_eq!(repository.calls.load(Ordering::SeqCst), 2);
        assert_eq!(repository.peak.load(Ordering::SeqCst), 2);

        let turned_away = clients
            .iter_mut()
            .map(|outbound| rejection(outbound))
            .filter(|event| *event == Some(ServerEvent::rejected("request timed out")))
            .count();
        assert_eq!(turned_away, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pipelined_logins_from_one_connection_run_once() {
        let repository = Arc::new(SlowRepository::default());
        let mut h = start_service(repository.clone(), 8).await;
        let (id, mut outbound) = connect(&h.connections);

        for _ in 0..5 {
            submit(&h.router, id, "ada").await;
        }

        let mail = h.events.recv().await.expect("login service running");
        assert_eq!(mail.client, id);
        assert!(matches!(mail.payload, Inbound::Authenticated(_)));
        sleep(Duration::from_secs(1)).await;
        assert_eq!(repository.calls.load(Ordering::SeqCst), 1);
        assert_eq!(repository.peak.load(Ordering::SeqCst), 1);
        assert!(outbound.try_recv().is_err());
    }
}
