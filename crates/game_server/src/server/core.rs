//! Core game server implementation.
//!
//! This module contains the main `GameServer` struct, which wires the pulse,
//! the simulation task, the router, the login service and the TCP accept loop
//! together and tears them down again in order.

use crate::{
    auth::{AccountRepository, AccountWorkerPool, Authenticator, InMemoryAccountRepository, LoginService},
    config::ServerConfig,
    connection::ConnectionManager,
    error::ServerError,
    messaging::{command_registry, ClientCommand, Inbound, AUTH_EVENTS, AUTH_LOGIN, WORLD_CHAT, WORLD_COMMANDS},
    server::handlers::{handle_connection, ConnectionContext},
    session::SessionRegistry,
    simulation::Simulation,
};
use futures::future;
use lodestone_core::{pulse, MessageRegistry, Router, ShutdownState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// The core game server structure.
///
/// `GameServer` owns the shared registries and the router. Everything that
/// runs (the pulse, the simulation, the login service and one task pair per
/// client) is started by [`GameServer::serve`] and stopped when the shutdown
/// state is triggered.
///
/// # Architecture
///
/// * **Router**: topic-based mail between connection readers, the login
///   service and the simulation
/// * **Simulation**: single task owning the world, advanced by the pulse
/// * **Login service**: credential checks through a bounded worker pool
/// * **Connections**: one reader and one writer task per TCP client
pub struct GameServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Account storage behind the login service
    repository: Arc<dyn AccountRepository>,

    /// Live TCP connections
    connections: Arc<ConnectionManager>,

    /// Authenticated players
    sessions: Arc<SessionRegistry>,

    /// Mail between the network, login and simulation tasks
    router: Arc<Router<Inbound>>,

    /// Packet kind lookup shared by every reader
    registry: Arc<MessageRegistry<ClientCommand>>,
}

impl GameServer {
    /// Creates a server with an empty in-memory account store.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration parameters for server behavior
    pub fn new(config: ServerConfig) -> Self {
        Self::with_repository(config, Arc::new(InMemoryAccountRepository::new()))
    }

    /// Creates a server that authenticates against `repository`.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration parameters for server behavior
    /// * `repository` - Account storage used by the login service
    ///
    /// # Returns
    ///
    /// A new `GameServer` ready to be started.
    pub fn with_repository(config: ServerConfig, repository: Arc<dyn AccountRepository>) -> Self {
        let router = Arc::new(Router::new(config.router.to_router_config()));
        Self {
            config,
            repository,
            connections: Arc::new(ConnectionManager::new()),
            sessions: Arc::new(SessionRegistry::new()),
            router,
            registry: Arc::new(command_registry()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    pub fn router(&self) -> &Arc<Router<Inbound>> {
        &self.router
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("failed to bind {}: {e}", self.config.bind_address)))
    }

    /// Starts the game server and runs until the process is stopped.
    pub async fn start(&self) -> Result<(), ServerError> {
        self.start_with_shutdown_state(ShutdownState::new()).await
    }

    /// Validates the configuration, binds, and serves until `shutdown_state`
    /// is triggered.
    ///
    /// # Returns
    ///
    /// `Ok(())` after a clean shutdown, or a `ServerError` if the configuration
    /// is invalid or the address cannot be bound.
    pub async fn start_with_shutdown_state(&self, shutdown_state: ShutdownState) -> Result<(), ServerError> {
        self.config.validate()?;
        let listener = self.bind().await?;
        self.serve(listener, shutdown_state).await
    }

    /// Serves clients from an already bound listener.
    ///
    /// # Startup Sequence
    ///
    /// 1. Subscribe the simulation and login mailboxes to their topics
    /// 2. Start the account workers and the login service
    /// 3. Start the pulse and the simulation task
    /// 4. Accept connections until shutdown is initiated
    ///
    /// # Shutdown Sequence
    ///
    /// 1. Stop the pulse; the simulation terminates every session and exits
    /// 2. Collapse the topics, closing every mailbox
    /// 3. Wait for the simulation and the login service, stop the account workers
    /// 4. Close the remaining connections
    pub async fn serve(&self, listener: TcpListener, shutdown_state: ShutdownState) -> Result<(), ServerError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("listener has no local address: {e}")))?;
        info!("🚀 Starting game server on {}", local_addr);

        let simulation_mailbox = self.router.subscribe(WORLD_COMMANDS).await;
        for topic in [WORLD_CHAT, AUTH_EVENTS] {
            self.router
                .subscribe_mailbox_to_topic(topic, &simulation_mailbox)
                .await
                .map_err(|e| ServerError::Internal(e.to_string()))?;
        }
        let login_mailbox = self.router.subscribe(AUTH_LOGIN).await;

        let workers = AccountWorkerPool::start(self.repository.clone(), &self.config.accounts);
        let authenticator = Arc::new(Authenticator::new(workers, self.config.accounts.fetch_timeout()));
        let login_service = LoginService::new(
            authenticator.clone(),
            self.router.clone(),
            self.connections.clone(),
            self.config.accounts.max_pending_logins,
        );
        let login_task = tokio::spawn(login_service.run(login_mailbox));

        let (pulse, ticks) = pulse::start(self.config.simulation.tick_interval());
        let simulation = Simulation::new(&self.config, self.sessions.clone(), self.connections.clone());
        let simulation_task = tokio::spawn(simulation.run(ticks, simulation_mailbox));
        info!("🕒 Pulse started with interval: {}ms", self.config.simulation.tick_interval_ms);

        self.accept_loop(&listener, &shutdown_state).await;

        info!("🧹 Performing server cleanup...");
        pulse.shutdown().await;
        for topic in [WORLD_COMMANDS, WORLD_CHAT, AUTH_EVENTS, AUTH_LOGIN] {
            self.router.collapse(topic).await;
        }
        let (simulation, login) = future::join(simulation_task, login_task).await;
        if let Err(e) = simulation {
            error!("Simulation task failed: {}", e);
        }
        if let Err(e) = login {
            error!("Login service failed: {}", e);
        }
        match Arc::try_unwrap(authenticator) {
            Ok(authenticator) => authenticator.shutdown(),
            Err(_) => debug!("Logins still in flight; account workers left to finish"),
        }
        let closed = self.connections.close_all();
        info!("✅ Server stopped ({} connections closed)", closed);
        Ok(())
    }

    async fn accept_loop(&self, listener: &TcpListener, shutdown_state: &ShutdownState) {
        loop {
            let accepted = tokio::select! {
                _ = shutdown_state.wait() => {
                    info!("🛑 Accept loop stopping - shutdown initiated");
                    break;
                }
                accepted = listener.accept() => accepted,
            };

            let (stream, addr) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            if self.connections.len() >= self.config.max_connections {
                warn!("🚫 Refusing {}: {} connections already open", addr, self.config.max_connections);
                drop(stream);
                continue;
            }

            let context = self.connection_context();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, context).await {
                    debug!("Connection from {} ended with error: {}", addr, e);
                }
            });
        }
    }

    fn connection_context(&self) -> ConnectionContext {
        ConnectionContext {
            connections: self.connections.clone(),
            router: self.router.clone(),
            registry: self.registry.clone(),
            idle_timeout: self.config.idle_timeout(),
            max_packet_size: self.config.max_packet_size,
            writer_capacity: self.config.sessions.writer_queue_capacity,
            login_deadline: self.config.login_deadline(),
        }
    }
}
