//! Server-wide services
//!
//! Everything commands share across connections, built once at startup and
//! handed to every connection behind an `Arc`.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use crate::auth::{CredentialValidator, StaticCredentials};
use crate::background::BackgroundTransferWorker;
use crate::config::ServerConfig;
use crate::error::FtpServerError;
use crate::middleware::{
    CommandMiddleware, LoggingMiddleware, LoggingStatistics, StatisticsCollector,
    StatisticsMiddleware,
};
use crate::protocol::CommandRegistry;
use crate::security::{AuthMechanism, TlsMechanism, acceptor_from_config};
use crate::storage::FileSystem;
use crate::transfer::{DataConnectionFeature, PassivePortAllocator};

pub struct ServerServices {
    pub config: Arc<ServerConfig>,
    pub file_system: Arc<dyn FileSystem>,
    pub credentials: Arc<dyn CredentialValidator>,
    pub mechanisms: Vec<Arc<dyn AuthMechanism>>,
    pub tls_acceptor: Option<TlsAcceptor>,
    pub passive_ports: PassivePortAllocator,
    pub worker: BackgroundTransferWorker,
    pub statistics: Arc<dyn StatisticsCollector>,
    pub registry: CommandRegistry,
    pub middleware: Vec<Arc<dyn CommandMiddleware>>,
}

impl ServerServices {
    /// Builds the default service set and starts the background worker,
    /// which stops when `shutdown` is cancelled.
    pub fn new(
        config: ServerConfig,
        file_system: Arc<dyn FileSystem>,
        shutdown: &CancellationToken,
    ) -> Result<Self, FtpServerError> {
        let tls_acceptor = acceptor_from_config(&config)?;
        let statistics: Arc<dyn StatisticsCollector> = Arc::new(LoggingStatistics::default());
        let worker = BackgroundTransferWorker::start(
            Arc::clone(&statistics),
            config.finished_transfer_retention(),
            shutdown,
        );

        Ok(Self {
            credentials: Arc::new(StaticCredentials::new(
                &config.users,
                config.max_command_length,
            )),
            mechanisms: vec![Arc::new(TlsMechanism::new(tls_acceptor.is_some()))],
            passive_ports: PassivePortAllocator::new(config.data_port_range()),
            registry: CommandRegistry::with_defaults()?,
            middleware: vec![
                Arc::new(LoggingMiddleware),
                Arc::new(StatisticsMiddleware::new(Arc::clone(&statistics))),
            ],
            config: Arc::new(config),
            file_system,
            tls_acceptor,
            worker,
            statistics,
        })
    }

    /// Fresh data connection state for a new control connection from `peer`.
    pub fn new_data_connection_feature(&self, peer: SocketAddr) -> DataConnectionFeature {
        DataConnectionFeature::new(
            peer,
            self.config.promiscuous_pasv,
            self.config.epsv_only,
            self.tls_acceptor.clone(),
        )
    }
}
