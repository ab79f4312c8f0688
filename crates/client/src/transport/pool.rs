use std::collections::HashMap;
use std::io;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::transport::{Connection, ConnectionTransaction, Connector, Dialer, Endpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// How many unfinished transactions may share one connection. 1 disables pipelining.
    pub pipeline_limit: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { pipeline_limit: 1 }
    }
}

/// A [`Connector`] reusing open connections per [`Endpoint`].
#[derive(Debug)]
pub struct Pool<D> {
    dialer: D,
    config: PoolConfig,
    connections: Mutex<HashMap<Endpoint, Vec<Connection>>>,
}

impl<D: Dialer> Pool<D> {
    pub fn new(dialer: D) -> Self {
        Self::with_config(dialer, PoolConfig::default())
    }

    pub fn with_config(dialer: D, config: PoolConfig) -> Self {
        Self { dialer, config, connections: Mutex::new(HashMap::new()) }
    }

    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Open pooled connections to `endpoint`.
    pub fn idle_count(&self, endpoint: &Endpoint) -> usize {
        let connections = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
        connections.get(endpoint).map_or(0, |list| list.iter().filter(|c| c.is_open()).count())
    }

    fn checkout(&self, endpoint: &Endpoint) -> Option<ConnectionTransaction> {
        let limit = self.config.pipeline_limit.max(1);
        let mut connections = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
        let list = connections.get_mut(endpoint)?;
        list.retain(Connection::is_open);
        let connection = list.iter().find(|c| c.in_flight() < limit)?;
        trace!(connection = connection.id(), endpoint = %endpoint.authority(), "reusing connection");
        Some(connection.transaction())
    }
}

#[async_trait]
impl<D: Dialer> Connector for Pool<D> {
    type Transaction = ConnectionTransaction;

    async fn connect(&self, endpoint: &Endpoint, reuse: bool) -> io::Result<ConnectionTransaction> {
        if reuse {
            if let Some(transaction) = self.checkout(endpoint) {
                return Ok(transaction);
            }
        }

        let io = self.dialer.dial(endpoint).await?;
        let connection = Connection::from_io(io, self.dialer.tls());
        debug!(connection = connection.id(), endpoint = %endpoint.authority(), reuse, "opened connection");
        let transaction = connection.transaction();

        if reuse {
            let mut connections = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
            connections.entry(endpoint.clone()).or_default().push(connection);
        }
        Ok(transaction)
    }
}
