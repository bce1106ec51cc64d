//! TCP connections to a backing store, pooled per logical name.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::pool::resource_pool::{BoxError, ResourceFactory};

/// Opens a fresh TCP connection for every constructed instance.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl ResourceFactory<TcpStream> for TcpConnector {
    async fn create(&self) -> Result<TcpStream, BoxError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| format!("connect to {} timed out", self.address))??;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
