//! Transport vers le broker : la boucle de lecture ne voit que ces deux
//! traits, ce qui permet de la tester sans socket.
//!
//! La libération du socket passe par `Drop` : le transport appartient à
//! l'appel qui l'a ouvert et se ferme sur tous les chemins de sortie.

use super::BrokerError;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpSocket, TcpStream};

pub trait BrokerTransport: Send {
    fn write_all(&mut self, bytes: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Lit ce qui est disponible ; `Ok(0)` = fin de flux.
    fn read_chunk(&mut self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Regarde sans consommer et sans attendre si des octets sont déjà là.
    fn has_pending_data(&mut self) -> impl Future<Output = io::Result<bool>> + Send;
}

pub trait Connector: Send + Sync {
    type Transport: BrokerTransport;

    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Self::Transport, BrokerError>> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    async fn connect(&self, host: &str, port: u16) -> Result<TcpTransport, BrokerError> {
        let addrs: Vec<SocketAddr> = lookup_host((host, port))
            .await
            .map_err(|e| BrokerError::ConnectFailed(format!("cannot resolve {host}: {e}")))?
            .collect();

        let mut last_error = None;
        for addr in addrs {
            let socket = if addr.is_ipv4() {
                TcpSocket::new_v4()
            } else {
                TcpSocket::new_v6()
            }
            .map_err(|e| BrokerError::SocketCreateFailed(e.to_string()))?;

            match socket.connect(addr).await {
                Ok(stream) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(%addr, error = %e, "cannot set TCP_NODELAY");
                    }
                    return Ok(TcpTransport { stream });
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(BrokerError::ConnectFailed(match last_error {
            Some(e) => e.to_string(),
            None => format!("no address found for {host}:{port}"),
        }))
    }
}

#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl BrokerTransport for TcpTransport {
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).await
    }

    async fn has_pending_data(&mut self) -> io::Result<bool> {
        let mut probe = [0u8; 1];
        // Délai nul : le peek est tenté une fois, sans jamais attendre.
        match tokio::time::timeout(Duration::ZERO, self.stream.peek(&mut probe)).await {
            Ok(Ok(n)) => Ok(n > 0),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(false),
        }
    }
}
