/*!
Stub TCP du broker capteurs pour tests sans broker réel

Écoute sur 127.0.0.1 (port éphémère), enregistre chaque ligne reçue et
répond à chaque `get_current` en rejouant un script de frames brutes. Les
frames sont des octets arbitraires : on peut couper une ligne JSON en deux,
envoyer du garbage, marquer des pauses.
*/

use crate::messages::WireMessage;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub enum Frame {
    Bytes(Vec<u8>),
    Delay(Duration),
}

/// Réponse rejouée pour chaque `get_current`
#[derive(Debug, Clone, Default)]
pub struct StubScript {
    pub frames: Vec<Frame>,
    /// Ferme la connexion après la réponse (sinon attend que le client parte)
    pub close_after: bool,
}

impl StubScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.frames.push(Frame::Bytes(bytes.into()));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.frames.push(Frame::Delay(delay));
        self
    }

    pub fn close_after(mut self) -> Self {
        self.close_after = true;
        self
    }
}

#[derive(Default)]
struct StubState {
    requests: Mutex<Vec<WireMessage>>,
    connections: AtomicUsize,
    closed: AtomicUsize,
}

pub struct BrokerStub {
    addr: SocketAddr,
    state: Arc<StubState>,
    handle: JoinHandle<()>,
}

impl BrokerStub {
    /// Démarre le stub en arrière-plan
    pub async fn start(script: StubScript) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(StubState::default());
        log::info!("🧪 [STUB] broker listening on {}", addr);

        let handle = tokio::spawn({
            let state = state.clone();
            async move {
                loop {
                    let (stream, peer) = match listener.accept().await {
                        Ok(conn) => conn,
                        Err(e) => {
                            log::warn!("[STUB] accept failed: {}", e);
                            continue;
                        }
                    };
                    state.connections.fetch_add(1, Ordering::SeqCst);
                    log::info!("🔌 [STUB] client connected: {}", peer);
                    tokio::spawn(serve_client(stream, script.clone(), state.clone()));
                }
            }
        });

        Ok(Self { addr, state, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Requêtes reçues (lignes JSON valides uniquement)
    pub fn requests(&self) -> Vec<WireMessage> {
        self.state.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Connexions terminées, côté client ou côté stub
    pub fn closed_connections(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Attend qu'au moins une connexion ait été acceptée et que toutes
    /// soient refermées
    pub async fn wait_all_closed(&self, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            let accepted = self.connections();
            if accepted > 0 && self.closed_connections() == accepted {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

impl Drop for BrokerStub {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_client(stream: TcpStream, script: StubScript, state: Arc<StubState>) {
    if let Err(e) = handle_lines(stream, &script, &state).await {
        log::warn!("[STUB] client error: {}", e);
    }
    state.closed.fetch_add(1, Ordering::SeqCst);
}

async fn handle_lines(stream: TcpStream, script: &StubScript, state: &StubState) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let msg = match serde_json::from_str::<WireMessage>(&line) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("[STUB] invalid request line {:?}: {}", line, e);
                continue;
            }
        };
        let is_get_current = msg.kind == "get_current";
        if let Ok(mut requests) = state.requests.lock() {
            requests.push(msg);
        }
        if !is_get_current {
            continue;
        }

        for frame in &script.frames {
            match frame {
                Frame::Bytes(bytes) => {
                    writer.write_all(bytes).await?;
                    writer.flush().await?;
                }
                Frame::Delay(delay) => tokio::time::sleep(*delay).await,
            }
        }
        log::info!("📤 [STUB] replayed {} frames", script.frames.len());

        if script.close_after {
            writer.shutdown().await?;
            return Ok(());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::WireMessageBuilder;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_stub_replays_script_on_get_current() {
        crate::init_test_logging();
        let payload = WireMessageBuilder::lines(&[WireMessageBuilder::sensor_data("wind", 9.5)]);
        let stub = BrokerStub::start(StubScript::new().bytes(payload.clone()).close_after())
            .await
            .unwrap();

        let mut client = TcpStream::connect(stub.addr()).await.unwrap();
        client
            .write_all(WireMessageBuilder::get_current("test").to_line().as_bytes())
            .await
            .unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();

        assert_eq!(received, payload);
        assert_eq!(stub.requests().len(), 1);
        assert_eq!(stub.requests()[0].client_id, "test");
        assert!(stub.wait_all_closed(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_stub_ignores_other_requests() {
        let stub = BrokerStub::start(StubScript::new().bytes("x\n")).await.unwrap();

        let mut client = TcpStream::connect(stub.addr()).await.unwrap();
        client
            .write_all(WireMessageBuilder::other("subscribe", "wind").to_line().as_bytes())
            .await
            .unwrap();
        client.write_all(b"not json\n").await.unwrap();
        drop(client);

        assert!(stub.wait_all_closed(Duration::from_secs(1)).await);
        assert_eq!(stub.requests().len(), 1);
        assert_eq!(stub.requests()[0].kind, "subscribe");
    }
}
