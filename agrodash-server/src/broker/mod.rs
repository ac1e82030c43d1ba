/**
 * BROKER CLIENT - Lecture ponctuelle des capteurs via le broker TCP
 *
 * RÔLE :
 * Ouvre une connexion, envoie une requête `get_current`, lit les lignes
 * `sensor_data` pendant une fenêtre bornée puis referme. Pas de réutilisation
 * de connexion, pas de retry : chaque requête HTTP fait son propre cycle.
 *
 * FONCTIONNEMENT :
 * - Connexion et écriture bornées par `io_timeout` ; un échec ici est fatal
 *   (`BrokerError`) et remonte en HTTP 500.
 * - Boucle de lecture bornée par une échéance absolue (`read_window`) ;
 *   tout incident dans la boucle (reset, timeout, ligne invalide) dégrade en
 *   snapshot partiel et se retrouve dans `LoopEnd`.
 * - Après chaque chunk, sonde sans attente : si rien n'est déjà arrivé, on
 *   sort sans attendre l'échéance.
 */

pub mod protocol;
pub mod transport;

use crate::clock::Clock;
use crate::models::SensorSnapshot;
use protocol::{decode_line, encode_get_current, EncodeError, LineBuffer, LineOutcome};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn, Instrument};
use transport::{BrokerTransport, Connector};
use uuid::Uuid;

pub use transport::{TcpConnector, TcpTransport};

/// Échecs fataux : la requête HTTP échoue.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("socket creation failed: {0}")]
    SocketCreateFailed(String),
    #[error("unable to connect to broker: {0}")]
    ConnectFailed(String),
    #[error("failed to send request to broker: {0}")]
    WriteFailed(String),
    #[error("failed to encode request: {0}")]
    Encode(#[from] EncodeError),
}

/// Raison de sortie de la boucle de lecture (jamais fatale).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEnd {
    /// La sonde n'a rien vu : le broker a fini de parler.
    Idle,
    PeerClosed,
    DeadlineReached,
    ConnectionReset,
    ReadTimedOut,
    ReadFailed(String),
}

#[derive(Debug)]
pub struct ReadCycle {
    pub snapshot: SensorSnapshot,
    pub ended_by: LoopEnd,
    pub ignored_lines: usize,
    pub malformed_lines: usize,
}

#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub io_timeout: Duration,
    pub read_window: Duration,
    pub chunk_size: usize,
    pub client_id: String,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8080,
            io_timeout: Duration::from_secs(10),
            read_window: Duration::from_secs(5),
            chunk_size: 1024,
            client_id: "dashboard".into(),
        }
    }
}

pub struct BrokerClient<C> {
    connector: C,
    clock: Arc<dyn Clock>,
    settings: BrokerSettings,
}

impl<C: Connector> BrokerClient<C> {
    pub fn new(connector: C, clock: Arc<dyn Clock>, settings: BrokerSettings) -> Self {
        Self {
            connector,
            clock,
            settings,
        }
    }

    pub async fn fetch_current_readings(&self) -> Result<SensorSnapshot, BrokerError> {
        self.read_cycle().await.map(|cycle| cycle.snapshot)
    }

    /// Un cycle complet connexion → requête → lecture → fermeture.
    pub async fn read_cycle(&self) -> Result<ReadCycle, BrokerError> {
        let span = tracing::info_span!(
            "broker_cycle",
            cycle_id = %Uuid::new_v4(),
            host = %self.settings.host,
            port = self.settings.port,
        );
        self.run_cycle().instrument(span).await
    }

    async fn run_cycle(&self) -> Result<ReadCycle, BrokerError> {
        let BrokerSettings { host, port, io_timeout, .. } = &self.settings;

        info!("connecting to broker");
        let mut transport = match timeout(*io_timeout, self.connector.connect(host, *port)).await {
            Ok(Ok(transport)) => transport,
            Ok(Err(e)) => {
                warn!(error = %e, "broker connection failed");
                return Err(e);
            }
            Err(_) => {
                warn!(timeout = ?io_timeout, "broker connection timed out");
                return Err(BrokerError::ConnectFailed(format!("timed out after {io_timeout:?}")));
            }
        };
        info!("connected to broker");

        let request = encode_get_current(self.clock.now(), &self.settings.client_id)?;
        debug!(request = %String::from_utf8_lossy(&request).trim_end(), "writing request");
        match timeout(*io_timeout, transport.write_all(&request)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(BrokerError::WriteFailed(e.to_string())),
            Err(_) => return Err(BrokerError::WriteFailed(format!("timed out after {io_timeout:?}"))),
        }

        let cycle = self.read_responses(&mut transport).await;
        drop(transport);

        info!(
            readings = cycle.snapshot.len(),
            ended_by = ?cycle.ended_by,
            ignored = cycle.ignored_lines,
            malformed = cycle.malformed_lines,
            "finished reading from broker"
        );
        Ok(cycle)
    }

    async fn read_responses(&self, transport: &mut C::Transport) -> ReadCycle {
        let io_timeout = self.settings.io_timeout;
        let deadline = self.clock.now() + self.settings.read_window;

        let mut buffer = LineBuffer::default();
        let mut chunk = vec![0u8; self.settings.chunk_size.max(1)];
        let mut cycle = ReadCycle {
            snapshot: SensorSnapshot::new(),
            ended_by: LoopEnd::Idle,
            ignored_lines: 0,
            malformed_lines: 0,
        };

        cycle.ended_by = loop {
            let now = self.clock.now();
            if now >= deadline {
                break LoopEnd::DeadlineReached;
            }
            let remaining = Duration::try_from(deadline - now).unwrap_or_default();
            let wait = remaining.min(io_timeout);

            let read = match timeout(wait, transport.read_chunk(&mut chunk)).await {
                Ok(Ok(0)) => break LoopEnd::PeerClosed,
                Ok(Ok(n)) => n,
                Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionReset => {
                    break LoopEnd::ConnectionReset
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "broker read error");
                    break LoopEnd::ReadFailed(e.to_string());
                }
                Err(_) if remaining <= io_timeout => break LoopEnd::DeadlineReached,
                Err(_) => break LoopEnd::ReadTimedOut,
            };
            debug!(bytes = read, "chunk received");
            buffer.extend(&chunk[..read]);

            while let Some(line) = buffer.next_line() {
                match decode_line(&line) {
                    LineOutcome::Reading(reading) => {
                        debug!(topic = %reading.topic, value = reading.value, "sensor data");
                        cycle.snapshot.upsert(reading);
                    }
                    LineOutcome::Ignored => {
                        debug!(line = %String::from_utf8_lossy(&line), "ignoring non sensor_data line");
                        cycle.ignored_lines += 1;
                    }
                    LineOutcome::Malformed => {
                        debug!(line = %String::from_utf8_lossy(&line), "discarding malformed line");
                        cycle.malformed_lines += 1;
                    }
                }
            }

            match transport.has_pending_data().await {
                Ok(true) => continue,
                Ok(false) => break LoopEnd::Idle,
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    break LoopEnd::ConnectionReset
                }
                Err(e) => {
                    debug!(error = %e, "idle probe failed, treating stream as quiet");
                    break LoopEnd::Idle;
                }
            }
        };

        if buffer.pending() > 0 {
            debug!(bytes = buffer.pending(), "dropping incomplete trailing line");
        }
        cycle
    }
}
