/**
 * CLOCK - Source de temps injectable
 *
 * RÔLE : Fournit "maintenant" au client broker (horodatage de la requête,
 * échéance de la boucle de lecture) et au générateur d'historique.
 * Les tests injectent une horloge figée ou pilotée à la main.
 */

#[cfg(test)]
use parking_lot::Mutex;
use time::{OffsetDateTime, UtcOffset};
#[cfg(test)]
use time::Duration;

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Horloge murale, exprimée dans le décalage local résolu au démarrage.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    /// Résout le décalage local. Doit être appelé avant que le runtime tokio
    /// ne démarre ses threads, sinon `time` refuse de lire le fuseau.
    pub fn local() -> Self {
        match UtcOffset::current_local_offset() {
            Ok(offset) => Self::new(offset),
            Err(e) => {
                tracing::warn!(error = %e, "local UTC offset unavailable, falling back to UTC");
                Self::new(UtcOffset::UTC)
            }
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}

/// Toujours le même instant.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

/// Avance de `step` à chaque lecture (la première lecture renvoie `start`).
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<OffsetDateTime>,
    step: Duration,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: OffsetDateTime, step: Duration) -> Self {
        Self {
            current: Mutex::new(start),
            step,
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.current.lock() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        let mut current = self.current.lock();
        let now = *current;
        *current += self.step;
        now
    }
}
