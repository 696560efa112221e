//! Connection to the player's bus endpoint.
//!
//! `BusConnector` owns the session and applies the reconnect policy. The
//! wire itself sits behind the `Dialer`/`Session` pair so the connector can
//! be driven by an in-memory bus in tests.

use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::ReconnectConfig;
use crate::error::{BusError, BusResult};
use crate::models::{Method, PropValue};

pub mod dbus;
#[cfg(test)]
pub mod fake;

/// One open channel to the player's properties and control objects.
pub trait Session {
    fn read_property(&self, name: &str) -> BusResult<PropValue>;
    fn write_property(&self, name: &str, value: PropValue) -> BusResult<()>;
    fn invoke(&self, method: Method) -> BusResult<()>;
}

/// Opens sessions. Called once at startup and again on every reconnect.
pub trait Dialer {
    type Session: Session;

    fn dial(&self) -> BusResult<Self::Session>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            delay: config.delay(),
        }
    }
}

enum Connection<S> {
    Disconnected,
    Connected(S),
}

pub struct BusConnector<D: Dialer> {
    dialer: D,
    connection: Connection<D::Session>,
    policy: ReconnectPolicy,
    sleep: Box<dyn FnMut(Duration)>,
}

impl<D: Dialer> BusConnector<D> {
    /// Dials once. A player that is not running is reported as
    /// `BusError::Connect` without any retry.
    pub fn connect(dialer: D, policy: ReconnectPolicy) -> BusResult<Self> {
        let session = dialer.dial()?;
        info!("Connected to player");

        Ok(Self {
            dialer,
            connection: Connection::Connected(session),
            policy,
            sleep: Box::new(thread::sleep),
        })
    }

    /// Replaces the pause taken between reconnect attempts.
    pub fn with_sleep(mut self, sleep: impl FnMut(Duration) + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    #[cfg(test)]
    pub fn is_connected(&self) -> bool {
        matches!(self.connection, Connection::Connected(_))
    }

    pub fn read_property(&mut self, name: &str) -> BusResult<PropValue> {
        debug!("Get {name}");
        self.with_session(|session| session.read_property(name))
    }

    pub fn write_property(&mut self, name: &str, value: PropValue) -> BusResult<()> {
        debug!("Set {name} = {value:?}");
        self.with_session(|session| session.write_property(name, value))
    }

    pub fn invoke(&mut self, method: Method) -> BusResult<()> {
        debug!("Call {method}");
        self.with_session(|session| session.invoke(method))
    }

    /// Runs `call` on the live session. A transport fault drops the session
    /// and reconnects, then hands the original fault back; the call is not
    /// replayed.
    fn with_session<T>(
        &mut self,
        call: impl FnOnce(&D::Session) -> BusResult<T>,
    ) -> BusResult<T> {
        if let Connection::Disconnected = self.connection {
            self.reconnect()?;
        }

        let Connection::Connected(session) = &self.connection else {
            return Err(BusError::Unrecoverable {
                attempts: self.policy.attempts,
            });
        };

        match call(session) {
            Err(err) if err.is_transport() => {
                warn!("Lost connection to player: {err}");
                self.connection = Connection::Disconnected;
                self.reconnect()?;
                Err(err)
            }
            result => result,
        }
    }

    fn reconnect(&mut self) -> BusResult<()> {
        let attempts = self.policy.attempts;

        for attempt in 1..=attempts {
            info!("Trying to reconnect to message bus ({attempt}/{attempts})");
            match self.dialer.dial() {
                Ok(session) => {
                    self.connection = Connection::Connected(session);
                    info!("Reconnected to player");
                    return Ok(());
                }
                Err(e) => {
                    warn!("Reconnect attempt {attempt} failed: {e}");
                    if attempt < attempts {
                        (self.sleep)(self.policy.delay);
                    }
                }
            }
        }

        error!("Giving up on the player after {attempts} attempts");
        Err(BusError::Unrecoverable { attempts })
    }
}
