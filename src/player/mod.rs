use std::time::Duration;
use tracing::debug;

use crate::bus::{BusConnector, Dialer};
use crate::error::{BusError, BusResult};
use crate::models::{Method, NowPlaying, PlaybackStatus, PropValue, TrackMetadata};

/// Domain operations on the remote player.
///
/// Faults from the connector are passed through untouched; reconnecting is
/// the connector's job.
pub struct PlayerClient<D: Dialer> {
    bus: BusConnector<D>,
}

impl<D: Dialer> PlayerClient<D> {
    pub fn new(bus: BusConnector<D>) -> Self {
        Self { bus }
    }

    pub fn metadata(&mut self) -> BusResult<TrackMetadata> {
        let value = self.bus.read_property("Metadata")?;
        TrackMetadata::from_prop(&value)
    }

    #[cfg(test)]
    pub fn artist(&mut self) -> BusResult<String> {
        Ok(self.metadata()?.artist)
    }

    #[cfg(test)]
    pub fn title(&mut self) -> BusResult<String> {
        Ok(self.metadata()?.title)
    }

    #[cfg(test)]
    pub fn album(&mut self) -> BusResult<String> {
        Ok(self.metadata()?.album)
    }

    pub fn playback_status(&mut self) -> BusResult<PlaybackStatus> {
        let value = self.bus.read_property("PlaybackStatus")?;
        value
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| invalid("PlaybackStatus", "playback status"))
    }

    /// Skips forward if the player allows it. Returns whether `Next` was sent.
    pub fn play_next(&mut self) -> BusResult<bool> {
        self.gated("CanGoNext", Method::Next)
    }

    /// Skips back if the player allows it. Returns whether `Previous` was sent.
    pub fn play_previous(&mut self) -> BusResult<bool> {
        self.gated("CanGoPrevious", Method::Previous)
    }

    pub fn play_pause(&mut self) -> BusResult<()> {
        self.bus.invoke(Method::PlayPause)
    }

    /// Asks the player to exit. Nothing on this client should be expected to
    /// work afterwards.
    pub fn quit(&mut self) -> BusResult<()> {
        self.bus.invoke(Method::Quit)
    }

    pub fn shuffle(&mut self) -> BusResult<bool> {
        self.read_bool("Shuffle")
    }

    /// Flips shuffle and returns the new setting.
    pub fn toggle_shuffle(&mut self) -> BusResult<bool> {
        let enabled = !self.shuffle()?;
        self.bus.write_property("Shuffle", PropValue::Bool(enabled))?;
        Ok(enabled)
    }

    /// `None` when the player has no volume control.
    pub fn volume(&mut self) -> BusResult<Option<f64>> {
        optional(self.bus.read_property("Volume").and_then(|value| {
            value.as_double().ok_or_else(|| invalid("Volume", "double"))
        }))
    }

    /// Returns `false` when the player has no volume control.
    pub fn set_volume(&mut self, volume: f64) -> BusResult<bool> {
        let volume = volume.clamp(0.0, 1.0);
        let written = optional(self.bus.write_property("Volume", PropValue::Double(volume)))?;
        Ok(written.is_some())
    }

    /// `None` when the player does not report a position.
    pub fn position(&mut self) -> BusResult<Option<Duration>> {
        optional(self.bus.read_property("Position").and_then(|value| {
            value
                .as_int()
                .map(|micros| Duration::from_micros(micros.max(0) as u64))
                .ok_or_else(|| invalid("Position", "integer"))
        }))
    }

    /// Reads everything the dashboard shows, with a single `Metadata` read.
    pub fn now_playing(&mut self) -> BusResult<NowPlaying> {
        let track = self.metadata()?;
        let status = match self.playback_status() {
            Err(BusError::InvalidProperty { .. }) => {
                debug!("Unknown playback status, showing it as stopped");
                PlaybackStatus::Stopped
            }
            result => result?,
        };
        let shuffle = optional(self.shuffle())?;
        let volume = self.volume()?;
        let position = self.position()?;

        Ok(NowPlaying {
            track,
            status,
            shuffle,
            volume,
            position,
        })
    }

    fn gated(&mut self, flag: &str, method: Method) -> BusResult<bool> {
        if !self.read_bool(flag)? {
            return Ok(false);
        }
        self.bus.invoke(method)?;
        Ok(true)
    }

    fn read_bool(&mut self, name: &str) -> BusResult<bool> {
        self.bus
            .read_property(name)?
            .as_bool()
            .ok_or_else(|| invalid(name, "boolean"))
    }
}

fn optional<T>(result: BusResult<T>) -> BusResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_unsupported() => Ok(None),
        Err(e) => Err(e),
    }
}

fn invalid(property: &str, expected: &'static str) -> BusError {
    BusError::InvalidProperty {
        property: property.to_string(),
        expected,
    }
}
