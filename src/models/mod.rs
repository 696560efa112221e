use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{BusError, BusResult};

/// A decoded property value as read from, or written to, the player.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    List(Vec<PropValue>),
    Map(BTreeMap<String, PropValue>),
}

impl PropValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            PropValue::Double(d) => Some(*d),
            PropValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Double(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_string())
    }
}

/// Control methods the dashboard can invoke on the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Next,
    Previous,
    PlayPause,
    Quit,
}

impl Method {
    pub fn member(&self) -> &'static str {
        match self {
            Method::Next => "Next",
            Method::Previous => "Previous",
            Method::PlayPause => "PlayPause",
            Method::Quit => "Quit",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.member())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    #[default]
    Stopped,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::Paused => "Paused",
            PlaybackStatus::Stopped => "Stopped",
        }
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlaybackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Playing" => Ok(PlaybackStatus::Playing),
            "Paused" => Ok(PlaybackStatus::Paused),
            "Stopped" => Ok(PlaybackStatus::Stopped),
            _ => Err(format!("Invalid playback status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub artist: String,
    pub title: String,
    pub album: String,
    pub length: Option<Duration>,
}

impl TrackMetadata {
    /// Decodes the `Metadata` property bag. Absent strings become empty.
    pub fn from_prop(value: &PropValue) -> BusResult<Self> {
        let PropValue::Map(map) = value else {
            return Err(invalid("Metadata", "map"));
        };

        let artist = match map.get("xesam:artist") {
            None => String::new(),
            Some(PropValue::List(artists)) => match artists.first() {
                None => String::new(),
                Some(PropValue::Str(s)) => s.clone(),
                Some(_) => return Err(invalid("xesam:artist", "list of strings")),
            },
            Some(PropValue::Str(s)) => s.clone(),
            Some(_) => return Err(invalid("xesam:artist", "list of strings")),
        };

        let length = match map.get("mpris:length") {
            None => None,
            Some(v) => {
                let micros = v.as_int().ok_or_else(|| invalid("mpris:length", "integer"))?;
                Some(Duration::from_micros(micros.max(0) as u64))
            }
        };

        Ok(Self {
            artist,
            title: string_field(map, "xesam:title")?,
            album: string_field(map, "xesam:album")?,
            length,
        })
    }
}

fn string_field(map: &BTreeMap<String, PropValue>, key: &str) -> BusResult<String> {
    match map.get(key) {
        None => Ok(String::new()),
        Some(PropValue::Str(s)) => Ok(s.clone()),
        Some(_) => Err(invalid(key, "string")),
    }
}

fn invalid(property: &str, expected: &'static str) -> BusError {
    BusError::InvalidProperty {
        property: property.to_string(),
        expected,
    }
}

/// Everything the dashboard shows, read in one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlaying {
    pub track: TrackMetadata,
    pub status: PlaybackStatus,
    pub shuffle: Option<bool>,
    pub volume: Option<f64>,
    pub position: Option<Duration>,
}

pub fn format_time(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
