//! D-Bus session bus transport, built on `zbus::blocking`.

use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use zbus::DBusError;
use zbus::blocking::Connection;
use zbus::zvariant::{OwnedValue, Value};

use super::{Dialer, Session};
use crate::config::BusConfig;
use crate::error::{BusError, BusResult};
use crate::models::{Method, PropValue};

const DBUS_NAME: &str = "org.freedesktop.DBus";
const DBUS_PATH: &str = "/org/freedesktop/DBus";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Errors meaning the player lacks the requested member.
const UNSUPPORTED_ERRORS: &[&str] = &[
    "org.freedesktop.DBus.Error.UnknownMethod",
    "org.freedesktop.DBus.Error.UnknownInterface",
    "org.freedesktop.DBus.Error.UnknownProperty",
    "org.freedesktop.DBus.Error.NotSupported",
    "org.freedesktop.DBus.Error.PropertyReadOnly",
    "org.freedesktop.DBus.Error.InvalidArgs",
];

/// Errors meaning the channel to the player is gone.
const TRANSPORT_ERRORS: &[&str] = &[
    "org.freedesktop.DBus.Error.ServiceUnknown",
    "org.freedesktop.DBus.Error.NameHasNoOwner",
    "org.freedesktop.DBus.Error.NoReply",
    "org.freedesktop.DBus.Error.Disconnected",
    "org.freedesktop.DBus.Error.UnknownObject",
    "org.freedesktop.DBus.Error.Timeout",
    "org.freedesktop.DBus.Error.TimedOut",
    "org.freedesktop.DBus.Error.NoServer",
    "org.freedesktop.DBus.Error.NoNetwork",
    "org.freedesktop.DBus.Error.IOError",
];

/// Errors after which the legacy control target is worth a try.
const MISSING_TARGET_ERRORS: &[&str] = &[
    "org.freedesktop.DBus.Error.UnknownMethod",
    "org.freedesktop.DBus.Error.UnknownInterface",
    "org.freedesktop.DBus.Error.UnknownObject",
];

pub struct DbusDialer {
    config: BusConfig,
}

impl DbusDialer {
    pub fn new(config: BusConfig) -> Self {
        Self { config }
    }
}

impl Dialer for DbusDialer {
    type Session = DbusSession;

    fn dial(&self) -> BusResult<DbusSession> {
        let connect_error = |reason: String| BusError::Connect {
            bus_name: self.config.name.clone(),
            reason,
        };

        let conn = Connection::session().map_err(|e| connect_error(e.to_string()))?;

        let has_owner: bool = conn
            .call_method(
                Some(DBUS_NAME),
                DBUS_PATH,
                Some(DBUS_NAME),
                "NameHasOwner",
                &self.config.name.as_str(),
            )
            .and_then(|reply| reply.body().deserialize())
            .map_err(|e| connect_error(e.to_string()))?;

        if !has_owner {
            return Err(connect_error(
                "name has no owner (is the player running?)".to_string(),
            ));
        }

        debug!("Resolved {} on the session bus", self.config.name);
        Ok(DbusSession {
            conn,
            config: self.config.clone(),
        })
    }
}

pub struct DbusSession {
    conn: Connection,
    config: BusConfig,
}

impl DbusSession {
    fn call(&self, path: &str, interface: &str, member: &str) -> zbus::Result<()> {
        self.conn
            .call_method(
                Some(self.config.name.as_str()),
                path,
                Some(interface),
                member,
                &(),
            )
            .map(|_| ())
    }
}

impl Session for DbusSession {
    fn read_property(&self, name: &str) -> BusResult<PropValue> {
        let value: OwnedValue = self
            .conn
            .call_method(
                Some(self.config.name.as_str()),
                self.config.properties_path.as_str(),
                Some(PROPERTIES_INTERFACE),
                "Get",
                &(self.config.player_interface.as_str(), name),
            )
            .and_then(|reply| reply.body().deserialize())
            .map_err(|e| classify(name, e))?;

        decode(name, value)
    }

    fn write_property(&self, name: &str, value: PropValue) -> BusResult<()> {
        let value = match value {
            PropValue::Bool(b) => Value::from(b),
            PropValue::Int(i) => Value::from(i),
            PropValue::Double(d) => Value::from(d),
            PropValue::Str(s) => Value::from(s),
            PropValue::List(_) | PropValue::Map(_) => {
                return Err(BusError::InvalidProperty {
                    property: name.to_string(),
                    expected: "scalar",
                });
            }
        };

        self.conn
            .call_method(
                Some(self.config.name.as_str()),
                self.config.properties_path.as_str(),
                Some(PROPERTIES_INTERFACE),
                "Set",
                &(self.config.player_interface.as_str(), name, value),
            )
            .map(|_| ())
            .map_err(|e| classify(name, e))
    }

    fn invoke(&self, method: Method) -> BusResult<()> {
        let interface = match method {
            Method::Quit => &self.config.root_interface,
            _ => &self.config.player_interface,
        };

        call_with_fallback(
            || self.call(&self.config.properties_path, interface, method.member()),
            || {
                debug!("{method} not found on {interface}, trying {}", self.config.legacy_interface);
                self.call(
                    &self.config.legacy_path,
                    &self.config.legacy_interface,
                    method.member(),
                )
            },
        )
        .map_err(|e| classify(method.member(), e))
    }
}

/// Tries `primary`, then `legacy` when the primary target does not exist.
/// If both fail the primary error is returned.
fn call_with_fallback(
    primary: impl FnOnce() -> zbus::Result<()>,
    legacy: impl FnOnce() -> zbus::Result<()>,
) -> zbus::Result<()> {
    let Err(err) = primary() else {
        return Ok(());
    };
    if !should_try_legacy(&err) {
        return Err(err);
    }

    match legacy() {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("Legacy call failed too: {e}");
            Err(err)
        }
    }
}

fn should_try_legacy(err: &zbus::Error) -> bool {
    error_name(err).is_some_and(|name| MISSING_TARGET_ERRORS.contains(&name.as_str()))
}

fn error_name(err: &zbus::Error) -> Option<String> {
    match err {
        zbus::Error::MethodError(name, _, _) => Some(name.as_str().to_string()),
        zbus::Error::FDO(fdo) => Some(fdo.name().as_str().to_string()),
        _ => None,
    }
}

fn classify(member: &str, err: zbus::Error) -> BusError {
    let message = match &err {
        zbus::Error::MethodError(_, Some(description), _) => description.clone(),
        zbus::Error::FDO(fdo) => fdo.description().unwrap_or_default().to_string(),
        _ => err.to_string(),
    };

    match (error_name(&err), err) {
        (Some(name), _) => classify_name(member, &name, message),
        (None, zbus::Error::Variant(e)) => BusError::Decode(format!("{member}: {e}")),
        (None, e) => BusError::Transport(e.to_string()),
    }
}

/// Maps a D-Bus error name onto the fault taxonomy.
pub fn classify_name(member: &str, name: &str, message: String) -> BusError {
    let message = if message.is_empty() {
        name.to_string()
    } else {
        message
    };

    if UNSUPPORTED_ERRORS.contains(&name) {
        BusError::Unsupported {
            member: member.to_string(),
        }
    } else if TRANSPORT_ERRORS.contains(&name) {
        BusError::Transport(message)
    } else {
        BusError::Remote {
            name: name.to_string(),
            message,
        }
    }
}

fn decode(property: &str, value: OwnedValue) -> BusResult<PropValue> {
    if let Value::Dict(_) = &*value {
        let entries = HashMap::<String, OwnedValue>::try_from(value)
            .map_err(|e| BusError::Decode(format!("{property}: {e}")))?;

        let mut map = BTreeMap::new();
        for (key, entry) in entries {
            // players put all sorts of things in Metadata; keep what we can read
            match from_value(&key, &entry) {
                Ok(v) => {
                    map.insert(key, v);
                }
                Err(e) => debug!("Skipping {property} entry: {e}"),
            }
        }
        return Ok(PropValue::Map(map));
    }

    from_value(property, &value)
}

fn from_value(property: &str, value: &Value<'_>) -> BusResult<PropValue> {
    let decoded = match value {
        Value::Bool(b) => PropValue::Bool(*b),
        Value::U8(n) => PropValue::Int(i64::from(*n)),
        Value::I16(n) => PropValue::Int(i64::from(*n)),
        Value::U16(n) => PropValue::Int(i64::from(*n)),
        Value::I32(n) => PropValue::Int(i64::from(*n)),
        Value::U32(n) => PropValue::Int(i64::from(*n)),
        Value::I64(n) => PropValue::Int(*n),
        Value::U64(n) => PropValue::Int(i64::try_from(*n).unwrap_or(i64::MAX)),
        Value::F64(d) => PropValue::Double(*d),
        Value::Str(s) => PropValue::Str(s.as_str().to_string()),
        Value::ObjectPath(p) => PropValue::Str(p.as_str().to_string()),
        Value::Value(inner) => from_value(property, inner)?,
        Value::Array(items) => PropValue::List(
            items
                .iter()
                .map(|item| from_value(property, item))
                .collect::<BusResult<_>>()?,
        ),
        other => {
            return Err(BusError::Decode(format!(
                "{property}: cannot read {}",
                other.value_signature()
            )));
        }
    };
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zbus::zvariant::{ObjectPath, Structure};

    #[test]
    fn test_classify_unsupported() {
        let err = classify_name(
            "Volume",
            "org.freedesktop.DBus.Error.UnknownProperty",
            "no such property".into(),
        );
        assert!(matches!(err, BusError::Unsupported { ref member } if member == "Volume"));
    }

    #[test]
    fn test_classify_transport() {
        let err = classify_name(
            "Metadata",
            "org.freedesktop.DBus.Error.ServiceUnknown",
            "The name com.spotify.qt was not provided by any .service files".into(),
        );
        assert!(err.is_transport());
        assert!(err.to_string().contains("com.spotify.qt"));
    }

    #[test]
    fn test_classify_other_errors_are_remote() {
        let err = classify_name("Next", "com.spotify.Error.Failed", String::new());
        match err {
            BusError::Remote { name, message } => {
                assert_eq!(name, "com.spotify.Error.Failed");
                assert_eq!(message, "com.spotify.Error.Failed");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    fn fdo(err: zbus::fdo::Error) -> zbus::Error {
        zbus::Error::FDO(Box::new(err))
    }

    #[test]
    fn test_missing_targets_try_legacy() {
        assert!(should_try_legacy(&fdo(zbus::fdo::Error::UnknownMethod("Quit".into()))));
        assert!(should_try_legacy(&fdo(zbus::fdo::Error::UnknownInterface("x".into()))));
        assert!(should_try_legacy(&fdo(zbus::fdo::Error::UnknownObject("/".into()))));
        assert!(!should_try_legacy(&fdo(zbus::fdo::Error::ServiceUnknown("x".into()))));
        assert!(!should_try_legacy(&zbus::Error::Failure("boom".into())));
    }

    #[test]
    fn test_fallback_reaches_legacy_target() {
        let mut legacy_called = false;
        let result = call_with_fallback(
            || Err(fdo(zbus::fdo::Error::UnknownMethod("Quit".into()))),
            || {
                legacy_called = true;
                Ok(())
            },
        );
        assert!(result.is_ok());
        assert!(legacy_called);
    }

    #[test]
    fn test_fallback_skipped_after_success_or_other_errors() {
        let mut legacy_calls = 0;
        call_with_fallback(|| Ok(()), || {
            legacy_calls += 1;
            Ok(())
        })
        .unwrap();

        let err = call_with_fallback(
            || Err(fdo(zbus::fdo::Error::NoReply("timeout".into()))),
            || {
                legacy_calls += 1;
                Ok(())
            },
        )
        .unwrap_err();
        assert_eq!(legacy_calls, 0);
        assert!(classify("Next", err).is_transport());
    }

    #[test]
    fn test_fallback_reports_primary_error_when_both_fail() {
        let err = call_with_fallback(
            || Err(fdo(zbus::fdo::Error::UnknownMethod("Quit".into()))),
            || Err(fdo(zbus::fdo::Error::UnknownObject("/".into()))),
        )
        .unwrap_err();
        assert!(matches!(
            classify("Quit", err),
            BusError::Unsupported { ref member } if member == "Quit"
        ));
    }

    #[test]
    fn test_decode_metadata_dict_skips_unreadable_entries() {
        let mut bag: HashMap<&str, Value<'_>> = HashMap::new();
        bag.insert("xesam:title", Value::from("T1"));
        bag.insert("xesam:artist", Value::from(vec!["A1"]));
        bag.insert("mpris:length", Value::from(215_000_000i64));
        bag.insert(
            "mpris:trackid",
            Value::from(ObjectPath::try_from("/track/1").unwrap()),
        );
        bag.insert("weird", Value::Structure(Structure::from((1u32, "x"))));
        let value = OwnedValue::try_from(Value::from(bag)).unwrap();

        let PropValue::Map(map) = decode("Metadata", value).unwrap() else {
            panic!("Metadata should decode to a map");
        };
        assert_eq!(map.get("xesam:title"), Some(&PropValue::from("T1")));
        assert_eq!(
            map.get("xesam:artist"),
            Some(&PropValue::List(vec!["A1".into()]))
        );
        assert_eq!(map.get("mpris:length"), Some(&PropValue::Int(215_000_000)));
        assert_eq!(map.get("mpris:trackid"), Some(&PropValue::from("/track/1")));
        assert!(!map.contains_key("weird"));
    }

    #[test]
    fn test_from_value_scalars() {
        assert_eq!(
            from_value("Shuffle", &Value::from(true)).unwrap(),
            PropValue::Bool(true)
        );
        assert_eq!(
            from_value("Volume", &Value::from(0.5f64)).unwrap(),
            PropValue::Double(0.5)
        );
        assert_eq!(
            from_value("Position", &Value::from(42i64)).unwrap(),
            PropValue::Int(42)
        );
        assert_eq!(
            from_value("PlaybackStatus", &Value::from("Paused")).unwrap(),
            PropValue::Str("Paused".into())
        );
    }

    #[test]
    fn test_from_value_unwraps_variants_and_arrays() {
        let artists = Value::from(vec!["A1", "A2"]);
        assert_eq!(
            from_value("xesam:artist", &Value::Value(Box::new(artists))).unwrap(),
            PropValue::List(vec!["A1".into(), "A2".into()])
        );
    }
}
