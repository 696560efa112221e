//! In-memory player for tests. Records every dial, read, write and call.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use super::{Dialer, Session};
use crate::error::{BusError, BusResult};
use crate::models::{Method, PropValue};

#[derive(Debug, Default)]
pub struct FakePlayer {
    pub properties: HashMap<String, PropValue>,
    pub calls: Vec<Method>,
    pub reads: Vec<String>,
    pub writes: Vec<(String, PropValue)>,
    pub dials: u32,
    /// Upcoming dials to refuse.
    pub refuse_dials: u32,
    /// Upcoming session operations to fail with a transport fault.
    pub transport_faults: u32,
}

impl FakePlayer {
    /// A player with a track loaded and both skip directions allowed.
    pub fn shared() -> Rc<RefCell<Self>> {
        let mut player = FakePlayer::default();
        player.set("Metadata", metadata("A1", "T1", "Al1"));
        player.set("PlaybackStatus", PropValue::from("Playing"));
        player.set("CanGoNext", PropValue::Bool(true));
        player.set("CanGoPrevious", PropValue::Bool(true));
        player.set("Shuffle", PropValue::Bool(false));
        Rc::new(RefCell::new(player))
    }

    pub fn set(&mut self, name: &str, value: PropValue) {
        self.properties.insert(name.to_string(), value);
    }

    fn take_fault(&mut self) -> BusResult<()> {
        if self.transport_faults > 0 {
            self.transport_faults -= 1;
            return Err(BusError::Transport(
                "org.freedesktop.DBus.Error.NoReply: Did not receive a reply".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn metadata(artist: &str, title: &str, album: &str) -> PropValue {
    let mut map = BTreeMap::new();
    map.insert(
        "xesam:artist".to_string(),
        PropValue::List(vec![PropValue::from(artist)]),
    );
    map.insert("xesam:title".to_string(), PropValue::from(title));
    map.insert("xesam:album".to_string(), PropValue::from(album));
    PropValue::Map(map)
}

pub struct FakeDialer {
    player: Rc<RefCell<FakePlayer>>,
}

impl FakeDialer {
    pub fn new(player: &Rc<RefCell<FakePlayer>>) -> Self {
        Self {
            player: Rc::clone(player),
        }
    }
}

impl Dialer for FakeDialer {
    type Session = FakeSession;

    fn dial(&self) -> BusResult<FakeSession> {
        let mut player = self.player.borrow_mut();
        player.dials += 1;
        if player.refuse_dials > 0 {
            player.refuse_dials -= 1;
            return Err(BusError::Connect {
                bus_name: "com.spotify.qt".to_string(),
                reason: "name has no owner".to_string(),
            });
        }
        Ok(FakeSession {
            player: Rc::clone(&self.player),
        })
    }
}

pub struct FakeSession {
    player: Rc<RefCell<FakePlayer>>,
}

impl Session for FakeSession {
    fn read_property(&self, name: &str) -> BusResult<PropValue> {
        let mut player = self.player.borrow_mut();
        player.take_fault()?;
        player.reads.push(name.to_string());
        player
            .properties
            .get(name)
            .cloned()
            .ok_or_else(|| BusError::Unsupported {
                member: name.to_string(),
            })
    }

    fn write_property(&self, name: &str, value: PropValue) -> BusResult<()> {
        let mut player = self.player.borrow_mut();
        player.take_fault()?;
        player.writes.push((name.to_string(), value.clone()));
        player.properties.insert(name.to_string(), value);
        Ok(())
    }

    fn invoke(&self, method: Method) -> BusResult<()> {
        let mut player = self.player.borrow_mut();
        player.take_fault()?;
        player.calls.push(method);
        Ok(())
    }
}
