use std::{collections::VecDeque, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    beatmap::ZONE_COUNT,
    events::{Listeners, SubscriptionId},
    FilletError, Result,
};

/// Emitted for every recognized key while the classifier is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    ZonePressed(usize),
}

/// Fixed lookup from key names to zone indices. Position in the table is the zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyMap {
    keys: Vec<String>,
}

impl KeyMap {
    /// Builds a key map with exactly one distinct key per zone.
    pub fn new<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let map = Self {
            keys: keys.into_iter().map(Into::into).collect(),
        };
        map.validate()?;
        Ok(map)
    }

    pub fn validate(&self) -> Result<()> {
        if self.keys.len() != ZONE_COUNT {
            return Err(FilletError::msg(format!(
                "key map needs exactly {ZONE_COUNT} keys, got {}",
                self.keys.len()
            )));
        }
        for (index, key) in self.keys.iter().enumerate() {
            if key.is_empty() {
                return Err(FilletError::InvalidInput("key names must not be empty"));
            }
            if self.keys[..index].contains(key) {
                return Err(FilletError::msg(format!("key `{key}` is bound to more than one zone")));
            }
        }
        Ok(())
    }

    pub fn zone_for(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|candidate| candidate == key)
    }

    pub fn key_for(&self, zone: usize) -> Option<&str> {
        self.keys.get(zone).map(String::as_str)
    }
}

impl Default for KeyMap {
    /// Number row `1`..`5`, left to right.
    fn default() -> Self {
        Self {
            keys: ["1", "2", "3", "4", "5"].map(String::from).to_vec(),
        }
    }
}

/// Something that produces raw key presses: a keyboard, a replay, a test.
pub trait InputSource {
    /// Next press that happened at or before `now_ms`, if any. The press
    /// carries the playback time it was made at, which is what gets judged.
    fn next_press(&mut self, now_ms: f64) -> Option<KeyPress>;
}

/// A raw key press stamped with the playback time it happened at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPress {
    pub at_ms: f64,
    pub key: String,
}

/// Replays recorded presses once their timestamp has been reached.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    pending: VecDeque<KeyPress>,
}

impl ScriptedInput {
    pub fn new(mut presses: Vec<KeyPress>) -> Self {
        presses.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));
        Self {
            pending: presses.into(),
        }
    }

    /// Reads a JSON array of `{"at_ms": .., "key": ..}` objects.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let presses: Vec<KeyPress> = serde_json::from_str(&json)?;
        if let Some(bad) = presses.iter().find(|press| !press.at_ms.is_finite()) {
            tracing::warn!(key = %bad.key, "input script contains a non-finite timestamp");
            return Err(FilletError::InvalidInput("input script timestamps must be finite"));
        }
        Ok(Self::new(presses))
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl InputSource for ScriptedInput {
    fn next_press(&mut self, now_ms: f64) -> Option<KeyPress> {
        if self.pending.front()?.at_ms <= now_ms {
            self.pending.pop_front()
        } else {
            None
        }
    }
}

/// Turns raw key presses into zone presses while a session is running.
pub struct InputClassifier {
    key_map: KeyMap,
    active: bool,
    source: Option<Box<dyn InputSource>>,
    listeners: Listeners<InputEvent>,
}

impl InputClassifier {
    pub fn new(key_map: KeyMap) -> Self {
        Self {
            key_map,
            active: false,
            source: None,
            listeners: Listeners::new(),
        }
    }

    pub fn start(&mut self) {
        self.active = true;
    }

    /// Stops forwarding input. Keys seen while stopped are dropped, not queued.
    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn key_map(&self) -> &KeyMap {
        &self.key_map
    }

    /// Resolves one raw key. Returns the zone and notifies listeners only when
    /// active and the key is bound.
    pub fn classify(&mut self, key: &str) -> Option<usize> {
        if !self.active {
            return None;
        }
        let zone = self.key_map.zone_for(key)?;
        self.listeners.emit(&InputEvent::ZonePressed(zone));
        Some(zone)
    }

    /// Connects a raw input source, replacing any previous one.
    pub fn attach<S>(&mut self, source: S)
    where
        S: InputSource + 'static,
    {
        self.source = Some(Box::new(source));
    }

    /// Disconnects and returns the current source.
    pub fn detach(&mut self) -> Option<Box<dyn InputSource>> {
        self.source.take()
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Drains every press the attached source has ready at `now_ms` and
    /// returns the recognized ones as `(zone, at_ms)`, in press order.
    pub fn pump(&mut self, now_ms: f64) -> Vec<(usize, f64)> {
        let Some(mut source) = self.source.take() else {
            return Vec::new();
        };
        let mut zones = Vec::new();
        while let Some(press) = source.next_press(now_ms) {
            if let Some(zone) = self.classify(&press.key) {
                zones.push((zone, press.at_ms));
            }
        }
        self.source = Some(source);
        zones
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&InputEvent) + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

impl Default for InputClassifier {
    fn default() -> Self {
        Self::new(KeyMap::default())
    }
}

impl std::fmt::Debug for InputClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputClassifier")
            .field("key_map", &self.key_map)
            .field("active", &self.active)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}
