use std::collections::{HashMap, HashSet};
use std::time::{Duration, SystemTime};

use evdev::KeyCode;
use log::debug;

use crate::combo::{Candidates, Combo, ComboTable};
use crate::event::{Event, KeyEvent, KeyValue};
use crate::pending::PendingBuffer;
use crate::timing::TimingPolicy;

// A combo whose synthetic output has already been written while some of its
// input keys are still physically down; their releases must be swallowed.
#[derive(Debug)]
struct ArmedCombo {
    outstanding: HashMap<KeyCode, SystemTime>,
}

/// The match resolver. Feeds on one event at a time and decides, per event,
/// whether to pass it through, hold it back, rewrite it as a combo, or drop
/// it. Holds no I/O; the engine loop wires it to a reader and writer.
pub struct EventHandler {
    timing: TimingPolicy,
    pending: PendingBuffer,
    // keys physically down right now, with their press time
    held: HashMap<KeyCode, SystemTime>,
    armed: Vec<ArmedCombo>,
    output: Vec<Event>,
}

impl EventHandler {
    pub fn new(timing: TimingPolicy) -> EventHandler {
        EventHandler {
            timing,
            pending: PendingBuffer::new(),
            held: HashMap::new(),
            armed: Vec::new(),
            output: Vec::new(),
        }
    }

    /// Run one event through the resolver and return the events to write, in
    /// order. Never fails: malformed sequences degrade to pass-through.
    pub fn on_event(&mut self, event: &Event, combos: &ComboTable) -> Vec<Event> {
        match event {
            // Non-key events are forwarded as-is and never affect matching.
            Event::Other(_) => self.output.push(*event),
            Event::Key(key_event) => match key_event.value {
                KeyValue::Press => self.on_press(*key_event, combos),
                KeyValue::Release => self.on_release(*key_event, combos),
                KeyValue::Repeat => self.on_repeat(*key_event),
            },
        }
        self.output.drain(..).collect()
    }

    /// End of stream: everything still buffered goes out as-is.
    pub fn flush(&mut self) -> Vec<Event> {
        self.emit_pending();
        self.output.drain(..).collect()
    }

    fn on_press(&mut self, event: KeyEvent, combos: &ComboTable) {
        if self.held.contains_key(&event.key) {
            // a second press without a release in between; treat like a repeat
            self.on_repeat(event);
            return;
        }
        self.held.insert(event.key, event.time);
        self.pending.append(event);

        match combos.candidates_for(&self.chord_set()) {
            Candidates::Complete => {
                // chord complete; hold everything until a release confirms or
                // rejects it
            }
            Candidates::Prefix => {
                // an unfinished chord has to come together within the window
                if let Some(first) = self.pending.first_down_timestamp() {
                    if duration_between(first, event.time) > self.timing.combo_window {
                        let stale = self.pending.flush_through(|queued| queued.key != event.key);
                        self.emit_keys(stale);
                    }
                }
            }
            Candidates::None => {
                // no chord can grow out of this; let the buffer go, keeping
                // the new key back only if it could start a chord of its own
                if combos.starts_combo(event.key) {
                    let flushed = self.pending.flush_through(|queued| queued.key != event.key);
                    self.emit_keys(flushed);
                } else {
                    self.emit_pending();
                }
            }
        }
    }

    fn on_release(&mut self, event: KeyEvent, combos: &ComboTable) {
        let Some(pressed_at) = self.held.remove(&event.key) else {
            // release for a key that never went down; same device glitch as
            // the orphan repeat
            debug!("dropping orphan release: {:?}", event.key);
            return;
        };

        // a fired combo still holding this key swallows the release
        let mut claimed = false;
        for armed in &mut self.armed {
            claimed |= armed.outstanding.remove(&event.key).is_some();
        }
        self.armed.retain(|armed| !armed.outstanding.is_empty());
        if claimed {
            return;
        }

        if self.pending.contains_down(event.key) {
            if let Some((combo, last_down)) = self.confirmed_combo(&event, pressed_at, combos) {
                self.fire(combo, &event, last_down);
                return;
            }
        }
        // a lone press, a chord that broke up too quickly, or the release of
        // an already-committed key; put the buffer out first so the stream
        // stays in order
        self.emit_pending();
        self.output.push(Event::Key(event));
    }

    fn on_repeat(&mut self, event: KeyEvent) {
        if self.pending.contains_down(event.key) {
            // auto-repeat means the key is held down to type, not to chord
            self.emit_pending();
            self.output.push(Event::Key(event));
        } else if self.armed_holds(event.key) {
            // the combo already rewrote this key; nothing to repeat
        } else if self.held.contains_key(&event.key) {
            self.output.push(Event::Key(event));
        } else {
            debug!("dropping orphan repeat: {:?}", event.key);
        }
    }

    // The released key completes a combo iff the keys down right now are
    // exactly some combo's key set and the chord did not fall apart at the
    // instant it was completed.
    fn confirmed_combo<'a>(
        &self,
        event: &KeyEvent,
        pressed_at: SystemTime,
        combos: &'a ComboTable,
    ) -> Option<(&'a Combo, SystemTime)> {
        let (set, order) = self.chord_keys();
        let combo = combos.complete_match(&set, &order)?;
        let last_down = combo
            .keys()
            .iter()
            .map(|key| {
                if *key == event.key {
                    pressed_at
                } else {
                    self.held.get(key).copied().unwrap_or(pressed_at)
                }
            })
            .max()?;
        if duration_between(last_down, event.time) < self.timing.min_overlap {
            debug!("chord touched too briefly, passing through: {:?}", combo.keys());
            return None;
        }
        Some((combo, last_down))
    }

    fn fire(&mut self, combo: &Combo, trigger: &KeyEvent, last_down: SystemTime) {
        debug!("combo fired: {:?} => {:?}", combo.keys(), combo.out_keys());
        for key in combo.out_keys() {
            self.output.push(Event::Key(KeyEvent::press(last_down, *key)));
        }
        for key in combo.out_keys().iter().rev() {
            self.output.push(Event::Key(KeyEvent::release(trigger.time, *key)));
        }
        // the raw presses are now represented by the synthetic output
        self.pending.drop_matching(combo.key_set());
        let outstanding: HashMap<KeyCode, SystemTime> = combo
            .keys()
            .iter()
            .filter(|key| **key != trigger.key)
            .filter_map(|key| self.held.get(key).map(|time| (*key, *time)))
            .collect();
        if !outstanding.is_empty() {
            self.armed.push(ArmedCombo { outstanding });
        }
    }

    fn armed_holds(&self, key: KeyCode) -> bool {
        self.armed.iter().any(|armed| armed.outstanding.contains_key(&key))
    }

    // Keys that can take part in a chord right now: the pending presses plus
    // keys a fired combo is still holding (those may chord again).
    fn chord_keys(&self) -> (HashSet<KeyCode>, Vec<KeyCode>) {
        let mut keys: Vec<(KeyCode, SystemTime)> = self.pending.down_keys().collect();
        for armed in &self.armed {
            for (key, time) in &armed.outstanding {
                if !keys.iter().any(|(seen, _)| seen == key) {
                    keys.push((*key, *time));
                }
            }
        }
        keys.sort_by_key(|(key, time)| (*time, key.code()));
        let set = keys.iter().map(|(key, _)| *key).collect();
        let order = keys.into_iter().map(|(key, _)| key).collect();
        (set, order)
    }

    fn chord_set(&self) -> HashSet<KeyCode> {
        self.chord_keys().0
    }

    fn emit_pending(&mut self) {
        let events = self.pending.take_all();
        self.emit_keys(events);
    }

    fn emit_keys(&mut self, events: Vec<KeyEvent>) {
        self.output.extend(events.into_iter().map(Event::Key));
    }
}

fn duration_between(earlier: SystemTime, later: SystemTime) -> Duration {
    // saturates on out-of-order timestamps instead of failing
    later.duration_since(earlier).unwrap_or_default()
}
