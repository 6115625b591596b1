use std::collections::{HashSet, VecDeque};
use std::time::SystemTime;

use evdev::KeyCode;

use crate::event::{KeyEvent, KeyValue};

/// Key events read from the stream but not yet committed to the output,
/// because they may still turn into a combo. FIFO; also tracks which of its
/// keys are down and when the oldest of them went down.
#[derive(Debug, Default)]
pub struct PendingBuffer {
    events: VecDeque<KeyEvent>,
    // presses still in `events`, in press order
    down_keys: Vec<(KeyCode, SystemTime)>,
}

impl PendingBuffer {
    pub fn new() -> PendingBuffer {
        PendingBuffer::default()
    }

    pub fn append(&mut self, event: KeyEvent) {
        if event.value == KeyValue::Press && !self.contains_down(event.key) {
            self.down_keys.push((event.key, event.time));
        }
        self.events.push_back(event);
    }

    /// Pop and return the leading run of events satisfying `predicate`.
    pub fn flush_through(&mut self, mut predicate: impl FnMut(&KeyEvent) -> bool) -> Vec<KeyEvent> {
        let mut flushed = Vec::new();
        while let Some(front) = self.events.front() {
            if !predicate(front) {
                break;
            }
            if let Some(event) = self.events.pop_front() {
                self.forget_down(&event);
                flushed.push(event);
            }
        }
        flushed
    }

    pub fn take_all(&mut self) -> Vec<KeyEvent> {
        self.down_keys.clear();
        self.events.drain(..).collect()
    }

    /// Remove every event whose key is in `keys`; a fired combo owns them now.
    pub fn drop_matching(&mut self, keys: &HashSet<KeyCode>) {
        self.events.retain(|event| !keys.contains(&event.key));
        self.down_keys.retain(|(key, _)| !keys.contains(key));
    }

    pub fn peek_front(&self) -> Option<&KeyEvent> {
        self.events.front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains_down(&self, key: KeyCode) -> bool {
        self.down_keys.iter().any(|(down, _)| *down == key)
    }

    pub fn down_set(&self) -> HashSet<KeyCode> {
        self.down_keys.iter().map(|(key, _)| *key).collect()
    }

    /// Pending presses with their timestamps, in press order.
    pub fn down_keys(&self) -> impl Iterator<Item = (KeyCode, SystemTime)> + '_ {
        self.down_keys.iter().copied()
    }

    pub fn first_down_timestamp(&self) -> Option<SystemTime> {
        self.down_keys.first().map(|(_, time)| *time)
    }

    fn forget_down(&mut self, event: &KeyEvent) {
        if event.value == KeyValue::Press {
            self.down_keys.retain(|(key, _)| *key != event.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use evdev::KeyCode as Key;

    use super::*;

    fn press(key: Key, millis: u64) -> KeyEvent {
        KeyEvent::press(UNIX_EPOCH + Duration::from_millis(millis), key)
    }

    #[test]
    fn test_append_tracks_downs() {
        let mut pending = PendingBuffer::new();
        pending.append(press(Key::KEY_F, 10));
        pending.append(press(Key::KEY_J, 30));
        assert_eq!(pending.len(), 2);
        assert!(pending.contains_down(Key::KEY_F));
        assert_eq!(pending.first_down_timestamp(), Some(UNIX_EPOCH + Duration::from_millis(10)));
        assert_eq!(pending.down_set().len(), 2);
    }

    #[test]
    fn test_flush_through_stops_at_predicate() {
        let mut pending = PendingBuffer::new();
        pending.append(press(Key::KEY_F, 10));
        pending.append(press(Key::KEY_J, 30));
        let flushed = pending.flush_through(|event| event.key != Key::KEY_J);
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].key, Key::KEY_F);
        assert!(!pending.contains_down(Key::KEY_F));
        assert_eq!(pending.first_down_timestamp(), Some(UNIX_EPOCH + Duration::from_millis(30)));
    }

    #[test]
    fn test_drop_matching_clears_combo_keys() {
        let mut pending = PendingBuffer::new();
        pending.append(press(Key::KEY_F, 10));
        pending.append(press(Key::KEY_J, 30));
        pending.drop_matching(&[Key::KEY_F, Key::KEY_J].into_iter().collect());
        assert!(pending.is_empty());
        assert_eq!(pending.first_down_timestamp(), None);
    }

    #[test]
    fn test_take_all_in_order() {
        let mut pending = PendingBuffer::new();
        pending.append(press(Key::KEY_F, 10));
        pending.append(press(Key::KEY_J, 30));
        let all = pending.take_all();
        assert_eq!(all.iter().map(|event| event.key).collect::<Vec<_>>(), vec![Key::KEY_F, Key::KEY_J]);
        assert!(pending.is_empty());
        assert!(pending.peek_front().is_none());
    }
}
