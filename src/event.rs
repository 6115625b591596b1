use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use evdev::{EventType, InputEvent, KeyCode, MiscCode, SynchronizationCode};

use crate::config::parse_key;

// Input to the engine. Key events drive the combo state machine; everything
// else is carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Key(KeyEvent),
    Other(OtherEvent),
}

// One EV_KEY transition with its device timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub time: SystemTime,
    pub key: KeyCode,
    pub value: KeyValue,
}

// A non-key event (EV_SYN, EV_MSC, ...) in raw form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtherEvent {
    pub time: SystemTime,
    pub event_type: EventType,
    pub code: u16,
    pub value: i32,
}

// InputEvent#value of an EV_KEY event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Release,
    Press,
    Repeat,
}

impl KeyValue {
    pub fn new(value: i32) -> Option<KeyValue> {
        let value = match value {
            0 => KeyValue::Release,
            1 => KeyValue::Press,
            2 => KeyValue::Repeat,
            _ => return None,
        };
        Some(value)
    }

    pub fn value(&self) -> i32 {
        match self {
            KeyValue::Release => 0,
            KeyValue::Press => 1,
            KeyValue::Repeat => 2,
        }
    }

    fn word(&self) -> &'static str {
        match self {
            KeyValue::Release => "up",
            KeyValue::Press => "down",
            KeyValue::Repeat => "repeat",
        }
    }

    fn from_word(word: &str) -> Option<KeyValue> {
        let value = match word {
            "up" => KeyValue::Release,
            "down" => KeyValue::Press,
            "repeat" => KeyValue::Repeat,
            _ => return None,
        };
        Some(value)
    }
}

impl KeyEvent {
    pub fn new(time: SystemTime, key: KeyCode, value: KeyValue) -> KeyEvent {
        KeyEvent { time, key, value }
    }

    pub fn press(time: SystemTime, key: KeyCode) -> KeyEvent {
        KeyEvent::new(time, key, KeyValue::Press)
    }

    pub fn release(time: SystemTime, key: KeyCode) -> KeyEvent {
        KeyEvent::new(time, key, KeyValue::Release)
    }
}

impl Event {
    pub fn time(&self) -> SystemTime {
        match self {
            Event::Key(event) => event.time,
            Event::Other(event) => event.time,
        }
    }

    // Convert evdev's raw InputEvent to chordmap's internal Event
    pub fn from_input_event(raw: &InputEvent) -> Event {
        if raw.event_type() == EventType::KEY {
            if let Some(value) = KeyValue::new(raw.value()) {
                return Event::Key(KeyEvent {
                    time: raw.timestamp(),
                    key: KeyCode::new(raw.code()),
                    value,
                });
            }
        }
        Event::Other(OtherEvent {
            time: raw.timestamp(),
            event_type: raw.event_type(),
            code: raw.code(),
            value: raw.value(),
        })
    }

    // The uinput side stamps its own time on emit.
    pub fn to_input_event(&self) -> InputEvent {
        match self {
            Event::Key(event) => InputEvent::new(EventType::KEY.0, event.key.code(), event.value.value()),
            Event::Other(event) => InputEvent::new(event.event_type.0, event.code, event.value),
        }
    }

    // Equality ignoring timestamps.
    pub fn same_event(&self, other: &Event) -> bool {
        match (self, other) {
            (Event::Key(a), Event::Key(b)) => a.key == b.key && a.value == b.value,
            (Event::Other(a), Event::Other(b)) => {
                a.event_type == b.event_type && a.code == b.code && a.value == b.value
            }
            _ => false,
        }
    }

    /// Parse one `<sec>;<usec>;<type>;<code>;<value>` record, e.g.
    /// `1712500001;862966;EV_KEY;KEY_A;down`.
    pub fn parse_csv(line: &str) -> Result<Event> {
        let fields: Vec<&str> = line.trim().split(';').collect();
        let &[sec, usec, event_type, code, value] = fields.as_slice() else {
            bail!("malformed event line (want 5 fields): {line:?}");
        };
        let sec: u64 = sec.parse().with_context(|| format!("bad seconds in {line:?}"))?;
        let usec: u64 = usec.parse().with_context(|| format!("bad microseconds in {line:?}"))?;
        let time = UNIX_EPOCH + Duration::from_secs(sec) + Duration::from_micros(usec);

        if event_type == "EV_KEY" {
            let key = parse_key(code)?;
            let Some(value) = KeyValue::from_word(value) else {
                bail!("bad key transition {value:?} in {line:?}");
            };
            return Ok(Event::Key(KeyEvent { time, key, value }));
        }

        let event_type = parse_event_type(event_type)?;
        let code = parse_code(event_type, code)?;
        let value = parse_value(value)?;
        Ok(Event::Other(OtherEvent { time, event_type, code, value }))
    }

    // Render back to the same CSV form.
    pub fn to_csv(&self) -> String {
        let (sec, usec) = split_time(self.time());
        match self {
            Event::Key(event) => {
                format!("{sec};{usec};EV_KEY;{:?};{}", event.key, event.value.word())
            }
            Event::Other(event) => format!(
                "{sec};{usec};{};{};{}",
                event_type_name(event.event_type),
                code_name(event.event_type, event.code),
                value_name(event.value),
            ),
        }
    }
}

fn split_time(time: SystemTime) -> (u64, u32) {
    let elapsed = time.duration_since(UNIX_EPOCH).unwrap_or_default();
    (elapsed.as_secs(), elapsed.subsec_micros())
}

fn parse_event_type(name: &str) -> Result<EventType> {
    let event_type = match name {
        "EV_SYN" => EventType::SYNCHRONIZATION,
        "EV_REL" => EventType::RELATIVE,
        "EV_ABS" => EventType::ABSOLUTE,
        "EV_MSC" => EventType::MISC,
        "EV_SW" => EventType::SWITCH,
        "EV_LED" => EventType::LED,
        "EV_SND" => EventType::SOUND,
        _ => bail!("unknown event type {name:?}"),
    };
    Ok(event_type)
}

fn event_type_name(event_type: EventType) -> &'static str {
    match event_type {
        EventType::SYNCHRONIZATION => "EV_SYN",
        EventType::RELATIVE => "EV_REL",
        EventType::ABSOLUTE => "EV_ABS",
        EventType::MISC => "EV_MSC",
        EventType::SWITCH => "EV_SW",
        EventType::LED => "EV_LED",
        EventType::SOUND => "EV_SND",
        _ => "EV_UNKNOWN",
    }
}

fn parse_code(event_type: EventType, name: &str) -> Result<u16> {
    // The handful of names that show up in keyboard logs; anything else may
    // be given numerically.
    let code = match name {
        "SYN_REPORT" => SynchronizationCode::SYN_REPORT.0,
        "SYN_DROPPED" => SynchronizationCode::SYN_DROPPED.0,
        "MSC_SCAN" => MiscCode::MSC_SCAN.0,
        _ => name
            .parse()
            .with_context(|| format!("unknown {} code {name:?}", event_type_name(event_type)))?,
    };
    Ok(code)
}

fn code_name(event_type: EventType, code: u16) -> String {
    match event_type {
        EventType::SYNCHRONIZATION => format!("{:?}", SynchronizationCode(code)),
        EventType::MISC => format!("{:?}", MiscCode(code)),
        _ => code.to_string(),
    }
}

fn parse_value(word: &str) -> Result<i32> {
    match KeyValue::from_word(word) {
        Some(value) => Ok(value.value()),
        None => word.parse().with_context(|| format!("bad event value {word:?}")),
    }
}

fn value_name(value: i32) -> String {
    match KeyValue::new(value) {
        Some(value) => value.word().to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(line: &str) {
        let event = Event::parse_csv(line).unwrap();
        assert_eq!(event.to_csv(), line);
    }

    #[test]
    fn test_csv_roundtrip_key() {
        roundtrip("1712500001;862966;EV_KEY;KEY_A;down");
        roundtrip("1712500002;22233;EV_KEY;KEY_BACKSPACE;up");
        roundtrip("1712500003;0;EV_KEY;KEY_F;repeat");
    }

    #[test]
    fn test_csv_roundtrip_other() {
        roundtrip("1737965475;912716;EV_MSC;MSC_SCAN;458769");
        roundtrip("1737965475;912716;EV_SYN;SYN_REPORT;up");
    }

    #[test]
    fn test_csv_key_names_case_insensitive() {
        let event = Event::parse_csv("1;2;EV_KEY;backspace;down").unwrap();
        assert_eq!(event.to_csv(), "1;2;EV_KEY;KEY_BACKSPACE;down");
    }

    #[test]
    fn test_csv_rejects_garbage() {
        assert!(Event::parse_csv("not an event").is_err());
        assert!(Event::parse_csv("1;2;EV_KEY;KEY_NO_SUCH_KEY;down").is_err());
        assert!(Event::parse_csv("1;2;EV_KEY;KEY_A;sideways").is_err());
        assert!(Event::parse_csv("1;2;EV_BOGUS;0;0").is_err());
    }

    #[test]
    fn test_same_event_ignores_time() {
        let a = Event::parse_csv("1;0;EV_KEY;KEY_A;down").unwrap();
        let b = Event::parse_csv("2;500;EV_KEY;KEY_A;down").unwrap();
        let c = Event::parse_csv("1;0;EV_KEY;KEY_A;up").unwrap();
        assert!(a.same_event(&b));
        assert!(!a.same_event(&c));
        assert_ne!(a, b);
    }
}
