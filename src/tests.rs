use std::time::{Duration, UNIX_EPOCH};

use evdev::KeyCode as Key;

use crate::combo::{Combo, ComboTable};
use crate::config::parse_key;
use crate::engine::{man_in_the_middle, EngineOptions};
use crate::event::{Event, KeyEvent, KeyValue};
use crate::input::SliceReader;
use crate::output::SliceWriter;
use crate::timing::TimingPolicy;

pub fn fjk_combos() -> ComboTable {
    ComboTable::new(vec![
        Combo::new(vec![Key::KEY_F, Key::KEY_J], vec![Key::KEY_X]),
        Combo::new(vec![Key::KEY_F, Key::KEY_K], vec![Key::KEY_Y]),
    ])
}

pub fn run_events(events: Vec<Event>, combos: &ComboTable) -> Vec<Event> {
    // the test harness looks at key events only, like the reference logs
    run_events_with(
        events,
        combos,
        TimingPolicy::default(),
        EngineOptions {
            forward_other_events: false,
        },
    )
}

pub fn run_events_with(
    events: Vec<Event>,
    combos: &ComboTable,
    timing: TimingPolicy,
    options: EngineOptions,
) -> Vec<Event> {
    let mut reader = SliceReader::new(events);
    let mut writer = SliceWriter::default();
    man_in_the_middle(&mut reader, &mut writer, combos, timing, options).unwrap();
    writer.events
}

pub fn parse_csv_block(block: &str) -> Vec<Event> {
    block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| Event::parse_csv(line).unwrap())
        .collect()
}

/// Parse the compact timing notation: `f_` is a press, `f/` a release, and a
/// parenthesized duration like `(105.844ms)` advances the clock between keys.
pub fn parse_state_string(input: &str) -> Vec<Event> {
    let mut time = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let mut events = Vec::new();
    for (i, token) in input.split_whitespace().enumerate() {
        if i % 2 == 1 {
            time += parse_gap(token);
            continue;
        }
        let value = match token.chars().last() {
            Some('_') => KeyValue::Press,
            Some('/') => KeyValue::Release,
            other => panic!("bad key token {token:?} (ends in {other:?})"),
        };
        let key = parse_key(&token[..token.len() - 1]).unwrap();
        events.push(Event::Key(KeyEvent::new(time, key, value)));
    }
    events
}

fn parse_gap(token: &str) -> Duration {
    let body = token
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or_else(|| panic!("bad gap token {token:?}"));
    for (suffix, nanos_per_unit) in [("ns", 1.0), ("µs", 1e3), ("us", 1e3), ("ms", 1e6), ("s", 1e9)] {
        if let Some(number) = body.strip_suffix(suffix) {
            let nanos = number.parse::<f64>().unwrap() * nanos_per_unit;
            return Duration::from_nanos(nanos.round() as u64);
        }
    }
    panic!("bad gap token {token:?}")
}

/// `X-down` short form, timestamps stripped.
pub fn short(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .map(|event| match event {
            Event::Key(key_event) => {
                let name = format!("{:?}", key_event.key);
                let word = match key_event.value {
                    KeyValue::Press => "down",
                    KeyValue::Release => "up",
                    KeyValue::Repeat => "repeat",
                };
                format!("{}-{}", name.trim_start_matches("KEY_"), word)
            }
            Event::Other(_) => event.to_csv(),
        })
        .collect()
}

pub fn assert_short(output: &[Event], expected: &str) {
    let expected: Vec<String> = expected
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();
    assert_eq!(short(output), expected);
}

pub fn assert_csv(input: &str, expected: &str, combos: &ComboTable) {
    let output = run_events(parse_csv_block(input), combos);
    assert_short(&output, expected);
}

pub fn assert_state_string(input: &str, expected: &str, combos: &ComboTable) {
    let output = run_events(parse_state_string(input), combos);
    assert_short(&output, expected);
}

const ASDF_EVENTS: &str = "
    1712500001;862966;EV_KEY;KEY_A;down
    1712500002;22233;EV_KEY;KEY_A;up
    1712500002;478346;EV_KEY;KEY_S;down
    1712500002;637660;EV_KEY;KEY_S;up
    1712500003;35798;EV_KEY;KEY_D;down
    1712500003;132219;EV_KEY;KEY_D;up
    1712500003;948232;EV_KEY;KEY_F;down
    1712500004;116984;EV_KEY;KEY_F;up
";

// Combos that share keys with the stream but never fully assemble must leave
// the stream untouched, timestamps included.
#[test]
fn test_no_match_passthrough_is_verbatim() {
    let tables = [
        ComboTable::new(vec![Combo::new(vec![Key::KEY_A, Key::KEY_F], vec![Key::KEY_X])]),
        ComboTable::new(vec![Combo::new(vec![Key::KEY_G, Key::KEY_H], vec![Key::KEY_X])]),
        ComboTable::new(vec![
            Combo::new(vec![Key::KEY_G, Key::KEY_H], vec![Key::KEY_X]),
            Combo::new(vec![Key::KEY_A, Key::KEY_K], vec![Key::KEY_X]),
        ]),
    ];
    let events = parse_csv_block(ASDF_EVENTS);
    for table in tables {
        assert_eq!(run_events(events.clone(), &table), events);
    }
}

#[test]
fn test_empty_table_is_identity() {
    let events = parse_csv_block(ASDF_EVENTS);
    assert_eq!(run_events(events.clone(), &ComboTable::empty()), events);
}

#[test]
fn test_state_string_parser() {
    let events = parse_state_string("f_ (259.006ms) j_ (105.844ms) j/ (721.7ms) f/");
    assert_eq!(events.len(), 4);
    let times: Vec<_> = events.iter().map(Event::time).collect();
    assert!(times.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(
        short(&events),
        vec!["F-down", "J-down", "J-up", "F-up"],
    );
    assert_eq!(
        times[1].duration_since(times[0]).unwrap(),
        Duration::from_micros(259_006)
    );
}
