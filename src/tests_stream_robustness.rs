use std::io::Cursor;

use anyhow::{bail, Result};
use evdev::KeyCode as Key;
use indoc::indoc;

use crate::combo::ComboTable;
use crate::config::Config;
use crate::engine::{man_in_the_middle, EngineOptions, EventReader, EventWriter};
use crate::event::{Event, KeyEvent, KeyValue};
use crate::input::{LogReader, SliceReader};
use crate::output::SliceWriter;
use crate::tests::{assert_short, fjk_combos, parse_csv_block, parse_state_string, run_events, run_events_with, short};
use crate::timing::TimingPolicy;

// Captured from a real keyboard: a long N auto-repeat burst crossing a
// capslock chord attempt. Regression for a crash on orphaned repeats.
const REPEAT_BURST_LOG: &str = indoc! {"
    |>>1737965475;912716;EV_MSC;MSC_SCAN;458769
    |>>1737965475;912716;EV_KEY;KEY_N;down
    |>>1737965475;912716;EV_SYN;SYN_REPORT;up
    |>>1737965476;163526;EV_KEY;KEY_N;repeat
    |>>1737965476;163526;EV_SYN;SYN_REPORT;down
    |>>1737965476;197504;EV_KEY;KEY_N;repeat
    |>>1737965476;197504;EV_SYN;SYN_REPORT;down
    |>>1737965476;231448;EV_KEY;KEY_N;repeat
    |>>1737965476;231448;EV_SYN;SYN_REPORT;down
    |>>1737965476;265450;EV_KEY;KEY_N;repeat
    |>>1737965476;265450;EV_SYN;SYN_REPORT;down
    |>>1737965476;300444;EV_KEY;KEY_N;repeat
    |>>1737965476;300444;EV_SYN;SYN_REPORT;down
    |>>1737965476;335450;EV_KEY;KEY_N;repeat
    |>>1737965476;335450;EV_SYN;SYN_REPORT;down
    |>>1737965476;369448;EV_KEY;KEY_N;repeat
    |>>1737965476;369448;EV_SYN;SYN_REPORT;down
    |>>1737965476;403445;EV_KEY;KEY_N;repeat
    |>>1737965476;403445;EV_SYN;SYN_REPORT;down
    |>>1737965476;437445;EV_KEY;KEY_N;repeat
    |>>1737965476;437445;EV_SYN;SYN_REPORT;down
    |>>1737965476;471452;EV_KEY;KEY_N;repeat
    |>>1737965476;471452;EV_SYN;SYN_REPORT;down
    |>>1737965476;506444;EV_KEY;KEY_N;repeat
    |>>1737965476;506444;EV_SYN;SYN_REPORT;down
    |>>1737965476;540446;EV_KEY;KEY_N;repeat
    |>>1737965476;540446;EV_SYN;SYN_REPORT;down
    |>>1737965476;574452;EV_KEY;KEY_N;repeat
    |>>1737965476;574452;EV_SYN;SYN_REPORT;down
    |>>1737965476;600611;EV_MSC;MSC_SCAN;458809
    |>>1737965476;600611;EV_KEY;KEY_CAPSLOCK;down
    |>>1737965476;600611;EV_SYN;SYN_REPORT;up
    |>>1737965476;792606;EV_MSC;MSC_SCAN;458769
    |>>1737965476;792606;EV_KEY;KEY_N;up
    |>>1737965476;792606;EV_SYN;SYN_REPORT;up
    |>>1737965477;104606;EV_MSC;MSC_SCAN;458809
    |>>1737965477;104606;EV_KEY;KEY_CAPSLOCK;up
    |>>1737965477;104606;EV_SYN;SYN_REPORT;up
    |>>1737965477;488608;EV_MSC;MSC_SCAN;458769
    |>>1737965477;488608;EV_KEY;KEY_N;down
"};

#[test]
fn test_repeat_burst_through_log_reader() {
    let config = Config::from_yaml(indoc! {"
        combos:
          - keys: capslock n
            outKeys: down
    "})
    .unwrap();
    let combos = ComboTable::from_config(&config).unwrap();

    let mut reader = LogReader::new(Cursor::new(REPEAT_BURST_LOG));
    let mut writer = SliceWriter::default();
    man_in_the_middle(
        &mut reader,
        &mut writer,
        &combos,
        TimingPolicy::default(),
        EngineOptions {
            forward_other_events: false,
        },
    )
    .unwrap();

    let mut expected = vec!["N-down".to_string()];
    expected.extend(std::iter::repeat("N-repeat".to_string()).take(13));
    expected.extend(["CAPSLOCK-down", "N-up", "CAPSLOCK-up", "N-down"].map(String::from));
    assert_eq!(short(&writer.events), expected);
}

#[test]
fn test_log_reader_skips_unmarked_lines() {
    let log = indoc! {"
        starting up
        |>>1712500000;100;EV_KEY;KEY_A;down
        some unrelated noise
        |>>1712500000;200;EV_KEY;KEY_A;up
    "};
    let mut reader = LogReader::new(Cursor::new(log));
    let mut events = Vec::new();
    while let Some(event) = reader.read_one().unwrap() {
        events.push(event);
    }
    assert_eq!(short(&events), vec!["A-down", "A-up"]);
}

#[test]
fn test_log_reader_propagates_parse_errors() {
    let mut reader = LogReader::new(Cursor::new("|>>this;is;not;an;event\n"));
    assert!(reader.read_one().is_err());
}

#[test]
fn test_orphan_repeat_dropped() {
    let events = parse_csv_block("1712500000;0;EV_KEY;KEY_N;repeat");
    assert!(run_events(events, &fjk_combos()).is_empty());
}

#[test]
fn test_orphan_release_for_unseen_key_dropped() {
    let events = parse_csv_block("1712500000;0;EV_KEY;KEY_RFKILL;up");
    assert!(run_events(events, &fjk_combos()).is_empty());
}

#[test]
fn test_release_after_commit_is_forwarded() {
    // W invalidates the F prefix, F's press is committed; its release must
    // still come through afterwards
    let events = parse_state_string("f_ (10ms) w_ (10ms) f/ (10ms) w/");
    let output = run_events(events, &fjk_combos());
    assert_short(&output, "F-down\nW-down\nF-up\nW-up");
}

#[test]
fn test_double_press_treated_as_repeat() {
    let events = parse_state_string("f_ (10ms) f_ (10ms) f/");
    let output = run_events(events, &fjk_combos());
    assert_short(&output, "F-down\nF-down\nF-up");
}

#[test]
fn test_unknown_key_code_passes_through() {
    // a scancode with no name and no combo still flows through untouched
    let time = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
    let odd_key = Key::new(793);
    let events = vec![
        Event::Key(KeyEvent::press(time, odd_key)),
        Event::Key(KeyEvent::release(time + std::time::Duration::from_millis(40), odd_key)),
    ];
    let output = run_events(events.clone(), &fjk_combos());
    assert_eq!(output, events);
}

#[test]
fn test_non_key_events_forwarded_by_default() {
    let events = parse_csv_block(indoc! {"
        1712500000;000000;EV_MSC;MSC_SCAN;458769
        1712500000;000000;EV_KEY;KEY_B;down
        1712500000;000000;EV_SYN;SYN_REPORT;up
        1712500000;100000;EV_KEY;KEY_B;up
        1712500000;100000;EV_SYN;SYN_REPORT;up
    "});
    let output = run_events_with(
        events.clone(),
        &fjk_combos(),
        TimingPolicy::default(),
        EngineOptions::default(),
    );
    assert_eq!(output, events);
}

struct FailingReader {
    events: Vec<Event>,
}

impl EventReader for FailingReader {
    fn read_one(&mut self) -> Result<Option<Event>> {
        if self.events.is_empty() {
            bail!("transport torn");
        }
        Ok(Some(self.events.remove(0)))
    }
}

// A torn stream is not flushed: the buffered F press must not leak out.
#[test]
fn test_reader_error_propagates_without_flush() {
    let mut reader = FailingReader {
        events: parse_state_string("f_"),
    };
    let mut writer = SliceWriter::default();
    let result = man_in_the_middle(
        &mut reader,
        &mut writer,
        &fjk_combos(),
        TimingPolicy::default(),
        EngineOptions::default(),
    );
    assert!(result.is_err());
    assert!(writer.events.is_empty());
}

struct RefusingWriter;

impl EventWriter for RefusingWriter {
    fn write_one(&mut self, _event: &Event) -> Result<()> {
        bail!("sink closed")
    }
}

#[test]
fn test_writer_error_propagates() {
    let mut reader = SliceReader::new(parse_state_string("b_ (10ms) b/"));
    let mut writer = RefusingWriter;
    let result = man_in_the_middle(
        &mut reader,
        &mut writer,
        &fjk_combos(),
        TimingPolicy::default(),
        EngineOptions::default(),
    );
    assert!(result.is_err());
}

#[test]
fn test_release_value_repeat_mix_never_panics() {
    // presses, releases and repeats in every broken order
    let stream = "n. n/ f_ f_ j. j_ f/ f/ j/ w. q/ f_ j_ k_ x/ f/ j/ k/";
    let mut time = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
    let mut events = Vec::new();
    for token in stream.split_whitespace() {
        time += std::time::Duration::from_millis(37);
        let value = match token.chars().last() {
            Some('_') => KeyValue::Press,
            Some('/') => KeyValue::Release,
            _ => KeyValue::Repeat,
        };
        let key = crate::config::parse_key(token.trim_end_matches(['_', '/', '.'])).unwrap();
        events.push(Event::Key(KeyEvent::new(time, key, value)));
    }
    // terminates cleanly whatever comes in
    run_events(events, &fjk_combos());
}
