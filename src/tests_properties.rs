use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use evdev::KeyCode as Key;

use crate::combo::ComboTable;
use crate::event::{Event, KeyEvent, KeyValue};
use crate::tests::{fjk_combos, run_events};

const POOL: [Key; 8] = [
    Key::KEY_A,
    Key::KEY_S,
    Key::KEY_D,
    Key::KEY_F,
    Key::KEY_J,
    Key::KEY_K,
    Key::KEY_L,
    Key::KEY_SEMICOLON,
];

// Keys that never appear in any combo under test.
const QUIET_POOL: [Key; 5] = [Key::KEY_Q, Key::KEY_W, Key::KEY_E, Key::KEY_R, Key::KEY_T];

// A physically plausible stream: presses and releases alternate per key,
// everything released by the end.
fn balanced_stream(rng: &mut fastrand::Rng, pool: &[Key], steps: usize) -> Vec<Event> {
    let mut time = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let mut down: Vec<Key> = Vec::new();
    let mut events = Vec::new();
    for _ in 0..steps {
        time += Duration::from_micros(rng.u64(50..200_000));
        let press = down.is_empty() || (down.len() < pool.len() && rng.bool());
        if press {
            let up_keys: Vec<Key> = pool.iter().copied().filter(|key| !down.contains(key)).collect();
            let key = up_keys[rng.usize(..up_keys.len())];
            down.push(key);
            events.push(Event::Key(KeyEvent::press(time, key)));
        } else {
            let key = down.swap_remove(rng.usize(..down.len()));
            events.push(Event::Key(KeyEvent::release(time, key)));
        }
    }
    while let Some(key) = down.pop() {
        time += Duration::from_micros(rng.u64(50..200_000));
        events.push(Event::Key(KeyEvent::release(time, key)));
    }
    events
}

// Every press is followed by exactly one release per key, never nested.
fn assert_balanced(output: &[Event]) {
    let mut depth: HashMap<Key, i32> = HashMap::new();
    for event in output {
        let Event::Key(key_event) = event else { continue };
        let entry = depth.entry(key_event.key).or_default();
        match key_event.value {
            KeyValue::Press => {
                assert_eq!(*entry, 0, "double press of {:?}", key_event.key);
                *entry = 1;
            }
            KeyValue::Release => {
                assert_eq!(*entry, 1, "release without press of {:?}", key_event.key);
                *entry = 0;
            }
            KeyValue::Repeat => {}
        }
    }
    for (key, entry) in depth {
        assert_eq!(entry, 0, "{key:?} still down at end of stream");
    }
}

fn assert_time_ordered(output: &[Event]) {
    let times: Vec<SystemTime> = output.iter().map(Event::time).collect();
    assert!(
        times.windows(2).all(|pair| pair[0] <= pair[1]),
        "output timestamps went backwards"
    );
}

#[test]
fn test_random_streams_stay_balanced_and_ordered() {
    for seed in 0..300 {
        let mut rng = fastrand::Rng::with_seed(seed);
        let input = balanced_stream(&mut rng, &POOL, 40);
        let output = run_events(input, &fjk_combos());
        assert_balanced(&output);
        assert_time_ordered(&output);
    }
}

// With no combo key in the stream, the engine is invisible.
#[test]
fn test_streams_without_combo_keys_pass_verbatim() {
    for seed in 0..100 {
        let mut rng = fastrand::Rng::with_seed(seed);
        let input = balanced_stream(&mut rng, &QUIET_POOL, 30);
        let output = run_events(input.clone(), &fjk_combos());
        assert_eq!(output, input);
    }
}

// Feeding the engine its own output with no combos configured changes
// nothing.
#[test]
fn test_passthrough_is_idempotent() {
    for seed in 0..100 {
        let mut rng = fastrand::Rng::with_seed(seed);
        let input = balanced_stream(&mut rng, &POOL, 40);
        let once = run_events(input, &fjk_combos());
        let twice = run_events(once.clone(), &ComboTable::empty());
        assert_eq!(twice, once);
    }
}

// Arbitrary garbage: repeats for keys never pressed, double presses, orphan
// releases, clock jumping backwards. The engine must terminate cleanly on
// all of it.
#[test]
fn test_chaotic_streams_never_abort() {
    for seed in 0..300 {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut time = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let mut events = Vec::new();
        for _ in 0..60 {
            if rng.u8(..8) == 0 {
                time -= Duration::from_millis(rng.u64(..30));
            } else {
                time += Duration::from_micros(rng.u64(..120_000));
            }
            let key = POOL[rng.usize(..POOL.len())];
            let value = match rng.u8(..3) {
                0 => KeyValue::Press,
                1 => KeyValue::Release,
                _ => KeyValue::Repeat,
            };
            events.push(Event::Key(KeyEvent::new(time, key, value)));
        }
        run_events(events.clone(), &fjk_combos());
        run_events(events, &ComboTable::empty());
    }
}
