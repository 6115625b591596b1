use std::time::Duration;

use evdev::KeyCode as Key;
use indoc::indoc;

use crate::combo::{Combo, ComboTable};
use crate::engine::EngineOptions;
use crate::tests::{
    assert_csv, assert_short, assert_state_string, fjk_combos, parse_csv_block, parse_state_string, run_events,
    run_events_with,
};
use crate::timing::TimingPolicy;

#[test]
fn test_no_match_just_keys() {
    assert_csv(
        indoc! {"
            1712500000;000000;EV_KEY;KEY_B;down
            1712500000;020000;EV_KEY;KEY_B;up
            1712500000;700000;EV_KEY;KEY_F;down
            1712500000;720000;EV_KEY;KEY_F;up
            1712500001;100000;EV_KEY;KEY_J;down
            1712500001;110000;EV_KEY;KEY_J;up
            1712500001;800000;EV_KEY;KEY_C;down
            1712500001;900000;EV_KEY;KEY_C;up
        "},
        indoc! {"
            B-down
            B-up
            F-down
            F-up
            J-down
            J-up
            C-down
            C-up
        "},
        &fjk_combos(),
    );
}

#[test]
fn test_embracing_match_between_other_keys() {
    assert_csv(
        indoc! {"
            1712500000;000000;EV_KEY;KEY_B;down
            1712500000;020000;EV_KEY;KEY_B;up
            1712500000;700000;EV_KEY;KEY_F;down
            1712500000;720000;EV_KEY;KEY_J;down
            1712500001;100000;EV_KEY;KEY_J;up
            1712500001;110000;EV_KEY;KEY_F;up
            1712500001;800000;EV_KEY;KEY_C;down
            1712500001;900000;EV_KEY;KEY_C;up
        "},
        indoc! {"
            B-down
            B-up
            X-down
            X-up
            C-down
            C-up
        "},
        &fjk_combos(),
    );
}

#[test]
fn test_embracing_match_alone() {
    assert_csv(
        indoc! {"
            1712500003;827714;EV_KEY;KEY_F;down
            1712500003;849844;EV_KEY;KEY_J;down
            1712500004;320867;EV_KEY;KEY_J;up
            1712500004;321153;EV_KEY;KEY_F;up
        "},
        indoc! {"
            X-down
            X-up
        "},
        &fjk_combos(),
    );
}

// First key released first; the combo still fires.
#[test]
fn test_cross_rhyme_release_order() {
    assert_csv(
        indoc! {"
            1712500000;700000;EV_KEY;KEY_F;down
            1712500000;720000;EV_KEY;KEY_J;down
            1712500001;100000;EV_KEY;KEY_F;up
            1712500001;110000;EV_KEY;KEY_J;up
            1712500001;800000;EV_KEY;KEY_C;down
            1712500001;900000;EV_KEY;KEY_C;up
        "},
        indoc! {"
            X-down
            X-up
            C-down
            C-up
        "},
        &fjk_combos(),
    );
}

#[test]
fn test_single_key_alone() {
    assert_csv(
        indoc! {"
            1716752333;203961;EV_KEY;KEY_F;down
            1716752333;327486;EV_KEY;KEY_F;up
        "},
        indoc! {"
            F-down
            F-up
        "},
        &fjk_combos(),
    );
}

// Short overlap between J-down and F-up: this is F followed by J while
// typing, not a chord.
#[test]
fn test_overlap_too_short_is_not_a_combo() {
    assert_csv(
        indoc! {"
            1712500003;827714;EV_KEY;KEY_F;down
            1712500004;320840;EV_KEY;KEY_J;down
            1712500004;320860;EV_KEY;KEY_F;up
            1712500004;321153;EV_KEY;KEY_J;up
        "},
        indoc! {"
            F-down
            J-down
            F-up
            J-up
        "},
        &fjk_combos(),
    );
}

#[test]
fn test_sequential_combo_keys_without_overlap() {
    assert_csv(
        indoc! {"
            1712500000;700000;EV_KEY;KEY_K;down
            1712500000;820000;EV_KEY;KEY_K;up
            1712500000;830000;EV_KEY;KEY_F;down
            1712500000;840000;EV_KEY;KEY_F;up
        "},
        indoc! {"
            K-down
            K-up
            F-down
            F-up
        "},
        &fjk_combos(),
    );
}

// F held through two chords: f+j fires, then f+k fires off the same press.
#[test]
fn test_two_embracing_combos() {
    assert_csv(
        indoc! {"
            1716752333;000000;EV_KEY;KEY_F;down
            1716752333;100000;EV_KEY;KEY_J;down
            1716752333;400000;EV_KEY;KEY_J;up
            1716752333;600000;EV_KEY;KEY_K;down
            1716752333;800000;EV_KEY;KEY_K;up
            1716752334;000000;EV_KEY;KEY_F;up
        "},
        indoc! {"
            X-down
            X-up
            Y-down
            Y-up
        "},
        &fjk_combos(),
    );
}

#[test]
fn test_hold_and_tap_fires_repeatedly() {
    assert_state_string(
        "f_ (30ms) j_ (40ms) j/ (200ms) j_ (40ms) j/ (200ms) j_ (40ms) j/ (100ms) f/",
        indoc! {"
            X-down
            X-up
            X-down
            X-up
            X-down
            X-up
        "},
        &fjk_combos(),
    );
}

// A key that belongs to no combo is never delayed past its own release, and
// the chord prefix around it goes out with it.
#[test]
fn test_unrelated_embraced_keystrokes() {
    assert_csv(
        indoc! {"
            1716752333;000000;EV_KEY;KEY_F;down
            1716752333;100000;EV_KEY;KEY_W;down
            1716752333;400000;EV_KEY;KEY_W;up
            1716752334;000000;EV_KEY;KEY_F;up
            1716752334;100000;EV_KEY;KEY_RFKILL;up
        "},
        indoc! {"
            F-down
            W-down
            W-up
            F-up
        "},
        &fjk_combos(),
    );
}

#[test]
fn test_ordered_combos() {
    let table = ComboTable::new(vec![
        Combo::new(vec![Key::KEY_F, Key::KEY_J], vec![Key::KEY_X]),
        Combo::new(vec![Key::KEY_J, Key::KEY_F], vec![Key::KEY_A]),
        Combo::new(vec![Key::KEY_F, Key::KEY_K], vec![Key::KEY_Y]),
        Combo::new(vec![Key::KEY_J, Key::KEY_K], vec![Key::KEY_B]),
    ]);
    assert_csv(
        indoc! {"
            1712500000;000000;EV_KEY;KEY_F;down
            1712500000;060000;EV_KEY;KEY_J;down
            1712500000;120000;EV_KEY;KEY_F;up
            1712500000;200000;EV_KEY;KEY_J;up

            1712500001;000000;EV_KEY;KEY_J;down
            1712500001;060000;EV_KEY;KEY_F;down
            1712500001;120000;EV_KEY;KEY_J;up
            1712500001;200000;EV_KEY;KEY_F;up
        "},
        indoc! {"
            X-down
            X-up
            A-down
            A-up
        "},
        &table,
    );
}

#[test]
fn test_capslock_navigation() {
    let table = ComboTable::new(vec![Combo::new(
        vec![Key::KEY_CAPSLOCK, Key::KEY_J],
        vec![Key::KEY_BACKSPACE],
    )]);
    assert_state_string(
        "capslock_ (259.006ms) j_ (105.844ms) j/ (721.7ms) capslock/",
        indoc! {"
            BACKSPACE-down
            BACKSPACE-up
        "},
        &table,
    );
}

#[test]
fn test_multi_key_output_bursts() {
    let table = ComboTable::new(vec![Combo::new(
        vec![Key::KEY_F, Key::KEY_J],
        vec![Key::KEY_LEFTCTRL, Key::KEY_C],
    )]);
    // presses in order, releases in reverse
    assert_state_string(
        "f_ (20ms) j_ (100ms) j/ (20ms) f/",
        indoc! {"
            LEFTCTRL-down
            C-down
            C-up
            LEFTCTRL-up
        "},
        &table,
    );
}

// The input is degenerate (f goes down twice, the chord tears mid-flight).
// What matters is that the engine stays alive and deterministic; this pins
// the behavior down.
#[test]
fn test_degenerate_interleaving_stays_deterministic() {
    assert_csv(
        indoc! {"
            1712500000;000000;EV_KEY;KEY_F;down
            1712500000;064000;EV_KEY;KEY_K;down
            1712500000;128000;EV_KEY;KEY_F;up
            1712500000;144000;EV_KEY;KEY_J;down
            1712500000;208000;EV_KEY;KEY_K;up
            1712500000;224000;EV_KEY;KEY_F;down
        "},
        indoc! {"
            Y-down
            Y-up
            J-down
            F-down
        "},
        &fjk_combos(),
    );
}

// The same scenarios in compact timing notation.

#[test]
fn test_state_hold_fires() {
    assert_state_string("f_ (20ms) j_ (380ms) j/ (10ms) f/", "X-down\nX-up", &fjk_combos());
}

#[test]
fn test_state_solo_press() {
    assert_state_string("f_ (120ms) f/", "F-down\nF-up", &fjk_combos());
}

#[test]
fn test_state_brush_past() {
    assert_state_string(
        "f_ (493ms) j_ (20µs) f/ (293µs) j/",
        indoc! {"
            F-down
            J-down
            F-up
            J-up
        "},
        &fjk_combos(),
    );
}

// Timing policy is injectable: with no minimum overlap the brush-past fires,
// with an absurdly large one nothing ever does.

#[test]
fn test_min_overlap_zero_fires_on_brush() {
    let timing = TimingPolicy {
        min_overlap: Duration::ZERO,
        ..TimingPolicy::default()
    };
    let events = parse_state_string("f_ (493ms) j_ (20µs) f/ (293µs) j/");
    let output = run_events_with(
        events,
        &fjk_combos(),
        timing,
        EngineOptions {
            forward_other_events: false,
        },
    );
    assert_short(&output, "X-down\nX-up");
}

#[test]
fn test_min_overlap_huge_suppresses_all_combos() {
    let timing = TimingPolicy {
        min_overlap: Duration::from_secs(10),
        ..TimingPolicy::default()
    };
    let events = parse_state_string("f_ (20ms) j_ (380ms) j/ (10ms) f/");
    let output = run_events_with(
        events,
        &fjk_combos(),
        timing,
        EngineOptions {
            forward_other_events: false,
        },
    );
    assert_short(&output, "F-down\nJ-down\nJ-up\nF-up");
}

// A chord prefix that does not finish within the window is flushed; raising
// the window lets the slow chord through.

#[test]
fn test_slow_prefix_expires() {
    let table = ComboTable::new(vec![Combo::new(
        vec![Key::KEY_F, Key::KEY_J, Key::KEY_K],
        vec![Key::KEY_X],
    )]);
    assert_state_string(
        "f_ (80ms) j_ (10ms) k_ (20ms) k/ (10ms) j/ (10ms) f/",
        indoc! {"
            F-down
            J-down
            K-down
            K-up
            J-up
            F-up
        "},
        &table,
    );
}

#[test]
fn test_slow_prefix_fires_with_wider_window() {
    let table = ComboTable::new(vec![Combo::new(
        vec![Key::KEY_F, Key::KEY_J, Key::KEY_K],
        vec![Key::KEY_X],
    )]);
    let timing = TimingPolicy {
        combo_window: Duration::from_secs(1),
        ..TimingPolicy::default()
    };
    let events = parse_state_string("f_ (80ms) j_ (10ms) k_ (20ms) k/ (10ms) j/ (10ms) f/");
    let output = run_events_with(
        events,
        &table,
        timing,
        EngineOptions {
            forward_other_events: false,
        },
    );
    assert_short(&output, "X-down\nX-up");
}

// Synthetic timestamps: the down-burst carries the completing press's time,
// the up-burst the triggering release's time; pass-through keeps its own.
#[test]
fn test_synthetic_timestamps() {
    let events = parse_csv_block(indoc! {"
        1712500000;000000;EV_KEY;KEY_B;down
        1712500000;100000;EV_KEY;KEY_B;up
        1712500000;700000;EV_KEY;KEY_F;down
        1712500000;720000;EV_KEY;KEY_J;down
        1712500001;100000;EV_KEY;KEY_J;up
        1712500001;110000;EV_KEY;KEY_F;up
    "});
    let output = run_events(events, &fjk_combos());
    let lines: Vec<String> = output.iter().map(|event| event.to_csv()).collect();
    assert_eq!(
        lines,
        vec![
            "1712500000;0;EV_KEY;KEY_B;down",
            "1712500000;100000;EV_KEY;KEY_B;up",
            "1712500000;720000;EV_KEY;KEY_X;down",
            "1712500001;100000;EV_KEY;KEY_X;up",
        ]
    );
}
