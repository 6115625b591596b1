use evdev::KeyCode as Key;
use indoc::indoc;

use crate::combo::ComboTable;
use crate::config::Config;

#[test]
fn test_parse_basic() {
    let config = Config::from_yaml(indoc! {"
        combos:
          - keys: f j
            outKeys: x
    "})
    .unwrap();
    assert_eq!(config.combos.len(), 1);
    assert_eq!(config.combos[0].keys, vec![Key::KEY_F, Key::KEY_J]);
    assert_eq!(config.combos[0].out_keys, vec![Key::KEY_X]);
    assert!(!config.combos[0].ordered);
}

#[test]
fn test_parse_names_and_ordered_flag() {
    let config = Config::from_yaml(indoc! {"
        combos:
          - keys: KEY_CAPSLOCK j
            outKeys: BackSpace
            ordered: true
          - keys: capslock n
            outKeys: down
    "})
    .unwrap();
    assert_eq!(config.combos[0].keys, vec![Key::KEY_CAPSLOCK, Key::KEY_J]);
    assert_eq!(config.combos[0].out_keys, vec![Key::KEY_BACKSPACE]);
    assert!(config.combos[0].ordered);
    assert_eq!(config.combos[1].out_keys, vec![Key::KEY_DOWN]);
}

#[test]
fn test_parse_multi_key_output() {
    let config = Config::from_yaml(indoc! {"
        combos:
          - keys: f j k
            outKeys: leftctrl c
    "})
    .unwrap();
    assert_eq!(config.combos[0].keys.len(), 3);
    assert_eq!(config.combos[0].out_keys, vec![Key::KEY_LEFTCTRL, Key::KEY_C]);
    assert!(ComboTable::from_config(&config).is_ok());
}

#[test]
fn test_unknown_key_name_rejected() {
    let result = Config::from_yaml(indoc! {"
        combos:
          - keys: f quux
            outKeys: x
    "});
    assert!(result.is_err());
}

#[test]
fn test_unknown_field_rejected() {
    let result = Config::from_yaml(indoc! {"
        combos:
          - keys: f j
            outKeys: x
            holdMs: 50
    "});
    assert!(result.is_err());
}

#[test]
fn test_missing_out_keys_rejected() {
    let result = Config::from_yaml(indoc! {"
        combos:
          - keys: f j
    "});
    assert!(result.is_err());
}

#[test]
fn test_empty_combo_list() {
    let config = Config::from_yaml("combos: []\n").unwrap();
    assert!(config.combos.is_empty());
    assert!(ComboTable::from_config(&config).unwrap().is_empty());
}
