use std::collections::HashSet;

use anyhow::{bail, Result};
use evdev::KeyCode;

use crate::config::Config;

/// A configured chord: the input key set and the keys it is rewritten to.
#[derive(Debug, Clone)]
pub struct Combo {
    keys: Vec<KeyCode>,
    out_keys: Vec<KeyCode>,
    ordered: bool,
    key_set: HashSet<KeyCode>,
}

impl Combo {
    pub fn new(keys: Vec<KeyCode>, out_keys: Vec<KeyCode>) -> Combo {
        let key_set = keys.iter().copied().collect();
        Combo {
            keys,
            out_keys,
            ordered: false,
            key_set,
        }
    }

    pub fn keys(&self) -> &[KeyCode] {
        &self.keys
    }

    pub fn out_keys(&self) -> &[KeyCode] {
        &self.out_keys
    }

    pub fn key_set(&self) -> &HashSet<KeyCode> {
        &self.key_set
    }

    pub fn contains(&self, key: KeyCode) -> bool {
        self.key_set.contains(&key)
    }
}

/// What `candidates_for` found for a down-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidates {
    /// No combo can grow out of these keys.
    None,
    /// At least one combo is still reachable but needs more keys.
    Prefix,
    /// Some combo's key set is exactly this down-set.
    Complete,
}

/// The immutable set of configured combos.
#[derive(Debug, Default)]
pub struct ComboTable {
    combos: Vec<Combo>,
}

impl ComboTable {
    pub fn new(combos: Vec<Combo>) -> ComboTable {
        let mut table = ComboTable { combos };
        table.mark_ordered_duplicates();
        table
    }

    pub fn empty() -> ComboTable {
        ComboTable::default()
    }

    pub fn from_config(config: &Config) -> Result<ComboTable> {
        let mut combos = Vec::with_capacity(config.combos.len());
        for def in &config.combos {
            if def.keys.len() < 2 {
                bail!("combo needs at least two keys, got {:?}", def.keys);
            }
            if def.out_keys.is_empty() {
                bail!("combo {:?} has no output keys", def.keys);
            }
            let mut combo = Combo::new(def.keys.clone(), def.out_keys.clone());
            if combo.key_set.len() != combo.keys.len() {
                bail!("combo {:?} repeats a key", def.keys);
            }
            combo.ordered = def.ordered;
            combos.push(combo);
        }
        Ok(ComboTable::new(combos))
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }

    // Combos sharing one key set are told apart by press order.
    fn mark_ordered_duplicates(&mut self) {
        for i in 0..self.combos.len() {
            for j in i + 1..self.combos.len() {
                if self.combos[i].key_set == self.combos[j].key_set {
                    self.combos[i].ordered = true;
                    self.combos[j].ordered = true;
                }
            }
        }
    }

    /// Classify a down-set: dead end, chord prefix, or complete chord.
    pub fn candidates_for(&self, down_set: &HashSet<KeyCode>) -> Candidates {
        let mut prefix = false;
        for combo in &self.combos {
            if down_set.is_subset(&combo.key_set) {
                if combo.key_set.len() == down_set.len() {
                    return Candidates::Complete;
                }
                prefix = true;
            }
        }
        if prefix {
            Candidates::Prefix
        } else {
            Candidates::None
        }
    }

    /// The combo for exactly this down-set. `order` is the order the keys
    /// went down in: an ordered combo wins when its key order matches, then
    /// an unordered combo, then the first registered with that set.
    pub fn complete_match(&self, down_set: &HashSet<KeyCode>, order: &[KeyCode]) -> Option<&Combo> {
        let mut unordered = None;
        let mut fallback = None;
        for combo in &self.combos {
            if combo.key_set.len() != down_set.len() || !down_set.is_subset(&combo.key_set) {
                continue;
            }
            if combo.ordered && combo.keys == order {
                return Some(combo);
            }
            if !combo.ordered && unordered.is_none() {
                unordered = Some(combo);
            }
            if fallback.is_none() {
                fallback = Some(combo);
            }
        }
        unordered.or(fallback)
    }

    /// Whether this key on its own could begin a combo.
    pub fn starts_combo(&self, key: KeyCode) -> bool {
        self.combos.iter().any(|combo| combo.key_set.contains(&key))
    }
}

#[cfg(test)]
mod tests {
    use evdev::KeyCode as Key;

    use super::*;
    use crate::config::Config;

    fn fjk_table() -> ComboTable {
        ComboTable::new(vec![
            Combo::new(vec![Key::KEY_F, Key::KEY_J], vec![Key::KEY_X]),
            Combo::new(vec![Key::KEY_F, Key::KEY_K], vec![Key::KEY_Y]),
        ])
    }

    fn set(keys: &[Key]) -> HashSet<Key> {
        keys.iter().copied().collect()
    }

    #[test]
    fn test_candidates_for() {
        let table = fjk_table();
        assert_eq!(table.candidates_for(&set(&[Key::KEY_F])), Candidates::Prefix);
        assert_eq!(table.candidates_for(&set(&[Key::KEY_K])), Candidates::Prefix);
        assert_eq!(table.candidates_for(&set(&[Key::KEY_F, Key::KEY_J])), Candidates::Complete);
        assert_eq!(table.candidates_for(&set(&[Key::KEY_J, Key::KEY_K])), Candidates::None);
        assert_eq!(table.candidates_for(&set(&[Key::KEY_B])), Candidates::None);
    }

    #[test]
    fn test_complete_match_prefers_registration_order() {
        let table = ComboTable::new(vec![
            Combo::new(vec![Key::KEY_F, Key::KEY_J], vec![Key::KEY_X]),
            Combo::new(vec![Key::KEY_J, Key::KEY_F], vec![Key::KEY_A]),
        ]);
        // same set twice: both become ordered, press order decides
        let combo = table
            .complete_match(&set(&[Key::KEY_F, Key::KEY_J]), &[Key::KEY_F, Key::KEY_J])
            .unwrap();
        assert_eq!(combo.out_keys(), &[Key::KEY_X]);
        let combo = table
            .complete_match(&set(&[Key::KEY_F, Key::KEY_J]), &[Key::KEY_J, Key::KEY_F])
            .unwrap();
        assert_eq!(combo.out_keys(), &[Key::KEY_A]);
    }

    #[test]
    fn test_complete_match_unordered() {
        let table = fjk_table();
        let combo = table
            .complete_match(&set(&[Key::KEY_J, Key::KEY_F]), &[Key::KEY_J, Key::KEY_F])
            .unwrap();
        assert_eq!(combo.out_keys(), &[Key::KEY_X]);
        assert!(table.complete_match(&set(&[Key::KEY_F]), &[Key::KEY_F]).is_none());
    }

    #[test]
    fn test_starts_combo() {
        let table = fjk_table();
        assert!(table.starts_combo(Key::KEY_F));
        assert!(table.starts_combo(Key::KEY_K));
        assert!(!table.starts_combo(Key::KEY_B));
    }

    #[test]
    fn test_from_config_rejects_single_key() {
        let config = Config::from_yaml("combos:\n  - keys: f\n    outKeys: x\n").unwrap();
        assert!(ComboTable::from_config(&config).is_err());
    }

    #[test]
    fn test_from_config_rejects_repeated_key() {
        let config = Config::from_yaml("combos:\n  - keys: f f\n    outKeys: x\n").unwrap();
        assert!(ComboTable::from_config(&config).is_err());
    }
}
