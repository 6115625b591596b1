use evdev::KeyCode;
use serde::de::{self, Deserializer};
use serde::Deserialize;

use super::key::parse_key;

// One combo entry: pressing all of `keys` together (within the combo window)
// emits `outKeys` instead.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComboDef {
    #[serde(deserialize_with = "key_words")]
    pub keys: Vec<KeyCode>,
    #[serde(rename = "outKeys", deserialize_with = "key_words")]
    pub out_keys: Vec<KeyCode>,
    // Fire only when the keys went down in the listed order. Implied for
    // combos that share one key set.
    #[serde(default)]
    pub ordered: bool,
}

// "capslock j" -> [KEY_CAPSLOCK, KEY_J]
fn key_words<'de, D>(deserializer: D) -> Result<Vec<KeyCode>, D::Error>
where
    D: Deserializer<'de>,
{
    let words = String::deserialize(deserializer)?;
    words
        .split_whitespace()
        .map(|word| parse_key(word).map_err(de::Error::custom))
        .collect()
}
