use std::str::FromStr;

use anyhow::{bail, Result};
use evdev::KeyCode;

/// Resolve a key name to its scancode. Everything is case-insensitive, and
/// the `KEY_` prefix of the kernel symbol may be dropped: `KEY_BACKSPACE`,
/// `backspace` and `Backspace` all name the same key.
pub fn parse_key(input: &str) -> Result<KeyCode> {
    let name = input.to_uppercase();

    if let Ok(key) = KeyCode::from_str(&name) {
        return Ok(key);
    }
    if let Ok(key) = KeyCode::from_str(&format!("KEY_{name}")) {
        return Ok(key);
    }

    bail!("unknown key '{input}'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_forms() {
        assert_eq!(parse_key("KEY_BACKSPACE").unwrap(), KeyCode::KEY_BACKSPACE);
        assert_eq!(parse_key("backspace").unwrap(), KeyCode::KEY_BACKSPACE);
        assert_eq!(parse_key("CapsLock").unwrap(), KeyCode::KEY_CAPSLOCK);
        assert_eq!(parse_key("key_f").unwrap(), KeyCode::KEY_F);
    }

    #[test]
    fn test_parse_key_unknown() {
        assert!(parse_key("no_such_key").is_err());
        assert!(parse_key("").is_err());
    }
}
