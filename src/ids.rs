//! Composite ids for resources keyed by a pair (guild + user, channel + overwrite, …).

use crate::error::{Error, Result};

pub const SEPARATOR: char = ':';

pub fn pack_id(first: &str, second: &str) -> String {
    format!("{first}{SEPARATOR}{second}")
}

/// Split `a:b` into its halves. Exactly one separator, both halves non-empty.
pub fn parse_id(id: &str) -> Result<(String, String)> {
    let mut parts = id.split(SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(first), Some(second), None) if !first.is_empty() && !second.is_empty() => {
            Ok((first.to_string(), second.to_string()))
        }
        _ => Err(Error::InvalidId(id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_then_parse() {
        let id = pack_id("807465587633553409", "1229266524427260057");
        assert_eq!(id, "807465587633553409:1229266524427260057");
        assert_eq!(
            parse_id(&id).unwrap(),
            (
                "807465587633553409".to_string(),
                "1229266524427260057".to_string()
            )
        );
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "abc", ":", "a:", ":b", "a:b:c", "a::b"] {
            assert!(
                matches!(parse_id(bad), Err(Error::InvalidId(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
