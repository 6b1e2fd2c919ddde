//! Validated user identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BackupError;

const MAX_USER_ID_LEN: usize = 64;

/// An authenticated user's id.
///
/// Restricted to `[A-Za-z0-9_-]` because it is embedded in artifact paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, BackupError> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= MAX_USER_ID_LEN
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

        if valid {
            Ok(Self(id))
        } else {
            Err(BackupError::InvalidUserId(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = BackupError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ids() {
        for id in ["u1", "user_42", "a-b-c", "ABC123"] {
            assert_eq!(UserId::new(id).unwrap().as_str(), id);
        }
    }

    #[test]
    fn test_rejects_path_characters() {
        for id in ["", "../etc", "a/b", "a b", "ü", &"x".repeat(65)] {
            assert!(
                matches!(UserId::new(id), Err(BackupError::InvalidUserId(_))),
                "{:?} should be rejected",
                id
            );
        }
    }

    #[test]
    fn test_serde_validates() {
        let ok: UserId = serde_json::from_str("\"u7\"").unwrap();
        assert_eq!(ok.to_string(), "u7");
        assert!(serde_json::from_str::<UserId>("\"../x\"").is_err());
    }
}
