// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::ids::RequestToken;

/// One catalog entry. Two maxims are the same maxim when their text is
/// byte-for-byte equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Maxim(String);

impl Maxim {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Maxim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Maxim {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Maxim {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Maxim {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Maxim {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Story {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub quote: String,
}

/// Explanation of a maxim as returned by the text service. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaximContent {
    pub maxim: String,
    pub meaning: String,
    pub stories: Vec<Story>,
}

/// A fetch the caller must run for the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub token: RequestToken,
    pub maxim: Maxim,
}

/// Settled fetch, tagged with the token it was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Succeeded {
        token: RequestToken,
        content: MaximContent,
    },
    Failed {
        token: RequestToken,
        message: String,
    },
}

impl FetchOutcome {
    pub const fn token(&self) -> RequestToken {
        match self {
            Self::Succeeded { token, .. } | Self::Failed { token, .. } => *token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Maxim, MaximContent, Story};
    use anyhow::Result;

    #[test]
    fn maxim_serializes_as_plain_string() -> Result<()> {
        let maxim = Maxim::new("Pick up trash");
        assert_eq!(serde_json::to_string(&maxim)?, "\"Pick up trash\"");
        let decoded: Maxim = serde_json::from_str("\"Embrace fun\"")?;
        assert_eq!(decoded.as_str(), "Embrace fun");
        Ok(())
    }

    #[test]
    fn maxim_identity_is_exact_text() {
        assert_eq!(Maxim::from("Embrace fun"), Maxim::new("Embrace fun".to_owned()));
        assert_ne!(Maxim::from("Embrace fun"), Maxim::from("embrace fun"));
        assert_ne!(Maxim::from("Embrace fun"), Maxim::from("Embrace fun "));
    }

    #[test]
    fn story_fields_default_when_absent() -> Result<()> {
        let content: MaximContent = serde_json::from_str(
            r#"{"maxim":"Embrace fun","meaning":"Laughter signals safety.","stories":[{"title":"Shared jokes"}]}"#,
        )?;
        assert_eq!(
            content.stories,
            vec![Story {
                title: "Shared jokes".to_owned(),
                narrative: String::new(),
                quote: String::new(),
            }]
        );
        Ok(())
    }
}
