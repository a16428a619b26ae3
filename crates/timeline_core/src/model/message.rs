//! Inbound message and reply visibility types.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Audience of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Home,
    Followers,
    Specified,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Home => "home",
            Self::Followers => "followers",
            Self::Specified => "specified",
        }
    }
}

impl Display for Visibility {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown visibility name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVisibility(pub String);

impl Display for UnknownVisibility {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown visibility `{}`; expected public|home|followers|specified",
            self.0
        )
    }
}

impl std::error::Error for UnknownVisibility {}

impl FromStr for Visibility {
    type Err = UnknownVisibility;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "home" => Ok(Self::Home),
            "followers" => Ok(Self::Followers),
            "specified" => Ok(Self::Specified),
            _ => Err(UnknownVisibility(value.to_string())),
        }
    }
}

/// Note delivered to the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub text: String,
    pub author_id: String,
    /// User ids mentioned by the note.
    #[serde(default)]
    pub mention_ids: Vec<String>,
    pub note_id: String,
    #[serde(default)]
    pub visibility: Visibility,
}

impl InboundMessage {
    pub fn new(
        text: impl Into<String>,
        author_id: impl Into<String>,
        note_id: impl Into<String>,
        visibility: Visibility,
    ) -> Self {
        Self {
            text: text.into(),
            author_id: author_id.into(),
            mention_ids: Vec::new(),
            note_id: note_id.into(),
            visibility,
        }
    }

    pub fn mentioning(mut self, user_id: impl Into<String>) -> Self {
        self.mention_ids.push(user_id.into());
        self
    }

    pub fn mentions(&self, user_id: &str) -> bool {
        self.mention_ids.iter().any(|id| id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{InboundMessage, Visibility};

    #[test]
    fn visibility_parses_case_insensitively() {
        assert_eq!("PUBLIC".parse::<Visibility>().unwrap(), Visibility::Public);
        assert_eq!(" Followers ".parse::<Visibility>().unwrap(), Visibility::Followers);
        assert!("everyone".parse::<Visibility>().is_err());
    }

    #[test]
    fn inbound_message_deserializes_with_defaults() {
        let message: InboundMessage =
            serde_json::from_str(r#"{"text":"今日","author_id":"u1","note_id":"n1"}"#).unwrap();
        assert_eq!(message.visibility, Visibility::Home);
        assert!(message.mention_ids.is_empty());
        assert!(!message.mentions("bot"));
    }
}
