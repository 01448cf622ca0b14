//! Turns raw frames into [`ParsedMessage`]s.
//!
//! Case rules:
//! - targeting and [`ParsedMessage::loose_match`] ignore case and punctuation;
//! - for targeting, punctuation separates words, so `Holly's` and `hey-holly`
//!   both mention `holly` while `hollyhock` does not;
//! - [`ParsedMessage::matches`] is case-sensitive equality of the whole
//!   normalized content, never substring containment.

use std::fmt::{Debug, Formatter};

use crate::error::ParseError;
use crate::message::{preview, Envelope, RawMessage};

/// Parser settings, fixed at startup and passed into every [`parse`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Folded mention names, each split into words.
    mention_names: Vec<Vec<String>>,
    remove_punctuation: bool,
}

impl ParserConfig {
    pub fn new<I, S>(mention_names: I, remove_punctuation: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mention_names = mention_names
            .into_iter()
            .map(|name| mention_words(name.as_ref()))
            .filter(|words| !words.is_empty())
            .collect();
        Self {
            mention_names,
            remove_punctuation,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::new(["holly"], true)
    }
}

/// A decoded inbound message, owned by one loop iteration.
#[derive(Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub sender: String,
    pub chat_id: String,
    /// Content exactly as received.
    pub content: String,
    tokens: Vec<String>,
    targeted: bool,
    punctuation_removed: bool,
}

impl ParsedMessage {
    /// Whitespace-separated tokens of the content, in order, after optional
    /// punctuation removal. Case is preserved.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Normalized content: the tokens joined by single spaces.
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }

    pub fn is_targeted(&self) -> bool {
        self.targeted
    }

    /// True when the normalized content equals `phrase` normalized the same
    /// way. Case-sensitive.
    pub fn matches(&self, phrase: &str) -> bool {
        tokenize(phrase, self.punctuation_removed) == self.tokens
    }

    /// True when the content equals any candidate once both are lowercased
    /// and stripped of punctuation.
    pub fn loose_match<S: AsRef<str>>(&self, candidates: &[S]) -> bool {
        let folded = fold_words(&self.content);
        candidates
            .iter()
            .any(|candidate| fold_words(candidate.as_ref()) == folded)
    }
}

impl Debug for ParsedMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Msg")
            .field("msg", &preview(&self.content))
            .field("sender", &self.sender)
            .field("chat_id", &self.chat_id)
            .field("targeted", &self.targeted)
            .finish()
    }
}

/// Decodes one frame. Fails only when the frame is not a usable envelope;
/// any text content is accepted.
pub fn parse(raw: &RawMessage, config: &ParserConfig) -> Result<ParsedMessage, ParseError> {
    let text = std::str::from_utf8(raw.payload())?;
    let envelope: Envelope = serde_json::from_str(text)?;
    if envelope.chat_id.trim().is_empty() {
        return Err(ParseError::MissingChatId);
    }

    let tokens = tokenize(&envelope.content, config.remove_punctuation);
    let targeted = is_mentioned(&envelope.content, &config.mention_names);

    Ok(ParsedMessage {
        sender: envelope.sender,
        chat_id: envelope.chat_id,
        content: envelope.content,
        tokens,
        targeted,
        punctuation_removed: config.remove_punctuation,
    })
}

fn is_punctuation(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace()
}

fn strip_punctuation(text: &str) -> String {
    text.chars().filter(|c| !is_punctuation(*c)).collect()
}

fn tokenize(text: &str, remove_punctuation: bool) -> Vec<String> {
    if remove_punctuation {
        strip_punctuation(text)
            .split_whitespace()
            .map(str::to_string)
            .collect()
    } else {
        text.split_whitespace().map(str::to_string).collect()
    }
}

/// Lowercased, punctuation-free words.
fn fold_words(text: &str) -> Vec<String> {
    strip_punctuation(text)
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

/// Lowercased words with punctuation treated as a word break.
fn mention_words(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || is_punctuation(c))
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn is_mentioned(content: &str, mention_names: &[Vec<String>]) -> bool {
    let words = mention_words(content);
    mention_names.iter().any(|name| {
        words
            .windows(name.len())
            .any(|window| window == name.as_slice())
    })
}
