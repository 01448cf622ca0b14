//! Responders built from `[[rules]]` in the config file.

use tracing::debug;

use super::{Responder, ResponderChain};
use crate::config::RuleConfig;
use crate::message::parser::ParsedMessage;

/// Replies when the whole message equals `phrase`.
pub struct ExactReply {
    pub phrase: String,
    pub reply: String,
    /// Only answer messages that mention the bot.
    pub targeted: bool,
}

impl Responder for ExactReply {
    fn process(&self, msg: &ParsedMessage) -> Option<String> {
        if self.targeted && !msg.is_targeted() {
            return None;
        }
        msg.matches(&self.phrase).then(|| self.reply.clone())
    }
}

/// Replies when the message loosely equals any candidate.
pub struct LooseReply {
    pub candidates: Vec<String>,
    pub reply: String,
    pub targeted: bool,
}

impl Responder for LooseReply {
    fn process(&self, msg: &ParsedMessage) -> Option<String> {
        if self.targeted && !msg.is_targeted() {
            return None;
        }
        msg.loose_match(&self.candidates)
            .then(|| self.reply.clone())
    }
}

/// Swallows messages that loosely match `candidates`; everything else goes on
/// to `next`.
pub struct Intercept {
    pub candidates: Vec<String>,
    pub next: Box<dyn Responder>,
}

impl Responder for Intercept {
    fn process(&self, msg: &ParsedMessage) -> Option<String> {
        if msg.loose_match(&self.candidates) {
            debug!("Intercepted message in {}", msg.chat_id);
            return None;
        }
        self.next.process(msg)
    }
}

/// Builds the responder for a rule list. Rules run in order and an intercept
/// guards every rule after it.
pub fn build(rules: &[RuleConfig]) -> ResponderChain {
    let mut tail: Vec<Box<dyn Responder>> = Vec::new();

    for rule in rules.iter().rev() {
        match rule {
            RuleConfig::Exact {
                phrase,
                reply,
                targeted,
            } => tail.insert(
                0,
                Box::new(ExactReply {
                    phrase: phrase.clone(),
                    reply: reply.clone(),
                    targeted: *targeted,
                }),
            ),
            RuleConfig::Loose {
                candidates,
                reply,
                targeted,
            } => tail.insert(
                0,
                Box::new(LooseReply {
                    candidates: candidates.clone(),
                    reply: reply.clone(),
                    targeted: *targeted,
                }),
            ),
            RuleConfig::Intercept { candidates } => {
                let guarded = ResponderChain::new(std::mem::take(&mut tail));
                tail.push(Box::new(Intercept {
                    candidates: candidates.clone(),
                    next: Box::new(guarded),
                }));
            }
        }
    }

    ResponderChain::new(tail)
}
