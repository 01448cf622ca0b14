pub mod rules;

use crate::message::parser::ParsedMessage;

/// Maps a parsed message to an optional reply.
///
/// Implementations must be pure: no I/O, no state carried between calls.
/// `None` (or an empty string) means "say nothing".
pub trait Responder: Send + Sync {
    fn process(&self, msg: &ParsedMessage) -> Option<String>;
}

impl<F> Responder for F
where
    F: Fn(&ParsedMessage) -> Option<String> + Send + Sync,
{
    fn process(&self, msg: &ParsedMessage) -> Option<String> {
        self(msg)
    }
}

/// Ordered responders; the first non-empty reply wins.
#[derive(Default)]
pub struct ResponderChain {
    responders: Vec<Box<dyn Responder>>,
}

impl ResponderChain {
    pub fn new(responders: Vec<Box<dyn Responder>>) -> Self {
        Self { responders }
    }

    pub fn is_empty(&self) -> bool {
        self.responders.is_empty()
    }
}

impl Responder for ResponderChain {
    fn process(&self, msg: &ParsedMessage) -> Option<String> {
        self.responders
            .iter()
            .find_map(|responder| responder.process(msg).filter(|reply| !reply.is_empty()))
    }
}
