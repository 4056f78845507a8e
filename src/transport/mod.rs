pub mod client;
pub mod trace;

use crate::error::TransportError;

/// Link to a card: one response per command, in order, blocking.
pub trait CardTransport {
    fn transmit(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError>;
}

impl<T: CardTransport + ?Sized> CardTransport for &mut T {
    fn transmit(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        (**self).transmit(command)
    }
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    fn transmit(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        (**self).transmit(command)
    }
}

/// Card answering from a fixed script, recording every command it receives.
#[cfg(test)]
pub(crate) struct ScriptedCard {
    responses: std::collections::VecDeque<Vec<u8>>,
    commands: Vec<Vec<u8>>,
}

#[cfg(test)]
impl ScriptedCard {
    pub(crate) fn new(responses: Vec<Vec<u8>>) -> Self {
        Self {
            responses: responses.into(),
            commands: Vec::new(),
        }
    }

    pub(crate) fn commands(&self) -> &[Vec<u8>] {
        &self.commands
    }
}

#[cfg(test)]
impl CardTransport for ScriptedCard {
    fn transmit(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.commands.push(command.to_vec());
        self.responses.pop_front().ok_or_else(|| "card removed".into())
    }
}
