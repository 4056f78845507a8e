use log::{debug, trace, warn};
use snafu::ResultExt;
use tracing::instrument;

use crate::error::{Error, ProtocolLoopExceededSnafu, Result, TransportFailureSnafu};
use crate::packets::apdu::{CommandApdu, ResponseApdu};
use crate::packets::status::Classification;
use crate::transport::trace::{Trace, Transaction};
use crate::transport::CardTransport;

/// Follow-up commands (GET RESPONSE or resend with corrected Le) allowed for
/// one logical operation.
pub const DEFAULT_FOLLOW_UP_LIMIT: usize = 32;

/// Drives a card through one logical operation at a time.
///
/// `61XX` answers are followed by GET RESPONSE on the same logical channel,
/// `6CXX` answers by the same command with Le set to XX. The returned
/// [`Trace`] holds every exchange, the last one carries the outcome.
pub struct Client<T: CardTransport> {
    transport: T,
    follow_up_limit: usize,
}

impl<T: CardTransport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            follow_up_limit: DEFAULT_FOLLOW_UP_LIMIT,
        }
    }

    pub fn with_follow_up_limit(mut self, limit: usize) -> Self {
        self.follow_up_limit = limit;
        self
    }

    pub fn follow_up_limit(&self) -> usize {
        self.follow_up_limit
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Sends `command` and resolves 61XX and 6CXX answers.
    ///
    /// On failure the error is [`Error::ExchangeAborted`], holding the
    /// transactions that reached the card so far.
    #[instrument(skip_all, fields(instruction = %command.instruction()))]
    pub fn send(&mut self, command: &CommandApdu) -> Result<Trace> {
        let mut trace = Trace::default();
        let mut current = command.clone();
        let mut follow_ups = 0;

        loop {
            let response = match self.exchange(&current) {
                Ok(response) => response,
                Err(e) => {
                    warn!("Exchange aborted on {}: {}", current, e);
                    trace.push(Transaction::new(current, None));
                    return Err(aborted(trace, e));
                }
            };

            let status = response.status();
            trace.push(Transaction::new(current.clone(), Some(response)));

            let next = match status.classify() {
                Classification::MoreAvailable(available) => {
                    debug!("{} bytes available, issuing GET RESPONSE", available);
                    CommandApdu::get_response(current.class(), usize::from(available))
                }
                Classification::WrongLength(length) => {
                    debug!("Wrong length, resending with Le {}", length);
                    current.with_ne(usize::from(length))
                }
                _ => {
                    debug!("Exchange completed after {} transaction(s) with {:04X}", trace.len(), status.value());
                    return Ok(trace);
                }
            };

            follow_ups += 1;
            if follow_ups > self.follow_up_limit {
                warn!("Card requested more than {} follow-up commands", self.follow_up_limit);
                let e = ProtocolLoopExceededSnafu {
                    limit: self.follow_up_limit,
                }
                .build();
                return Err(aborted(trace, e));
            }

            current = match next {
                Ok(next) => next,
                Err(e) => return Err(aborted(trace, e)),
            };
        }
    }

    fn exchange(&mut self, command: &CommandApdu) -> Result<ResponseApdu> {
        let packet = command.encode();
        trace!("[OUT] {:02x?}", packet);
        let raw = self.transport.transmit(&packet).context(TransportFailureSnafu)?;
        trace!("[IN] {:02x?}", raw);
        ResponseApdu::parse(&raw)
    }
}

fn aborted(trace: Trace, source: Error) -> Error {
    Error::ExchangeAborted {
        trace,
        source: Box::new(source),
    }
}
