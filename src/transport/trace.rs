use std::fmt;

use crate::packets::apdu::{CommandApdu, ResponseApdu};
use crate::packets::status::StatusWord;

/// One command and the response it got, `None` when the exchange failed
/// before a response could be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    command: CommandApdu,
    response: Option<ResponseApdu>,
}

impl Transaction {
    pub fn new(command: CommandApdu, response: Option<ResponseApdu>) -> Self {
        Self { command, response }
    }

    pub fn command(&self) -> &CommandApdu {
        &self.command
    }

    pub fn response(&self) -> Option<&ResponseApdu> {
        self.response.as_ref()
    }

    pub fn status(&self) -> Option<StatusWord> {
        self.response.as_ref().map(|response| response.status())
    }

    pub fn is_success(&self) -> bool {
        self.status().is_some_and(|status| status.is_success())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.response {
            Some(response) => write!(f, "{} => {}", self.command, response),
            None => write!(f, "{} => no response", self.command),
        }
    }
}

/// Every transaction of one logical operation, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Trace(Vec<Transaction>);

impl Trace {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self(transactions)
    }

    pub fn push(&mut self, transaction: Transaction) {
        self.0.push(transaction)
    }

    pub fn first(&self) -> Option<&Transaction> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Transaction> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.0.iter()
    }

    /// Outcome of the last transaction only, earlier 61XX or 6CXX steps do
    /// not count.
    pub fn is_success(&self) -> bool {
        self.last().is_some_and(|transaction| transaction.is_success())
    }

    /// Response of the last transaction.
    pub fn final_response(&self) -> Option<&ResponseApdu> {
        self.last().and_then(|transaction| transaction.response())
    }

    pub fn final_status(&self) -> Option<StatusWord> {
        self.last().and_then(|transaction| transaction.status())
    }
}

impl From<Vec<Transaction>> for Trace {
    fn from(transactions: Vec<Transaction>) -> Self {
        Self(transactions)
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a Transaction;
    type IntoIter = std::slice::Iter<'a, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Trace {
    type Item = Transaction;
    type IntoIter = std::vec::IntoIter<Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, transaction) in self.0.iter().enumerate() {
            writeln!(f, "#{} {}", index + 1, transaction)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::class::ClassByte;
    use crate::packets::instruction::Ins;

    fn transaction(sw: u16) -> Transaction {
        let command = CommandApdu::new(ClassByte::default(), Ins::Select.into(), 0x04, 0x00, vec![0xA0], 0).unwrap();
        Transaction::new(command, Some(ResponseApdu::new(Vec::new(), StatusWord::new(sw))))
    }

    #[test]
    fn success_follows_last_transaction() {
        let trace = Trace::new(vec![transaction(0x6110), transaction(0x9000)]);
        assert!(trace.is_success(), "61 10 then 90 00 is a success");

        let trace = Trace::new(vec![transaction(0x9000), transaction(0x6A82)]);
        assert!(!trace.is_success(), "90 00 then 6A 82 is a failure");
    }

    #[test]
    fn empty_or_unanswered() {
        assert!(!Trace::default().is_success());

        let command = CommandApdu::new(ClassByte::default(), Ins::GetResponse.into(), 0, 0, vec![], 16).unwrap();
        let trace = Trace::new(vec![transaction(0x6110), Transaction::new(command, None)]);
        assert!(!trace.is_success());
        assert_eq!(trace.final_status(), None);
        assert_eq!(trace.len(), 2);
    }

    #[test]
    fn display() {
        let trace = Trace::new(vec![transaction(0x9000)]);
        assert_eq!(
            trace.to_string(),
            "#1 SELECT (A4) | P1: 04, P2: 00 | Lc: 1 | Le: 0 => Data (0 bytes) | Status: [9000] Process completed normally\n"
        );
    }
}
