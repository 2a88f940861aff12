//! Outbound and inbound message pipelines around a [`QueryTable`].

use futures::channel::mpsc;

use crate::{
    config::Config,
    error::{ClientError, TransportError},
    hex::Hex,
    packet::{
        self,
        decoder::{decode_message, peek_id},
        encoder::encode_message,
        Message,
    },
    query::{PendingQuery, QueryTable},
};

/// Stream of errors that no pending query could be told about.
///
/// This carries responses to unknown transaction IDs, messages that could not be attributed to
/// any query, and transport failures. At most [`ERROR_BACKLOG`] events are queued for a
/// subscriber that is not polling; further events are dropped until it catches up.
pub type ErrorEvents = mpsc::Receiver<ClientError>;

/// Number of error events buffered for a subscriber.
pub const ERROR_BACKLOG: usize = 64;

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// The message resolved the query with this ID.
    Completed(u16),
    /// The message was malformed and failed the query with this ID.
    Failed(u16),
    /// The message decoded fine but no query was waiting on its ID.
    Unsolicited(u16),
    /// The message was malformed and its ID matched no pending query.
    Malformed(u16),
    /// The message was too short to even contain a header.
    Unreadable(packet::Error),
}

/// The transport-independent part of a connection.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    table: QueryTable,
    assign_ids: bool,
    errors: Option<mpsc::Sender<ClientError>>,
}

impl Dispatcher {
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            table: QueryTable::new(config.max_pending()),
            assign_ids: config.assign_ids(),
            errors: None,
        }
    }

    pub(crate) fn table(&self) -> &QueryTable {
        &self.table
    }

    pub(crate) fn table_mut(&mut self) -> &mut QueryTable {
        &mut self.table
    }

    /// Starts a new error subscription, replacing any previous one.
    pub(crate) fn errors(&mut self) -> ErrorEvents {
        let (tx, rx) = mpsc::channel(ERROR_BACKLOG);
        self.errors = Some(tx);
        rx
    }

    pub(crate) fn report(&mut self, error: ClientError) {
        log::warn!("{}", error);
        if let Some(tx) = &mut self.errors {
            match tx.try_send(error) {
                Ok(()) => {}
                Err(e) if e.is_full() => {
                    log::debug!("error subscriber is behind, dropping event");
                }
                Err(_) => {
                    // subscriber went away
                    self.errors = None;
                }
            }
        }
    }

    /// Encodes `msg`, hands the bytes to `wrap` for framing, and registers the query.
    ///
    /// The query is registered before the framed bytes are returned, so it is in the table by
    /// the time anything can be transmitted. Nothing is registered if encoding or framing fails.
    pub(crate) fn outbound<T>(
        &mut self,
        msg: Message,
        wrap: impl FnOnce(Vec<u8>) -> Result<T, TransportError>,
    ) -> Result<(T, PendingQuery), ClientError> {
        let msg = if self.assign_ids {
            let id = self.table.allocate_id()?;
            msg.with_id(id)
        } else {
            msg
        };
        let id = msg.id();

        let bytes = encode_message(&msg)?;
        log::trace!("query {:#06x}: {} bytes {}", id, bytes.len(), Hex(&bytes));
        let framed = wrap(bytes)?;
        let pending = self.table.register(id)?;
        Ok((framed, pending))
    }

    /// Decodes one inbound message and resolves the query it belongs to.
    pub(crate) fn inbound(&mut self, bytes: &[u8]) -> Inbound {
        log::trace!("response: {} bytes {}", bytes.len(), Hex(bytes));

        match decode_message(bytes) {
            Ok(msg) => {
                let id = msg.id();
                match self.table.complete(msg) {
                    Ok(()) => Inbound::Completed(id),
                    Err(e) => {
                        self.report(e);
                        Inbound::Unsolicited(id)
                    }
                }
            }
            Err(e) => match peek_id(bytes) {
                Some(id) => {
                    if self.table.fail(id, e.into()) {
                        log::debug!("malformed response to query {:#06x}: {}", id, e);
                        Inbound::Failed(id)
                    } else {
                        self.report(e.into());
                        Inbound::Malformed(id)
                    }
                }
                None => Inbound::Unreadable(e),
            },
        }
    }

    /// Fails every pending query with `error` and publishes it.
    ///
    /// Returns the number of queries failed.
    pub(crate) fn fail_all(&mut self, error: TransportError) -> usize {
        let failed = self.table.fail_all(error.clone().into());
        self.report(error.into());
        failed
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let failed = self.table.fail_all(TransportError::Closed.into());
        if failed != 0 {
            log::debug!("connection dropped with {} queries pending", failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::{executor::block_on, FutureExt, StreamExt};

    use crate::packet::{DomainName, Header, QType, Question, Record, Type};

    use super::*;

    fn query(id: u16) -> Message {
        Message::query(
            id,
            Question::new(DomainName::from_str("example.com").unwrap(), QType::A),
        )
    }

    fn response(id: u16) -> Message {
        let q = query(id);
        Message::new(Header::response_to(q.header()))
            .with_question(q.questions()[0].clone())
            .with_answer(Record::new(
                DomainName::from_str("example.com").unwrap(),
                Type::A,
                [93u8, 184, 216, 34],
            ))
    }

    fn next_error(rx: &mut ErrorEvents) -> Option<ClientError> {
        rx.next().now_or_never().flatten()
    }

    #[test]
    fn outbound_registers_before_returning() {
        let mut disp = Dispatcher::new(&Config::default());
        let (bytes, pending) = disp.outbound(query(0x1234), Ok).unwrap();
        assert_eq!(&bytes[..2], &[0x12, 0x34]);
        assert_eq!(pending.id(), 0x1234);
        assert!(disp.table().contains(0x1234));

        assert!(matches!(
            disp.outbound(query(0x1234), Ok),
            Err(ClientError::DuplicateId(0x1234))
        ));
        assert_eq!(disp.table().len(), 1);
    }

    #[test]
    fn failed_framing_registers_nothing() {
        let mut disp = Dispatcher::new(&Config::default());
        let res = disp.outbound(query(1), |_| Err::<(), _>(TransportError::FrameTooLarge(70000)));
        assert!(matches!(
            res,
            Err(ClientError::Transport(TransportError::FrameTooLarge(70000)))
        ));
        assert!(disp.table().is_empty());
    }

    #[test]
    fn assigned_ids_replace_caller_ids() {
        let mut disp = Dispatcher::new(&Config::default().with_assign_ids(true));
        let (a, pa) = disp.outbound(query(7), Ok).unwrap();
        let (b, pb) = disp.outbound(query(7), Ok).unwrap();
        assert_ne!(pa.id(), pb.id());
        assert_eq!(u16::from_be_bytes([a[0], a[1]]), pa.id());
        assert_eq!(u16::from_be_bytes([b[0], b[1]]), pb.id());
        assert_eq!(disp.table().len(), 2);
    }

    #[test]
    fn inbound_completes_pending_query() {
        let mut disp = Dispatcher::new(&Config::default());
        let mut errors = disp.errors();
        let (_, pending) = disp.outbound(query(0x1234), Ok).unwrap();

        let bytes = encode_message(&response(0x1234)).unwrap();
        assert_eq!(disp.inbound(&bytes), Inbound::Completed(0x1234));
        assert!(disp.table().is_empty());
        assert_eq!(block_on(pending).unwrap(), response(0x1234));

        // A second copy of the response is unsolicited.
        assert_eq!(disp.inbound(&bytes), Inbound::Unsolicited(0x1234));
        assert!(matches!(
            next_error(&mut errors),
            Some(ClientError::UnknownQuery(0x1234))
        ));
        assert!(next_error(&mut errors).is_none());
    }

    #[test]
    fn unknown_id_leaves_table_unchanged() {
        let mut disp = Dispatcher::new(&Config::default());
        let mut errors = disp.errors();
        let (_, mut pending) = disp.outbound(query(1), Ok).unwrap();

        let bytes = encode_message(&response(2)).unwrap();
        assert_eq!(disp.inbound(&bytes), Inbound::Unsolicited(2));
        assert_eq!(disp.table().len(), 1);
        assert!(disp.table().contains(1));
        assert!(pending.try_result().is_none());
        assert!(matches!(
            next_error(&mut errors),
            Some(ClientError::UnknownQuery(2))
        ));
    }

    #[test]
    fn malformed_response_fails_its_query() {
        let mut disp = Dispatcher::new(&Config::default());
        let mut errors = disp.errors();
        let (_, pending) = disp.outbound(query(9), Ok).unwrap();
        let (_, other) = disp.outbound(query(10), Ok).unwrap();

        let mut bytes = encode_message(&response(9)).unwrap();
        // claim 5 answers
        bytes[6..8].copy_from_slice(&5u16.to_be_bytes());
        assert_eq!(disp.inbound(&bytes), Inbound::Failed(9));
        assert!(matches!(
            block_on(pending),
            Err(ClientError::Protocol(packet::Error::Eof))
        ));

        // Only the query the header names is affected.
        assert!(disp.table().contains(10));
        assert!(next_error(&mut errors).is_none());
        drop(other);
    }

    #[test]
    fn malformed_unknown_and_unreadable() {
        let mut disp = Dispatcher::new(&Config::default());
        let mut errors = disp.errors();
        let (_, _pending) = disp.outbound(query(1), Ok).unwrap();

        let mut bytes = encode_message(&response(2)).unwrap();
        bytes.truncate(bytes.len() - 1);
        assert_eq!(disp.inbound(&bytes), Inbound::Malformed(2));
        assert!(matches!(
            next_error(&mut errors),
            Some(ClientError::Protocol(packet::Error::Eof))
        ));

        // Reporting a header-less message is up to the connection.
        assert_eq!(
            disp.inbound(&[0x00, 0x01, 0x81]),
            Inbound::Unreadable(packet::Error::Eof)
        );
        assert!(next_error(&mut errors).is_none());
        assert_eq!(disp.table().len(), 1);
    }

    #[test]
    fn fail_all_publishes_once() {
        let mut disp = Dispatcher::new(&Config::default());
        let mut errors = disp.errors();
        let pending: Vec<_> = (0..5)
            .map(|id| disp.outbound(query(id), Ok).unwrap().1)
            .collect();

        assert_eq!(disp.fail_all(TransportError::Closed), 5);
        assert!(disp.table().is_empty());
        for p in pending {
            assert!(matches!(
                block_on(p),
                Err(ClientError::Transport(TransportError::Closed))
            ));
        }
        assert!(matches!(
            next_error(&mut errors),
            Some(ClientError::Transport(TransportError::Closed))
        ));
        assert!(next_error(&mut errors).is_none());
    }

    #[test]
    fn drop_fails_pending() {
        let mut disp = Dispatcher::new(&Config::default());
        let (_, pending) = disp.outbound(query(3), Ok).unwrap();
        drop(disp);
        assert!(matches!(
            block_on(pending),
            Err(ClientError::Transport(TransportError::Closed))
        ));
    }

    #[test]
    fn dropped_subscriber_is_forgotten() {
        let mut disp = Dispatcher::new(&Config::default());
        drop(disp.errors());
        disp.report(ClientError::UnknownQuery(1));
        assert!(disp.errors.is_none());
    }

    #[test]
    fn idle_subscriber_backlog_is_bounded() {
        let mut disp = Dispatcher::new(&Config::default());
        let mut rx = disp.errors();
        for id in 0..1000 {
            disp.report(ClientError::UnknownQuery(id));
        }
        assert!(disp.errors.is_some());

        let mut queued = 0;
        while let Some(e) = next_error(&mut rx) {
            if queued == 0 {
                assert!(matches!(e, ClientError::UnknownQuery(0)));
            }
            queued += 1;
        }
        // one extra slot belongs to the sender
        assert_eq!(queued, ERROR_BACKLOG + 1);

        // Once drained, events flow again.
        disp.report(ClientError::UnknownQuery(7));
        assert!(matches!(next_error(&mut rx), Some(ClientError::UnknownQuery(7))));
    }
}
