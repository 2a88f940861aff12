//! Correlation of in-flight queries with their responses.

use std::{
    collections::{hash_map::Entry, HashMap},
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures::channel::oneshot;

use crate::{
    error::{ClientError, TransportError},
    packet::Message,
};

/// What a query resolves to.
pub type QueryResult = Result<Message, ClientError>;

/// The caller's half of an in-flight query.
///
/// Resolves exactly once, to the matching response or to the error that ended the query. If the
/// connection goes away without resolving it, it resolves to [`TransportError::Closed`].
///
/// Dropping a [`PendingQuery`] abandons the query. The connection notices and removes the table
/// entry; a response that arrives afterwards is treated as unsolicited.
#[derive(Debug)]
#[must_use = "a query is abandoned when its `PendingQuery` is dropped"]
pub struct PendingQuery {
    id: u16,
    rx: oneshot::Receiver<QueryResult>,
}

impl PendingQuery {
    /// The transaction ID this query is waiting on.
    #[inline]
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Returns the result if the query has already been resolved, without waiting.
    pub fn try_result(&mut self) -> Option<QueryResult> {
        match self.rx.try_recv() {
            Ok(res) => res,
            Err(oneshot::Canceled) => Some(Err(TransportError::Closed.into())),
        }
    }
}

impl Future for PendingQuery {
    type Output = QueryResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or_else(|oneshot::Canceled| Err(TransportError::Closed.into())))
    }
}

/// Map from transaction ID to the completion slot of the query waiting on it.
///
/// An entry is removed before its slot is filled, and a slot can be filled only once, so each
/// query is resolved at most once. Every path that resolves a query also removes it, and
/// [`QueryTable::fail_all`] drains the table, so no query stays pending forever once its
/// connection fails.
#[derive(Debug)]
pub struct QueryTable {
    pending: HashMap<u16, oneshot::Sender<QueryResult>>,
    capacity: usize,
}

impl QueryTable {
    /// Random attempts made by [`QueryTable::allocate_id`] before it falls back to a scan.
    const ALLOC_ATTEMPTS: usize = 16;

    /// Creates a table holding at most `capacity` pending queries (clamped to the ID space).
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: HashMap::new(),
            capacity: capacity.clamp(1, usize::from(u16::MAX) + 1),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: u16) -> bool {
        self.pending.contains_key(&id)
    }

    /// Registers a query with transaction ID `id` and returns its completion slot.
    ///
    /// Fails with [`ClientError::DuplicateId`] if a query with that ID is still awaited, and with
    /// [`ClientError::TooManyPending`] if the table is full even after dropping abandoned
    /// entries.
    pub fn register(&mut self, id: u16) -> Result<PendingQuery, ClientError> {
        if self.pending.len() >= self.capacity {
            self.prune_abandoned();
            if self.pending.len() >= self.capacity {
                return Err(ClientError::TooManyPending);
            }
        }

        let (tx, rx) = oneshot::channel();
        match self.pending.entry(id) {
            Entry::Occupied(mut e) => {
                if !e.get().is_canceled() {
                    return Err(ClientError::DuplicateId(id));
                }
                log::debug!("reusing abandoned transaction ID {:#06x}", id);
                e.insert(tx);
            }
            Entry::Vacant(e) => {
                e.insert(tx);
            }
        }
        log::debug!("registered query {:#06x} ({} pending)", id, self.pending.len());
        Ok(PendingQuery { id, rx })
    }

    /// Picks a random transaction ID that is not currently in use.
    ///
    /// Unpredictable IDs make off-path response spoofing harder.
    pub fn allocate_id(&mut self) -> Result<u16, ClientError> {
        if self.pending.len() >= self.capacity {
            self.prune_abandoned();
            if self.pending.len() >= self.capacity {
                return Err(ClientError::TooManyPending);
            }
        }

        for _ in 0..Self::ALLOC_ATTEMPTS {
            let id = fastrand::u16(..);
            if self.is_free(id) {
                return Ok(id);
            }
        }

        // Dense table; start at a random point and take the next free slot.
        let start = fastrand::u16(..);
        (0..=u16::MAX)
            .map(|off| start.wrapping_add(off))
            .find(|id| self.is_free(*id))
            .ok_or(ClientError::TooManyPending)
    }

    fn is_free(&self, id: u16) -> bool {
        self.pending.get(&id).map_or(true, |tx| tx.is_canceled())
    }

    /// Resolves the query waiting on the response's ID with the response.
    ///
    /// Returns [`ClientError::UnknownQuery`] if no query is waiting on that ID; the table is left
    /// untouched in that case.
    pub fn complete(&mut self, response: Message) -> Result<(), ClientError> {
        let id = response.id();
        let tx = self
            .pending
            .remove(&id)
            .ok_or(ClientError::UnknownQuery(id))?;
        if tx.send(Ok(response)).is_err() {
            log::debug!("response for abandoned query {:#06x} dropped", id);
        } else {
            log::debug!("completed query {:#06x}", id);
        }
        Ok(())
    }

    /// Resolves the query waiting on `id` with `error`.
    ///
    /// Returns whether such a query existed.
    pub fn fail(&mut self, id: u16, error: ClientError) -> bool {
        match self.pending.remove(&id) {
            Some(tx) => {
                log::debug!("failing query {:#06x}: {}", id, error);
                // An abandoned receiver has nobody to tell.
                let _ = tx.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Resolves every pending query with `error` and empties the table.
    ///
    /// Returns the number of queries that were pending.
    pub fn fail_all(&mut self, error: ClientError) -> usize {
        let count = self.pending.len();
        if count != 0 {
            log::debug!("failing {} pending queries: {}", count, error);
        }
        for (_, tx) in self.pending.drain() {
            let _ = tx.send(Err(error.clone()));
        }
        count
    }

    /// Removes the entry for `id` without resolving it.
    ///
    /// For callers that gave up on a query, e.g. after a timeout. Returns whether an entry was
    /// removed.
    pub fn abandon(&mut self, id: u16) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Removes all entries whose [`PendingQuery`] has been dropped.
    ///
    /// Returns the number of entries removed.
    pub fn prune_abandoned(&mut self) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, tx| !tx.is_canceled());
        let pruned = before - self.pending.len();
        if pruned != 0 {
            log::debug!("pruned {} abandoned queries", pruned);
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use crate::packet::{DomainName, Header, QType, Question};

    use super::*;

    fn response(id: u16) -> Message {
        Message::new(Header::response_to(&Header::query(id))).with_question(Question::new(
            DomainName::from_str("example.com").unwrap(),
            QType::A,
        ))
    }

    #[test]
    fn completes_once() {
        let mut table = QueryTable::new(8);
        let mut pending = table.register(1).unwrap();
        assert_eq!(pending.id(), 1);
        assert!(pending.try_result().is_none());

        table.complete(response(1)).unwrap();
        assert!(table.is_empty());
        assert!(matches!(
            table.complete(response(1)),
            Err(ClientError::UnknownQuery(1))
        ));
        assert!(!table.fail(1, ClientError::TimedOut));

        assert_eq!(block_on(pending).unwrap(), response(1));
    }

    #[test]
    fn unknown_response_leaves_table_alone() {
        let mut table = QueryTable::new(8);
        let mut pending = table.register(1).unwrap();
        assert!(matches!(
            table.complete(response(2)),
            Err(ClientError::UnknownQuery(2))
        ));
        assert_eq!(table.len(), 1);
        assert!(table.contains(1));
        assert!(!table.contains(2));
        assert!(pending.try_result().is_none());
    }

    #[test]
    fn duplicate_ids() {
        let mut table = QueryTable::new(8);
        let first = table.register(5).unwrap();
        assert!(matches!(table.register(5), Err(ClientError::DuplicateId(5))));

        // Once the first caller is gone, its ID can be reused.
        drop(first);
        let _second = table.register(5).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn capacity_and_pruning() {
        let mut table = QueryTable::new(2);
        let a = table.register(1).unwrap();
        let _b = table.register(2).unwrap();
        assert!(matches!(table.register(3), Err(ClientError::TooManyPending)));
        assert!(matches!(table.allocate_id(), Err(ClientError::TooManyPending)));

        drop(a);
        let _c = table.register(3).unwrap();
        assert!(!table.contains(1));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn prune_and_abandon() {
        let mut table = QueryTable::new(8);
        let a = table.register(1).unwrap();
        let _b = table.register(2).unwrap();
        let c = table.register(3).unwrap();
        drop(a);
        assert_eq!(table.prune_abandoned(), 1);
        assert_eq!(table.len(), 2);

        assert!(table.abandon(c.id()));
        assert!(!table.abandon(c.id()));
        assert_eq!(table.len(), 1);

        // The slot was dropped without a result.
        assert!(matches!(
            block_on(c),
            Err(ClientError::Transport(TransportError::Closed))
        ));
    }

    #[test]
    fn fail_all_resolves_everything() {
        let mut table = QueryTable::new(64);
        let pending: Vec<_> = (0..10).map(|id| table.register(id).unwrap()).collect();
        assert_eq!(table.fail_all(TransportError::Closed.into()), 10);
        assert!(table.is_empty());
        assert_eq!(table.fail_all(TransportError::Closed.into()), 0);

        for p in pending {
            assert!(matches!(
                block_on(p),
                Err(ClientError::Transport(TransportError::Closed))
            ));
        }
    }

    #[test]
    fn allocated_ids_are_free() {
        let mut table = QueryTable::new(usize::MAX);
        let mut held = Vec::new();
        for _ in 0..1000 {
            let id = table.allocate_id().unwrap();
            assert!(!table.contains(id));
            held.push(table.register(id).unwrap());
        }
        assert_eq!(table.len(), 1000);
    }

    #[test]
    fn allocation_scans_dense_table() {
        let mut table = QueryTable::new(usize::MAX);
        let mut held: Vec<_> = (0..=u16::MAX)
            .filter(|id| *id != 0x4242)
            .map(|id| table.register(id).unwrap())
            .collect();
        assert_eq!(table.allocate_id().unwrap(), 0x4242);
        held.push(table.register(0x4242).unwrap());
        assert!(matches!(table.allocate_id(), Err(ClientError::TooManyPending)));
    }
}
