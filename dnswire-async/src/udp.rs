use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket},
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use async_io::Async;
use socket2::{Domain, Protocol, Socket, Type};

use dnswire::{
    connection::DatagramConnection, framing::datagram::Envelope, packet::Message,
    pipeline::ErrorEvents, ClientError, Config,
};

/// A DNS client that sends queries to one server over UDP.
pub struct AsyncUdpClient {
    sock: Async<UdpSocket>,
    server: SocketAddr,
    recv_buffer_size: usize,
    conn: Mutex<DatagramConnection>,
    timeout: Duration,
}

impl AsyncUdpClient {
    /// Creates a client that will contact the given server.
    pub fn new(server: SocketAddr) -> io::Result<Self> {
        Self::with_config(server, Config::default())
    }

    pub fn with_config(server: SocketAddr, config: Config) -> io::Result<Self> {
        let bind_addr: SocketAddr = if server.is_ipv6() {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        };
        let sock = Socket::new(Domain::for_address(server), Type::DGRAM, Some(Protocol::UDP))?;
        sock.bind(&bind_addr.into())?;
        // Connecting makes the OS drop datagrams from anyone but the server.
        sock.connect(&server.into())?;
        let sock = Async::new(UdpSocket::from(sock))?;
        log::debug!("UDP client bound to {} for {}", sock.get_ref().local_addr()?, server);

        Ok(Self {
            sock,
            server,
            recv_buffer_size: config.recv_buffer_size(),
            conn: Mutex::new(DatagramConnection::new(server, config)),
            timeout: crate::DEFAULT_TIMEOUT,
        })
    }

    #[inline]
    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Sets the time allowed for each query, from sending it until its response arrives.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Subscribes to errors that could not be delivered to a pending query.
    pub fn errors(&self) -> ErrorEvents {
        self.lock().errors()
    }

    /// Sends `msg` to the server and waits for the response with the same transaction ID.
    ///
    /// Truncated responses are returned as they are; retrying over TCP is left to the caller.
    pub async fn query(&self, msg: Message) -> Result<Message, ClientError> {
        let deadline = Instant::now() + self.timeout;
        let (datagram, mut pending) = self.lock().send(msg)?;
        let id = pending.id();

        match crate::before(deadline, self.sock.send(datagram.payload())).await {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                self.lock().abandon(id);
                return Err(e.into());
            }
            None => {
                self.timed_out(id);
                return Err(ClientError::TimedOut);
            }
        }

        let res = crate::wait_for(&mut pending, deadline, || self.recv_one()).await;
        if let Err(ClientError::TimedOut) = res {
            self.timed_out(id);
        }
        res
    }

    fn timed_out(&self, id: u16) {
        log::debug!("query {:#06x} timed out after {:?}", id, self.timeout);
        self.lock().abandon(id);
    }

    async fn recv_one(&self) {
        let mut buf = vec![0; self.recv_buffer_size];
        match self.sock.recv(&mut buf).await {
            Ok(len) => {
                buf.truncate(len);
                self.lock().receive(Envelope::wrap(self.server, buf));
            }
            Err(e) => {
                self.lock().fail_all(e.into());
            }
        }
    }

    // Never held across an `.await`, so a poisoned lock only means a panic elsewhere.
    fn lock(&self) -> MutexGuard<'_, DatagramConnection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use dnswire::packet::{
        decoder::decode_message, encoder::encode_message, DomainName, Header, QType, Question,
        Record, Type,
    };
    use futures_lite::future::{self, block_on};

    use super::*;

    fn query(name: &str) -> Message {
        Message::query(
            0,
            Question::new(DomainName::from_str(name).unwrap(), QType::A),
        )
    }

    fn answer(q: &Message, addr: [u8; 4]) -> Message {
        let question = q.questions()[0].clone();
        let record = Record::new(question.name().clone(), Type::A, addr);
        Message::new(Header::response_to(q.header()))
            .with_question(question)
            .with_answer(record)
    }

    #[test]
    fn concurrent_queries_answered_out_of_order() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut buf = [0; 512];
            let mut queries = Vec::new();
            for _ in 0..2 {
                let (len, from) = server.recv_from(&mut buf).unwrap();
                queries.push((decode_message(&buf[..len]).unwrap(), from));
            }
            for (q, from) in queries.iter().rev() {
                let last = if q.questions()[0].name().to_string() == "one.test." { 1 } else { 2 };
                let resp = encode_message(&answer(q, [127, 0, 0, last])).unwrap();
                server.send_to(&resp, from).unwrap();
            }
        });

        let client =
            AsyncUdpClient::with_config(addr, Config::default().with_assign_ids(true)).unwrap();
        let (one, two) = block_on(future::zip(
            client.query(query("one.test")),
            client.query(query("two.test")),
        ));
        let (one, two) = (one.unwrap(), two.unwrap());
        assert_eq!(one.answers()[0].rdata(), &[127, 0, 0, 1]);
        assert_eq!(two.answers()[0].rdata(), &[127, 0, 0, 2]);
        assert_eq!(client.lock().pending_count(), 0);
        handle.join().unwrap();
    }

    #[test]
    fn timeout_abandons_query() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut client = AsyncUdpClient::new(server.local_addr().unwrap()).unwrap();
        client.set_timeout(Duration::from_millis(50));

        let res = block_on(client.query(query("silent.test")));
        assert!(matches!(res, Err(ClientError::TimedOut)));
        assert_eq!(client.lock().pending_count(), 0);

        // The ID is free again.
        let res = block_on(client.query(query("silent.test")));
        assert!(matches!(res, Err(ClientError::TimedOut)));
    }

    #[test]
    fn duplicate_ids_are_refused() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut client = AsyncUdpClient::new(server.local_addr().unwrap()).unwrap();
        client.set_timeout(Duration::from_millis(50));

        let (a, b) = block_on(future::zip(
            client.query(query("a.test")),
            client.query(query("b.test")),
        ));
        assert!(matches!(a, Err(ClientError::TimedOut)));
        assert!(matches!(b, Err(ClientError::DuplicateId(0))));
    }
}
