use std::{
    io,
    net::{SocketAddr, TcpStream},
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use async_io::Async;
use futures_lite::{AsyncReadExt, AsyncWriteExt};

use dnswire::{
    connection::StreamConnection,
    framing::stream::{MAX_FRAME_LEN, PREFIX_LEN},
    packet::Message,
    pipeline::ErrorEvents,
    ClientError, Config, TransportError,
};

/// A DNS client that sends queries to one server over a TCP connection.
///
/// Queries are pipelined. Once the connection fails or the server closes it, every pending and
/// future query fails and a new client has to be connected.
pub struct AsyncTcpClient {
    stream: Async<TcpStream>,
    server: SocketAddr,
    conn: Mutex<StreamConnection>,
    writer: futures::lock::Mutex<()>,
    read_buf: futures::lock::Mutex<Vec<u8>>,
    timeout: Duration,
}

impl AsyncTcpClient {
    /// Connects to the given server.
    pub async fn connect(server: SocketAddr) -> io::Result<Self> {
        Self::connect_with_config(server, Config::default()).await
    }

    pub async fn connect_with_config(server: SocketAddr, config: Config) -> io::Result<Self> {
        let stream = Async::<TcpStream>::connect(server).await?;
        stream.get_ref().set_nodelay(true)?;
        log::debug!("connected to {} over TCP", server);

        Ok(Self {
            stream,
            server,
            conn: Mutex::new(StreamConnection::new(config)),
            writer: futures::lock::Mutex::new(()),
            read_buf: futures::lock::Mutex::new(vec![0; PREFIX_LEN + MAX_FRAME_LEN]),
            timeout: crate::DEFAULT_TIMEOUT,
        })
    }

    #[inline]
    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Sets the time allowed for each query, from writing it until its response arrives.
    ///
    /// A write still unfinished at the deadline leaves a partial frame on the stream, which fails
    /// the connection.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Subscribes to errors that could not be delivered to a pending query.
    pub fn errors(&self) -> ErrorEvents {
        self.lock().errors()
    }

    /// Sends `msg` to the server and waits for the response with the same transaction ID.
    pub async fn query(&self, msg: Message) -> Result<Message, ClientError> {
        let deadline = Instant::now() + self.timeout;
        let (frame, mut pending) = self.lock().send(msg)?;
        let id = pending.id();

        match crate::before(deadline, self.write_frame(&frame)).await {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                self.lock().fail_all(e.into());
                return pending.await;
            }
            None => {
                self.timed_out(id);
                return Err(ClientError::TimedOut);
            }
        }

        let res = crate::wait_for(&mut pending, deadline, || self.read_chunk()).await;
        if let Err(ClientError::TimedOut) = res {
            self.timed_out(id);
        }
        res
    }

    fn timed_out(&self, id: u16) {
        log::debug!("query {:#06x} timed out after {:?}", id, self.timeout);
        self.lock().abandon(id);
    }

    async fn write_frame(&self, frame: &[u8]) -> io::Result<()> {
        let _guard = self.writer.lock().await;
        let mut partial = PartialWrite {
            conn: &self.conn,
            done: false,
        };
        let res = (&self.stream).write_all(frame).await;
        partial.done = true;
        res
    }

    async fn read_chunk(&self) {
        // Chunks have to reach the connection in the order they were read.
        let mut buf = self.read_buf.lock().await;
        match (&self.stream).read(&mut buf[..]).await {
            Ok(0) => {
                log::debug!("{} closed the connection", self.server);
                self.lock().close();
            }
            Ok(len) => {
                self.lock().receive(&buf[..len]);
            }
            Err(e) => {
                self.lock().fail_all(e.into());
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamConnection> {
        lock(&self.conn)
    }
}

fn lock(conn: &Mutex<StreamConnection>) -> MutexGuard<'_, StreamConnection> {
    conn.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fails the connection if a frame write is dropped halfway, since the stream is then
/// desynchronized.
struct PartialWrite<'a> {
    conn: &'a Mutex<StreamConnection>,
    done: bool,
}

impl Drop for PartialWrite<'_> {
    fn drop(&mut self) {
        if !self.done {
            lock(self.conn).fail_all(TransportError::Desynchronized);
        }
    }
}
