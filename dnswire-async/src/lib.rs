//! `async-io` drivers for the [`dnswire`] DNS client core.
//!
//! [`AsyncUdpClient`] and [`AsyncTcpClient`] own a socket and a connection from [`dnswire`], and
//! let any number of tasks send queries over them concurrently. Whichever task is waiting reads
//! from the socket, so no background task is needed.

use std::{
    future::Future,
    time::{Duration, Instant},
};

use async_io::Timer;
use futures_lite::future;

use dnswire::{
    query::{PendingQuery, QueryResult},
    ClientError,
};

pub use dnswire;

mod tcp;
mod udp;

pub use tcp::AsyncTcpClient;
pub use udp::AsyncUdpClient;

/// Default time to wait for a response before giving up on a query.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs `fut` to completion unless `deadline` passes first.
async fn before<T>(deadline: Instant, fut: impl Future<Output = T>) -> Option<T> {
    future::or(async move { Some(fut.await) }, async {
        Timer::at(deadline).await;
        None
    })
    .await
}

/// Runs `step` until `pending` resolves, or fails with [`ClientError::TimedOut`] at `deadline`.
///
/// `step` reads from the socket once and feeds whatever arrived to the connection. It may be
/// cancelled at an `.await` point, so it must not lose data when dropped.
async fn wait_for<F>(
    pending: &mut PendingQuery,
    deadline: Instant,
    mut step: impl FnMut() -> F,
) -> QueryResult
where
    F: Future<Output = ()>,
{
    let wait = async {
        loop {
            // Another task may already have read our response, so check before reading again.
            let resolved = future::or(async { Some((&mut *pending).await) }, async {
                step().await;
                None
            })
            .await;
            if let Some(res) = resolved {
                return res;
            }
        }
    };
    before(deadline, wait)
        .await
        .unwrap_or(Err(ClientError::TimedOut))
}
