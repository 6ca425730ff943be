//! Async query cache and mutation engine
//!
//! A small key-indexed state store for asynchronous reads and writes:
//! - `QueryClient`: per-key loading/success/error tracking, at most one
//!   live fetch per key, invalidation and direct cache writes
//! - `RetryPolicy`: bounded automatic retry with exponential back-off
//! - `Mutation`: single-instance async write with idle/pending/success/error
//!   tracking and a completion hook
//!
//! State changes are published through `tokio::sync::watch` channels so
//! consumers can recompute derived state on every change.
//!
//! # Example
//!
//! ```rust,ignore
//! use upgrade_query::{task_fn, QueryClient, RetryPolicy};
//!
//! let client = QueryClient::new(RetryPolicy::default());
//! let mut sub = client.subscribe("message-upgrade", task_fn(|| async { port.fetch_status().await }));
//! sub.changed().await?;
//! println!("{:?}", sub.state().phase);
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod mutation;
pub mod query;
pub mod retry;

pub use error::{BoxError, MutationError, QueryError};
pub use mutation::{Mutation, MutationPhase, MutationState};
pub use query::{QueryClient, QueryKey, QueryPhase, QueryState, QuerySubscription};
pub use retry::RetryPolicy;

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

/// Shared async operation producing a fresh future per invocation
///
/// Used both as a query fetcher and as a mutation body.
pub type TaskFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, BoxError>> + Send + Sync>;

/// Box an async closure into a `TaskFn`
pub fn task_fn<T, E, F, Fut>(f: F) -> TaskFn<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<BoxError>,
    T: 'static,
{
    Arc::new(move || {
        let fut = f();
        async move { fut.await.map_err(Into::<BoxError>::into) }.boxed()
    })
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
