use std::future::Future;

use futures::{FutureExt, future::BoxFuture};

use super::{
    error::InvalidOutcome,
    outcome::{IntoOutcome, Outcome},
};
use crate::Error as CrateError;

/// What a single invocation resolves to: a reported outcome (possibly unrecognized), or the
/// task's own error.
pub type TaskFuture = BoxFuture<'static, Result<Result<Outcome, InvalidOutcome>, CrateError>>;

/// The unit of work a [`Pacer`](super::Pacer) runs.
///
/// Every call to [`PacedTask::invoke`] starts one run. Closures returning a future of
/// `Result<S, E>` implement this trait, where `S` is anything convertible with
/// [`IntoOutcome`] and `E` converts into the crate error.
///
/// # Example
/// ```rust
/// use adaptive_pacer::adaptive_pacing::{Outcome, PacedTask};
///
/// fn assert_task<T: PacedTask>(_: T) {}
///
/// assert_task(|| async { Ok::<_, std::io::Error>(Outcome::RateLimited) });
/// assert_task(|| async { Ok::<_, String>(http::StatusCode::TOO_MANY_REQUESTS) });
/// ```
pub trait PacedTask: Send + Sync + 'static {
    fn invoke(&self) -> TaskFuture;
}

impl<F, Fut, S, E> PacedTask for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S, E>> + Send + 'static,
    S: IntoOutcome + 'static,
    E: Into<CrateError> + 'static,
{
    fn invoke(&self) -> TaskFuture {
        (self)()
            .map(|result| result.map(IntoOutcome::into_outcome).map_err(Into::into))
            .boxed()
    }
}
