//! User-data fetching.

use std::future::Future;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::request::Request;

/// Loads the data rules decide on (usually the signed-in user).
///
/// `Ok(None)` means "unauthenticated" and fails the request just like an
/// error does. Any `Fn(Request) -> impl Future<Output = Result<Option<T>>>`
/// is a fetcher.
pub trait UserFetcher<T>: Send + Sync {
    /// Fetches data for the request.
    fn fetch<'a>(&'a self, req: &'a Request) -> BoxFuture<'a, Result<Option<T>>>;
}

impl<T, F, Fut> UserFetcher<T> for F
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<T>>> + Send + 'static,
{
    fn fetch<'a>(&'a self, req: &'a Request) -> BoxFuture<'a, Result<Option<T>>> {
        Box::pin(self(req.clone()))
    }
}
