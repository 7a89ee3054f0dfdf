//! Per-request error accumulation.
//!
//! The access log layer inserts a fresh [`RequestErrors`] into every request's
//! extensions. Handlers record failures on it (directly or through the axum
//! extractor) and the layer logs them once the response is ready.

use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::Extensions;

/// Shared list of errors raised while handling one request.
#[derive(Debug, Clone, Default)]
pub struct RequestErrors {
    inner: Arc<Mutex<Vec<String>>>,
}

impl RequestErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// The list inserted by the access log layer, if present.
    pub fn from_extensions(extensions: &Extensions) -> Option<Self> {
        extensions.get::<Self>().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, err: impl fmt::Display) {
        self.lock().push(err.to_string());
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the errors recorded so far, in order.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().clone()
    }
}

/// Yields the layer's list, or a detached empty one when the layer is absent.
impl<S> FromRequestParts<S> for RequestErrors
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_extensions(&parts.extensions).unwrap_or_default())
    }
}
