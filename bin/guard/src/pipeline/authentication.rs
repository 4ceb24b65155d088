use std::{any::Any, panic::AssertUnwindSafe};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::pipeline::request::GuardRequest;

#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("Authenticator panicked: {0}")]
    Panicked(String),
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Application-specific credential verification.
///
/// `Ok(None)` means the request carries no credentials; an error means the credentials
/// could not be verified. Both leave the caller unauthenticated.
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    type User: Send + Sync + 'static;

    async fn authenticate(
        &self,
        req: &GuardRequest,
    ) -> Result<Option<Self::User>, AuthenticationError>;
}

/// A disabled authenticator: every caller is anonymous.
#[async_trait]
impl<A: Authenticator> Authenticator for Option<A> {
    type User = A::User;

    async fn authenticate(
        &self,
        req: &GuardRequest,
    ) -> Result<Option<Self::User>, AuthenticationError> {
        match self {
            Some(authenticator) => authenticator.authenticate(req).await,
            None => Ok(None),
        }
    }
}

#[derive(Debug)]
pub enum AuthDecision<U> {
    Authenticated(U),
    Anonymous,
    Failed(AuthenticationError),
}

impl<U> AuthDecision<U> {
    pub fn user(&self) -> Option<&U> {
        match self {
            AuthDecision::Authenticated(user) => Some(user),
            AuthDecision::Anonymous | AuthDecision::Failed(_) => None,
        }
    }
}

/// Runs the authenticator. A panic inside it is reported like any other failure.
pub async fn authenticate<A: Authenticator>(
    authenticator: &A,
    req: &GuardRequest,
) -> AuthDecision<A::User> {
    let result = AssertUnwindSafe(authenticator.authenticate(req))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(AuthenticationError::Panicked(panic_message(&*panic))));

    match result {
        Ok(Some(user)) => {
            debug!("caller authenticated");
            AuthDecision::Authenticated(user)
        }
        Ok(None) => {
            debug!("caller is anonymous");
            AuthDecision::Anonymous
        }
        Err(err) => {
            warn!(error = %err, "authentication failed, continuing as unauthenticated");
            AuthDecision::Failed(err)
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
