//! Output collaborator contracts
//!
//! The engine never talks to a messaging transport directly. Everything it
//! shows to people goes through a [`Notifier`] (stage announcements, the
//! clock title) or a [`DisplaySurface`] (the shared status board).

use std::{future::Future, pin::Pin};

use tracing::debug;

use crate::error::UiError;

/// Opaque identifier of a sent message or created surface
pub type MessageHandle = u64;

/// Boxed future returned by output collaborators
pub type UiFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, UiError>> + Send + 'a>>;

/// Sends stage notifications for a single timer.
pub trait Notifier: Send + Sync {
    fn send<'a>(&'a self, text: &'a str) -> UiFut<'a, MessageHandle>;

    /// Attach the presence-acknowledgement affordance to a sent message
    fn add_acknowledgement(&self, handle: MessageHandle) -> UiFut<'_, ()>;

    /// Rename the clock display
    fn edit_display_title<'a>(&'a self, title: &'a str) -> UiFut<'a, ()>;
}

/// An editable status message shared by the timers of one channel.
pub trait DisplaySurface: Send + Sync {
    /// May fail with [`UiError::PermissionDenied`]
    fn create<'a>(&'a self, content: &'a str) -> UiFut<'a, MessageHandle>;

    fn edit<'a>(&'a self, handle: MessageHandle, content: &'a str) -> UiFut<'a, ()>;

    fn pin(&self, handle: MessageHandle) -> UiFut<'_, ()>;

    /// Plain-text notice, used when the surface itself cannot be created
    fn send_notice<'a>(&'a self, text: &'a str) -> UiFut<'a, MessageHandle>;
}

/// Run an output operation whose failure must never reach the caller.
pub async fn best_effort<T, F>(what: &str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, UiError>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Ignoring failed {}: {}", what, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn best_effort_swallows_failures() {
        let ok = best_effort("send", async { Ok::<_, UiError>(3) }).await;
        assert_eq!(ok, Some(3));

        let failed = best_effort("pin", async {
            Err::<(), _>(UiError::Failed("boom".to_string()))
        })
        .await;
        assert_eq!(failed, None);
    }
}
