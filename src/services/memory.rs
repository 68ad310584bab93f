//! In-memory output collaborators
//!
//! These back the bundled server and the tests. They log what a chat
//! transport would display and keep the most recent entries for
//! inspection.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Mutex,
    },
};
use tracing::{debug, info};

use super::output::{DisplaySurface, MessageHandle, Notifier, UiFut};
use crate::error::UiError;

/// Entries kept per history buffer; older entries are dropped
pub const HISTORY_LIMIT: usize = 256;

fn lock_err<T>(_: T) -> UiError {
    UiError::Failed("output state lock poisoned".to_string())
}

fn record<T>(history: &mut VecDeque<T>, entry: T) {
    if history.len() == HISTORY_LIMIT {
        history.pop_front();
    }
    history.push_back(entry);
}

/// Notifier that records messages instead of delivering them
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    next_handle: AtomicU64,
    messages: Mutex<VecDeque<(MessageHandle, String)>>,
    acknowledged: Mutex<VecDeque<MessageHandle>>,
    titles: Mutex<VecDeque<String>>,
    fail_sends: AtomicBool,
    fail_acknowledgements: AtomicBool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_acknowledgements(&self, fail: bool) {
        self.fail_acknowledgements.store(fail, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.iter().map(|(_, text)| text.clone()).collect())
            .unwrap_or_default()
    }

    pub fn acknowledged(&self) -> Vec<MessageHandle> {
        self.acknowledged
            .lock()
            .map(|a| a.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.titles
            .lock()
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Notifier for MemoryNotifier {
    fn send<'a>(&'a self, text: &'a str) -> UiFut<'a, MessageHandle> {
        Box::pin(async move {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(UiError::Failed("send rejected".to_string()));
            }
            let handle = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
            info!("notify #{}: {}", handle, text.replace('\n', " | "));
            record(
                &mut *self.messages.lock().map_err(lock_err)?,
                (handle, text.to_string()),
            );
            Ok(handle)
        })
    }

    fn add_acknowledgement(&self, handle: MessageHandle) -> UiFut<'_, ()> {
        Box::pin(async move {
            if self.fail_acknowledgements.load(Ordering::SeqCst) {
                return Err(UiError::Failed("reaction rejected".to_string()));
            }
            record(&mut *self.acknowledged.lock().map_err(lock_err)?, handle);
            Ok(())
        })
    }

    fn edit_display_title<'a>(&'a self, title: &'a str) -> UiFut<'a, ()> {
        Box::pin(async move {
            debug!("display title: {}", title);
            record(&mut *self.titles.lock().map_err(lock_err)?, title.to_string());
            Ok(())
        })
    }
}

/// Display surface that keeps every status board in memory
#[derive(Debug, Default)]
pub struct MemoryBoard {
    next_handle: AtomicU64,
    surfaces: Mutex<BTreeMap<MessageHandle, String>>,
    pinned: Mutex<Vec<MessageHandle>>,
    notices: Mutex<VecDeque<String>>,
    notices_sent: AtomicU64,
    deny_create: AtomicBool,
    fail_edits: AtomicBool,
}

impl MemoryBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse surface creation as if the bot lacked permission
    pub fn deny_create(&self, deny: bool) {
        self.deny_create.store(deny, Ordering::SeqCst);
    }

    pub fn fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.lock().map(|s| s.len()).unwrap_or_default()
    }

    pub fn content(&self, handle: MessageHandle) -> Option<String> {
        self.surfaces.lock().ok().and_then(|s| s.get(&handle).cloned())
    }

    pub fn pinned(&self) -> Vec<MessageHandle> {
        self.pinned.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices
            .lock()
            .map(|n| n.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl DisplaySurface for MemoryBoard {
    fn create<'a>(&'a self, content: &'a str) -> UiFut<'a, MessageHandle> {
        Box::pin(async move {
            if self.deny_create.load(Ordering::SeqCst) {
                return Err(UiError::PermissionDenied);
            }
            let handle = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
            self.surfaces
                .lock()
                .map_err(lock_err)?
                .insert(handle, content.to_string());
            Ok(handle)
        })
    }

    fn edit<'a>(&'a self, handle: MessageHandle, content: &'a str) -> UiFut<'a, ()> {
        Box::pin(async move {
            if self.fail_edits.load(Ordering::SeqCst) {
                return Err(UiError::Failed("edit rejected".to_string()));
            }
            let mut surfaces = self.surfaces.lock().map_err(lock_err)?;
            match surfaces.get_mut(&handle) {
                Some(existing) => {
                    *existing = content.to_string();
                    Ok(())
                }
                None => Err(UiError::Failed(format!("unknown surface {}", handle))),
            }
        })
    }

    fn pin(&self, handle: MessageHandle) -> UiFut<'_, ()> {
        Box::pin(async move {
            self.pinned.lock().map_err(lock_err)?.push(handle);
            Ok(())
        })
    }

    fn send_notice<'a>(&'a self, text: &'a str) -> UiFut<'a, MessageHandle> {
        Box::pin(async move {
            info!("notice: {}", text);
            record(&mut *self.notices.lock().map_err(lock_err)?, text.to_string());
            Ok(self.notices_sent.fetch_add(1, Ordering::SeqCst) + 1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notifier_history_is_bounded() {
        let notifier = MemoryNotifier::new();
        for i in 0..HISTORY_LIMIT + 40 {
            let handle = notifier.send(&format!("message {}", i)).await.unwrap();
            notifier.add_acknowledgement(handle).await.unwrap();
            notifier.edit_display_title(&format!("title {}", i)).await.unwrap();
        }

        let messages = notifier.messages();
        assert_eq!(messages.len(), HISTORY_LIMIT);
        assert_eq!(messages[0], "message 40");
        assert_eq!(
            messages.last().map(String::as_str),
            Some(format!("message {}", HISTORY_LIMIT + 39).as_str())
        );
        assert_eq!(notifier.acknowledged().len(), HISTORY_LIMIT);
        assert_eq!(notifier.titles().len(), HISTORY_LIMIT);
    }

    #[tokio::test]
    async fn notice_handles_keep_increasing_past_the_limit() {
        let board = MemoryBoard::new();
        let mut last = 0;
        for _ in 0..HISTORY_LIMIT + 5 {
            last = board.send_notice("hello").await.unwrap();
        }
        assert_eq!(last, (HISTORY_LIMIT + 5) as MessageHandle);
        assert_eq!(board.notices().len(), HISTORY_LIMIT);
    }
}
