//! In-process backends for every store seam.
//!
//! Used by the unit tests and by the server's `--in-memory` mode. They honour
//! the same uniqueness rules as the Postgres schema and report conflicts with
//! the same constraint names.

mod ai;
mod auth;
mod blogs;
mod images;
mod mail;
mod oauth;

pub use self::ai::CannedGenerator;
pub use self::auth::{MemoryRoleDirectory, MemoryTokenLedger, MemoryUserDirectory};
pub use self::blogs::{MemoryBlogStore, MemoryCommentStore};
pub use self::images::MemoryImageStore;
pub use self::mail::{MemoryMailer, SentMail};
pub use self::oauth::{MemoryOAuthLinkStore, StaticOAuthProvider};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
