//! Persistence boundary consumed by [`sync`](crate::sync) and
//! [`polling`](crate::polling) (§6).
//!
//! The core never assumes a schema beyond upserting contacts/channels/
//! messages by stable id and reading/writing `lastSyncTimestamp`. Uses the
//! same boxed-future pattern as [`Transport`](crate::transport::Transport)
//! so the store stays object-safe (`Box<dyn PersistenceStore>`), since
//! async fns in traits aren't dyn-compatible without it.

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::types::{Channel, Contact, ContactMessage};

/// Application-supplied storage for synchronized state.
///
/// Implementors decide the schema; the core only upserts by stable id and
/// tracks a single `lastSyncTimestamp` watermark.
pub trait PersistenceStore: Send + Sync {
    /// Inserts or updates a contact by its public key.
    fn upsert_contact(&self, contact: Contact) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Inserts or updates a channel by its index.
    fn upsert_channel(&self, index: u8, channel: Channel) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Inserts or updates a received message by a caller-assigned stable id.
    fn upsert_message(
        &self,
        id: String,
        message: ContactMessage,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Reads the last successful contact-sync watermark.
    fn last_sync_timestamp(&self) -> Pin<Box<dyn Future<Output = Result<u32>> + Send + '_>>;

    /// Persists a new contact-sync watermark.
    fn set_last_sync_timestamp(&self, timestamp: u32) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// An in-memory [`PersistenceStore`], useful for tests and as a starting
/// point for applications that haven't wired real storage yet.
#[derive(Default)]
pub struct InMemoryStore {
    inner: tokio::sync::Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    contacts: std::collections::HashMap<crate::types::PublicKey, Contact>,
    channels: std::collections::HashMap<u8, Channel>,
    messages: std::collections::HashMap<String, ContactMessage>,
    last_sync_timestamp: u32,
}

impl InMemoryStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceStore for InMemoryStore {
    fn upsert_contact(&self, contact: Contact) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.inner.lock().await.contacts.insert(contact.public_key.clone(), contact);
            Ok(())
        })
    }

    fn upsert_channel(&self, index: u8, channel: Channel) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.inner.lock().await.channels.insert(index, channel);
            Ok(())
        })
    }

    fn upsert_message(
        &self,
        id: String,
        message: ContactMessage,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.inner.lock().await.messages.insert(id, message);
            Ok(())
        })
    }

    fn last_sync_timestamp(&self) -> Pin<Box<dyn Future<Output = Result<u32>> + Send + '_>> {
        Box::pin(async move { Ok(self.inner.lock().await.last_sync_timestamp) })
    }

    fn set_last_sync_timestamp(&self, timestamp: u32) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.inner.lock().await.last_sync_timestamp = timestamp;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContactFlags, ContactType, PublicKey};
    use bytes::Bytes;

    fn test_contact() -> Contact {
        Contact {
            public_key: PublicKey::from_bytes(&[1u8; 32]),
            device_type: ContactType::Node,
            flags: ContactFlags::NONE,
            out_path_len: -1,
            out_path: Bytes::new(),
            name: "Alice".into(),
            last_advert: 0,
            latitude: None,
            longitude: None,
            last_modified: 0,
        }
    }

    #[tokio::test]
    async fn test_in_memory_store_round_trips_sync_timestamp() {
        let store = InMemoryStore::new();
        assert_eq!(store.last_sync_timestamp().await.unwrap(), 0);
        store.set_last_sync_timestamp(42).await.unwrap();
        assert_eq!(store.last_sync_timestamp().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_in_memory_store_upserts_contact() {
        let store = InMemoryStore::new();
        let contact = test_contact();
        let key = contact.public_key.clone();
        store.upsert_contact(contact).await.unwrap();
        assert!(store.inner.lock().await.contacts.contains_key(&key));
    }
}
