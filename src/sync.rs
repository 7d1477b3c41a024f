//! Three-phase sync coordinator (§4.10): contacts, then channels, then
//! pending messages, run in that strict order on every successful connect.
//!
//! This module drives all three phases through [`MeshCoreSession`], persists the
//! results through a [`PersistenceStore`], and brackets the whole run with
//! `SyncStarted`/`SyncEnded` events so a UI can show a "syncing…" indicator.

use std::sync::Arc;

use crate::error::Result;
use crate::event::{EventDispatcher, MeshEvent, SyncPhase};
use crate::persistence::PersistenceStore;
use crate::session::MeshCoreSession;
use crate::transport::Transport;
use crate::types::Channel;

/// Default number of channel slots swept during the channels phase.
pub const DEFAULT_MAX_CHANNELS: u8 = 8;

/// Drives the contacts → channels → messages sync sequence.
pub struct SyncCoordinator<T> {
    session: Arc<MeshCoreSession<T>>,
    store: Arc<dyn PersistenceStore>,
    dispatcher: EventDispatcher,
    max_channels: u8,
}

impl<T: Transport> SyncCoordinator<T> {
    /// Creates a coordinator over the given session and store.
    #[must_use]
    pub fn new(session: Arc<MeshCoreSession<T>>, store: Arc<dyn PersistenceStore>, dispatcher: EventDispatcher) -> Self {
        Self {
            session,
            store,
            dispatcher,
            max_channels: DEFAULT_MAX_CHANNELS,
        }
    }

    /// Overrides how many channel slots the channels phase sweeps.
    #[must_use]
    pub const fn with_max_channels(mut self, max_channels: u8) -> Self {
        self.max_channels = max_channels;
        self
    }

    /// Runs all three phases in sequence. A failure in one phase is logged
    /// and does not prevent the next phase from running (§4.10).
    pub async fn run(&self) {
        self.dispatcher.dispatch(MeshEvent::SyncStarted);

        self.dispatcher.dispatch(MeshEvent::SyncPhaseChanged(SyncPhase::Contacts));
        if let Err(err) = self.sync_contacts().await {
            tracing::warn!("contacts sync phase failed: {err}");
        }

        self.dispatcher.dispatch(MeshEvent::SyncPhaseChanged(SyncPhase::Channels));
        if let Err(err) = self.sync_channels().await {
            tracing::warn!("channels sync phase failed: {err}");
        }

        self.dispatcher.dispatch(MeshEvent::SyncPhaseChanged(SyncPhase::Messages));
        if let Err(err) = self.sync_messages().await {
            tracing::warn!("messages sync phase failed: {err}");
        }

        self.dispatcher.dispatch(MeshEvent::SyncEnded);
    }

    /// Requests the contact list since the last watermark, upserting each
    /// `contact` push as it arrives and persisting the new watermark once
    /// `contactsComplete` (`ContactListEnd`) closes the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the RPC fails.
    pub async fn sync_contacts(&self) -> Result<()> {
        let since = self.store.last_sync_timestamp().await?;
        let mut pushes = self.session.events();
        let request = self.session.get_contacts(since);
        tokio::pin!(request);

        loop {
            tokio::select! {
                biased;
                result = &mut request => {
                    if let MeshEvent::ContactListEnd { last_modified } = result? {
                        self.store.set_last_sync_timestamp(last_modified).await?;
                    }
                    return Ok(());
                }
                Some(event) = pushes.recv() => {
                    if let MeshEvent::Contact(contact) = event {
                        self.store.upsert_contact(*contact).await?;
                    }
                }
            }
        }
    }

    /// Sweeps channel slots `0..max_channels`, upserting each returned
    /// `ChannelInfo`. A NUL-named channel is persisted with its name
    /// replaced by `"disabled"` per §4.10.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails; a single slot's RPC failure is
    /// logged and skipped so the sweep continues.
    pub async fn sync_channels(&self) -> Result<()> {
        for index in 0..self.max_channels {
            match self.session.get_channel(index).await {
                Ok(MeshEvent::ChannelInfo(channel)) => {
                    let channel = if channel.name.is_empty() {
                        Channel {
                            name: "disabled".to_string(),
                            ..*channel
                        }
                    } else {
                        *channel
                    };
                    self.store.upsert_channel(index, channel).await?;
                }
                Ok(_) => {}
                Err(err) => tracing::debug!("get_channel({index}) failed: {err}"),
            }
        }
        Ok(())
    }

    /// Drains pending messages via repeated `getMessage` calls until
    /// `noMessageAvailable` (`NoMoreMessages`). Private messages are
    /// persisted; channel messages are left to broadcast subscribers since
    /// the store has no channel-message slot (§6).
    ///
    /// Also used by the polling service to re-enter this phase on
    /// `MSG_WAITING` pushes.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the RPC fails.
    pub async fn sync_messages(&self) -> Result<()> {
        loop {
            match self.session.get_message().await? {
                MeshEvent::ContactMessage(msg) => {
                    let id = format!("{}:{}", hex::encode(msg.sender_prefix), msg.timestamp);
                    self.store.upsert_message(id, *msg).await?;
                }
                MeshEvent::NoMoreMessages => return Ok(()),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryStore;
    use crate::transport::ConnectionState;
    use bytes::Bytes;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;
    use tokio::sync::Mutex;

    struct MockTransport;

    impl Transport for MockTransport {
        fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
        fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
        fn send(&mut self, _data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
        fn is_connected(&self) -> bool {
            true
        }
        fn connection_state(&self) -> tokio::sync::watch::Receiver<ConnectionState> {
            tokio::sync::watch::channel(ConnectionState::Ready).1
        }
    }

    #[tokio::test]
    async fn test_sync_contacts_persists_pushed_contacts_and_watermark() {
        use crate::types::{Contact, ContactFlags, ContactType, PublicKey};

        let (dispatcher, _rx) = EventDispatcher::new(16);
        let transport = Arc::new(Mutex::new(MockTransport));
        let session = Arc::new(MeshCoreSession::new(transport, dispatcher.clone()).with_timeout(Duration::from_millis(200)));
        let store: Arc<dyn PersistenceStore> = Arc::new(InMemoryStore::new());
        let coordinator = SyncCoordinator::new(session, store.clone(), dispatcher.clone());

        let feeder = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            dispatcher.dispatch(MeshEvent::Contact(Box::new(Contact {
                public_key: PublicKey::from_bytes(&[7u8; 32]),
                device_type: ContactType::Room,
                flags: ContactFlags::NONE,
                out_path_len: -1,
                out_path: Bytes::new(),
                name: "Bob".into(),
                last_advert: 0,
                latitude: None,
                longitude: None,
                last_modified: 0,
            })));
            dispatcher.dispatch(MeshEvent::ContactListEnd { last_modified: 99 });
        });

        coordinator.sync_contacts().await.unwrap();
        feeder.await.unwrap();

        assert_eq!(store.last_sync_timestamp().await.unwrap(), 99);
    }

    #[tokio::test]
    async fn test_sync_messages_stops_on_no_more_messages() {
        let (dispatcher, _rx) = EventDispatcher::new(16);
        let transport = Arc::new(Mutex::new(MockTransport));
        let session = Arc::new(MeshCoreSession::new(transport, dispatcher.clone()).with_timeout(Duration::from_millis(200)));
        let store: Arc<dyn PersistenceStore> = Arc::new(InMemoryStore::new());
        let coordinator = SyncCoordinator::new(session, store, dispatcher.clone());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            dispatcher.dispatch(MeshEvent::NoMoreMessages);
        });

        coordinator.sync_messages().await.unwrap();
    }
}
