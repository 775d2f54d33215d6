use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use banter_core::Message;
use banter_directory::ProfileDirectory;

use crate::client::{ClientHandle, Delivery, RegistryKey};

/// Everything the hub reacts to. Joins and dispatches travel the same
/// queue: one serialized consumer is what makes "a message dispatched
/// after a registration reaches that registrant" actually hold.
pub enum HubEvent {
    Join(ClientHandle),
    Dispatch(Message),
}

/// Cloneable submission side of the hub's event queue. Sends are async
/// and lossless; the bounded queue applies backpressure instead of
/// dropping events under load.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    pub async fn register(&self, client: ClientHandle) {
        if self.tx.send(HubEvent::Join(client)).await.is_err() {
            tracing::warn!("hub is gone, dropping registration");
        }
    }

    pub async fn dispatch(&self, message: Message) {
        if self.tx.send(HubEvent::Dispatch(message)).await.is_err() {
            tracing::warn!("hub is gone, dropping message");
        }
    }
}

/// The single coordinator owning the live-client registry.
///
/// Nothing else reads or writes the registry; sessions talk to it through
/// `HubHandle` events and hear back through their send queues.
pub struct Hub {
    registry: HashMap<RegistryKey, ClientHandle>,
    directory: Arc<dyn ProfileDirectory>,
}

impl Hub {
    /// Spawn the hub task. The returned handle is the only way in.
    pub fn spawn(
        directory: Arc<dyn ProfileDirectory>,
        queue_capacity: usize,
    ) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let hub = Hub {
            registry: HashMap::new(),
            directory,
        };
        let task = tokio::spawn(hub.run(rx));
        (HubHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<HubEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                HubEvent::Join(client) => self.handle_join(client),
                HubEvent::Dispatch(message) => self.handle_dispatch(message),
            }
        }
        tracing::info!("hub event queue closed");
    }

    fn handle_join(&mut self, client: ClientHandle) {
        tracing::info!(key = %client.key, "client joined");

        // Resolution happens off the hub loop and must not gate the join;
        // failure just leaves the profile cell empty.
        if !client.uid.is_empty() {
            let directory = Arc::clone(&self.directory);
            let cell = client.profile_cell();
            let uid = client.uid.clone();
            tokio::spawn(async move {
                match directory.lookup(std::slice::from_ref(&uid)).await {
                    Ok(records) => {
                        if let Some(record) = records.into_iter().find(|r| r.uid == uid) {
                            cell.write().replace(record.into_profile());
                        }
                    }
                    Err(e) => {
                        tracing::warn!(uid, error = %e, "profile resolution failed");
                    }
                }
            });
        }

        // Insert replaces any stale entry for the same subject.
        self.registry.insert(client.key.clone(), client);
    }

    fn handle_dispatch(&mut self, mut message: Message) {
        // Attach the sender's display fields if its entry has resolved.
        if !message.uid.is_empty() {
            if let Some(sender) = self
                .registry
                .get(&RegistryKey::Subject(message.uid.clone()))
            {
                if let Some(profile) = sender.profile() {
                    message.login = profile.login;
                    message.avatar = profile.avatar;
                }
            }
        }

        let frame = match serde_json::to_string(&message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "unserializable message dropped");
                return;
            }
        };

        // Fan out, marking dead entries; removal happens after the pass so
        // the map is never mutated mid-iteration.
        let mut dead = Vec::new();
        for (key, client) in &self.registry {
            if !client.is_connected() {
                dead.push(key.clone());
                continue;
            }
            match client.try_deliver(frame.clone()) {
                Delivery::Sent => {}
                Delivery::QueueFull => {
                    tracing::warn!(key = %key, "send queue full, dropping delivery");
                }
                Delivery::Gone => dead.push(key.clone()),
            }
        }
        for key in dead {
            self.registry.remove(&key);
            tracing::info!(key = %key, "client evicted");
        }
    }

    #[cfg(test)]
    fn contains(&self, key: &RegistryKey) -> bool {
        self.registry.contains_key(key)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use banter_directory::MockDirectory;
    use tokio::sync::mpsc::Receiver;

    fn test_hub() -> (Hub, Arc<MockDirectory>) {
        let directory = Arc::new(MockDirectory::new());
        let hub = Hub {
            registry: HashMap::new(),
            directory: Arc::clone(&directory) as Arc<dyn ProfileDirectory>,
        };
        (hub, directory)
    }

    fn join(hub: &mut Hub, uid: &str, queue: usize) -> (ClientHandle, Receiver<String>) {
        let (handle, rx) = ClientHandle::new(uid, queue);
        hub.handle_join(handle.clone());
        (handle, rx)
    }

    async fn settle() {
        // Let spawned resolution tasks run.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn dispatch_reaches_every_live_client() {
        let (mut hub, _) = test_hub();
        let (_a, mut rx_a) = join(&mut hub, "", 8);
        let (_b, mut rx_b) = join(&mut hub, "", 8);
        let (_c, mut rx_c) = join(&mut hub, "u3", 8);

        hub.handle_dispatch(Message::inbound("", "hello"));

        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            let frame = rx.try_recv().unwrap();
            assert!(frame.contains("\"text\":\"hello\""));
        }
    }

    #[tokio::test]
    async fn sender_receives_its_own_echo() {
        let (mut hub, _) = test_hub();
        let (_a, mut rx_a) = join(&mut hub, "u1", 8);

        hub.handle_dispatch(Message::inbound("u1", "echo me"));

        assert!(rx_a.try_recv().unwrap().contains("echo me"));
    }

    #[tokio::test]
    async fn disconnected_client_is_evicted_and_skipped() {
        let (mut hub, _) = test_hub();
        let (a, _rx_a) = join(&mut hub, "u1", 8);
        let (_b, mut rx_b) = join(&mut hub, "u2", 8);

        a.mark_disconnected();
        hub.handle_dispatch(Message::inbound("", "first"));

        // Gone before the next dispatch is processed.
        assert!(!hub.contains(&RegistryKey::Subject("u1".into())));
        assert_eq!(hub.len(), 1);
        assert!(rx_b.try_recv().unwrap().contains("first"));
    }

    #[tokio::test]
    async fn dropped_queue_is_evicted_during_dispatch() {
        let (mut hub, _) = test_hub();
        let (_a, rx_a) = join(&mut hub, "u1", 8);
        drop(rx_a);
        let (_b, mut rx_b) = join(&mut hub, "u2", 8);

        hub.handle_dispatch(Message::inbound("", "one"));
        assert!(!hub.contains(&RegistryKey::Subject("u1".into())));

        // A second dispatch still reaches the survivor; no crash, no dupes.
        hub.handle_dispatch(Message::inbound("", "two"));
        assert!(rx_b.try_recv().unwrap().contains("one"));
        assert!(rx_b.try_recv().unwrap().contains("two"));
        assert_eq!(hub.len(), 1);
    }

    #[tokio::test]
    async fn same_subject_rejoin_replaces_the_old_connection() {
        let (mut hub, _) = test_hub();
        let (_old, mut rx_old) = join(&mut hub, "u1", 8);
        let (_new, mut rx_new) = join(&mut hub, "u1", 8);
        assert_eq!(hub.len(), 1);

        hub.handle_dispatch(Message::inbound("", "after rejoin"));

        assert!(rx_new.try_recv().unwrap().contains("after rejoin"));
        assert!(rx_old.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_queue_drops_that_delivery_only() {
        let (mut hub, _) = test_hub();
        let (_slow, _rx_slow) = join(&mut hub, "slow", 1);
        let (_ok, mut rx_ok) = join(&mut hub, "ok", 8);

        hub.handle_dispatch(Message::inbound("", "one"));
        hub.handle_dispatch(Message::inbound("", "two"));

        // The slow client's queue overflowed on "two" but it stays
        // registered; the healthy client got both.
        assert_eq!(hub.len(), 2);
        assert!(rx_ok.try_recv().unwrap().contains("one"));
        assert!(rx_ok.try_recv().unwrap().contains("two"));
    }

    #[tokio::test]
    async fn resolved_profile_enriches_later_messages() {
        let (mut hub, directory) = test_hub();
        directory.insert("u1", "Bob", "bob.png");

        let (_b, mut rx_b) = join(&mut hub, "u1", 8);
        settle().await;

        hub.handle_dispatch(Message::inbound("u1", "yo"));

        let frame = rx_b.try_recv().unwrap();
        assert!(frame.contains("\"login\":\"Bob\""));
        assert!(frame.contains("\"avatar\":\"bob.png\""));
    }

    #[tokio::test]
    async fn anonymous_messages_skip_enrichment() {
        let (mut hub, directory) = test_hub();
        directory.insert("u1", "Bob", "bob.png");
        let (_a, mut rx) = join(&mut hub, "u1", 8);
        settle().await;

        hub.handle_dispatch(Message::inbound("", "anon says hi"));

        let frame = rx.try_recv().unwrap();
        assert!(!frame.contains("login"));
        assert!(!frame.contains("avatar"));
    }

    #[tokio::test]
    async fn failed_resolution_degrades_to_blank_fields() {
        let (mut hub, directory) = test_hub();
        directory.set_failing(true);

        let (_b, mut rx) = join(&mut hub, "u1", 8);
        settle().await;

        hub.handle_dispatch(Message::inbound("u1", "still here"));

        let frame = rx.try_recv().unwrap();
        assert!(frame.contains("still here"));
        assert!(!frame.contains("login"));
    }

    #[tokio::test]
    async fn unresolvable_subject_stays_blank() {
        let (mut hub, _directory) = test_hub();

        let (_b, mut rx) = join(&mut hub, "ghost", 8);
        settle().await;

        hub.handle_dispatch(Message::inbound("ghost", "boo"));
        assert!(!rx.try_recv().unwrap().contains("login"));
    }

    #[tokio::test]
    async fn anonymous_and_named_clients_exchange_messages() {
        let directory = Arc::new(MockDirectory::new());
        directory.insert("u1", "Bob", "");
        let (hub, _task) =
            Hub::spawn(Arc::clone(&directory) as Arc<dyn ProfileDirectory>, 64);

        let (a, mut rx_a) = ClientHandle::new("", 8);
        let (b, mut rx_b) = ClientHandle::new("u1", 8);
        hub.register(a).await;
        hub.register(b).await;
        settle().await;

        hub.dispatch(Message::inbound("", "hi")).await;
        settle().await;

        let to_b = rx_b.try_recv().unwrap();
        assert!(to_b.contains("\"text\":\"hi\""));
        assert!(!to_b.contains("login"));
        rx_a.try_recv().unwrap(); // A hears its own echo

        hub.dispatch(Message::inbound("u1", "yo")).await;
        settle().await;

        let to_a = rx_a.try_recv().unwrap();
        assert!(to_a.contains("\"text\":\"yo\""));
        assert!(to_a.contains("\"login\":\"Bob\""));
    }

    #[tokio::test]
    async fn registration_then_dispatch_is_ordered() {
        let directory = Arc::new(MockDirectory::new());
        let (hub, _task) = Hub::spawn(directory as Arc<dyn ProfileDirectory>, 64);

        let (late, mut rx_late) = ClientHandle::new("late", 8);
        hub.register(late).await;
        hub.dispatch(Message::inbound("", "right after join")).await;
        settle().await;

        // Joined before the dispatch was submitted, so it must be reached.
        assert!(rx_late.try_recv().unwrap().contains("right after join"));
    }
}
