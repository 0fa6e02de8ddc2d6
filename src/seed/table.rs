use crate::protocol::Endpoint;
use tokio::sync::Mutex;

/// Registered peers as known by one seed, in registration order.
///
/// Seeds never synchronize with each other, so this is only ever one seed's
/// opinion. Entries leave only through an explicit dead-node report.
#[derive(Default)]
pub struct SeedMembershipTable {
    members: Mutex<Vec<Endpoint>>,
}

impl SeedMembershipTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current members other than `registrant`, i.e. the candidate list a
    /// registering peer gets back.
    pub async fn snapshot_for(&self, registrant: &Endpoint) -> Vec<Endpoint> {
        self.members
            .lock()
            .await
            .iter()
            .filter(|member| *member != registrant)
            .cloned()
            .collect()
    }

    /// Appends `endpoint`; returns `false` if it was already registered.
    pub async fn append(&self, endpoint: Endpoint) -> bool {
        let mut members = self.members.lock().await;
        if members.contains(&endpoint) {
            return false;
        }
        members.push(endpoint);
        true
    }

    /// Removes `endpoint` if present; returns whether anything was removed.
    pub async fn remove(&self, endpoint: &Endpoint) -> bool {
        let mut members = self.members.lock().await;
        let before = members.len();
        members.retain(|member| member != endpoint);
        members.len() != before
    }

    pub async fn members(&self) -> Vec<Endpoint> {
        self.members.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }
}
