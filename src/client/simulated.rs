use std::time::Duration;

use async_trait::async_trait;

use super::{ClientError, DeleteOutcome, DeleteResponse, DeletionClient};

/// Dry-run client: reports every post as deleted after a fixed delay and
/// never touches the network.
#[derive(Debug, Clone)]
pub struct SimulatedClient {
    delay: Duration,
}

impl SimulatedClient {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl DeletionClient for SimulatedClient {
    async fn delete(&self, id: &str) -> Result<DeleteResponse, ClientError> {
        tokio::time::sleep(self.delay).await;
        tracing::debug!(id, "Simulated deletion");
        Ok(DeleteResponse::new(DeleteOutcome::Deleted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_simulated_delete_waits_then_succeeds() {
        let client = SimulatedClient::new(Duration::from_millis(500));
        let started = tokio::time::Instant::now();
        let response = client.delete("42").await.unwrap();
        assert_eq!(response.outcome, DeleteOutcome::Deleted);
        assert!(started.elapsed() >= Duration::from_millis(500));
    }
}
