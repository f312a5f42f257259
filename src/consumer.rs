//! NATS message consumer for incoming loan applications and bulk uploads

use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Consumer for receiving applications and bulk files from NATS
pub struct ApplicationConsumer {
    client: Client,
    application_subject: String,
    bulk_subject: String,
}

impl ApplicationConsumer {
    /// Create a new application consumer
    pub fn new(client: Client, application_subject: &str, bulk_subject: &str) -> Self {
        Self {
            client,
            application_subject: application_subject.to_string(),
            bulk_subject: bulk_subject.to_string(),
        }
    }

    /// Subscribe to the single-application subject
    pub async fn subscribe_applications(&self) -> Result<Subscriber> {
        let subscriber = self
            .client
            .subscribe(self.application_subject.clone())
            .await?;
        info!(subject = %self.application_subject, "Subscribed to application subject");
        Ok(subscriber)
    }

    /// Subscribe to the bulk upload subject
    pub async fn subscribe_bulk(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.bulk_subject.clone()).await?;
        info!(subject = %self.bulk_subject, "Subscribed to bulk subject");
        Ok(subscriber)
    }

    pub fn application_subject(&self) -> &str {
        &self.application_subject
    }

    pub fn bulk_subject(&self) -> &str {
        &self.bulk_subject
    }
}
