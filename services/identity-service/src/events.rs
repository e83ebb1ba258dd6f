//! Tenant lifecycle event publishing.

use event_bus::{topics, EventProducer, ProducerError};
use serde_json::json;

use crate::models::Tenant;

pub struct TenantEventPublisher {
    producer: EventProducer,
}

impl TenantEventPublisher {
    pub fn new(producer: EventProducer) -> Self {
        Self { producer }
    }

    /// Publish `identity.tenant.created`, keyed by the tenant id.
    pub async fn tenant_created(&self, tenant: &Tenant) -> Result<(), ProducerError> {
        let payload = json!({
            "tenant_id": tenant.id.to_string(),
            "name": tenant.name,
            "parent_id": tenant.parent_id.map(|id| id.to_string()),
        });

        self.producer
            .publish(topics::TENANT_CREATED, &tenant.id.to_string(), &payload)
            .await
    }
}
