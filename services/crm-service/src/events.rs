//! Customer lifecycle event publishing.

use event_bus::{topics, EventProducer, ProducerError};
use serde_json::json;
use uuid::Uuid;

use crate::models::Customer;

pub struct CustomerEventPublisher {
    producer: EventProducer,
}

impl CustomerEventPublisher {
    pub fn new(producer: EventProducer) -> Self {
        Self { producer }
    }

    /// Publish `crm.customer.created`, keyed by the customer id. Downstream
    /// consumers (audit, notifications, geocoding) all fan out from this.
    pub async fn customer_created(&self, customer: &Customer) -> Result<(), ProducerError> {
        let payload = json!({
            "customer_id": customer.id.to_string(),
            "name": customer.name,
            "email": customer.email,
            "address": customer.full_address(),
            "tenant_id": customer.created_by_tenant.to_string(),
            "visibility_list": stringify(&customer.visible_to),
        });

        self.producer
            .publish(topics::CUSTOMER_CREATED, &customer.id.to_string(), &payload)
            .await
    }

    /// Publish `crm.customer.updated`, keyed by the customer id.
    pub async fn customer_updated(&self, customer: &Customer) -> Result<(), ProducerError> {
        let payload = json!({
            "customer_id": customer.id.to_string(),
            "name": customer.name,
            "email": customer.email,
            "tenant_id": customer.created_by_tenant.to_string(),
            "visibility_list": stringify(&customer.visible_to),
        });

        self.producer
            .publish(topics::CUSTOMER_UPDATED, &customer.id.to_string(), &payload)
            .await
    }
}

fn stringify(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(Uuid::to_string).collect()
}
