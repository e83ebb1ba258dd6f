//! Canonical topic names exchanged between services.
//!
//! These names are part of the wire contract and must not change.

/// Published by crm-service when a customer record is created.
pub const CUSTOMER_CREATED: &str = "crm.customer.created";

/// Published by crm-service when a customer record is updated.
pub const CUSTOMER_UPDATED: &str = "crm.customer.updated";

/// Published by identity-service when a tenant is created.
pub const TENANT_CREATED: &str = "identity.tenant.created";

/// Dead-letter sibling for a topic as seen by one consumer group.
pub fn dlq_topic(original_topic: &str, consumer_group: &str) -> String {
    format!("{}.dlq.{}", original_topic, consumer_group)
}
