use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A customer record. `visible_to` lists every tenant allowed to observe it;
/// `created_by_tenant` is always a member.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,

    pub address_line1: String,
    pub address_line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub geocoded_at: Option<DateTime<Utc>>,

    pub visible_to: Vec<Uuid>,
    pub created_by_tenant: Uuid,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// The address as one geocodable line, skipping empty parts.
    pub fn full_address(&self) -> String {
        let mut parts = vec![self.address_line1.as_str()];
        if !self.address_line2.is_empty() {
            parts.push(self.address_line2.as_str());
        }
        parts.extend([
            self.city.as_str(),
            self.state.as_str(),
            self.postal_code.as_str(),
            self.country.as_str(),
        ]);
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(address_line2: &str) -> Customer {
        Customer {
            id: Uuid::new_v4(),
            name: "Acme Pty Ltd".to_string(),
            email: "ops@acme.test".to_string(),
            phone: String::new(),
            address_line1: "1 Macquarie St".to_string(),
            address_line2: address_line2.to_string(),
            city: "Sydney".to_string(),
            state: "NSW".to_string(),
            postal_code: "2000".to_string(),
            country: "Australia".to_string(),
            latitude: None,
            longitude: None,
            geocoded_at: None,
            visible_to: vec![],
            created_by_tenant: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn full_address_joins_populated_parts() {
        assert_eq!(
            customer("Level 3").full_address(),
            "1 Macquarie St, Level 3, Sydney, NSW, 2000, Australia"
        );
    }

    #[test]
    fn full_address_skips_empty_second_line() {
        assert_eq!(
            customer("").full_address(),
            "1 Macquarie St, Sydney, NSW, 2000, Australia"
        );
    }
}
