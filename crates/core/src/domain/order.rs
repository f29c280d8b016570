use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::product::ProductId;
use crate::errors::DomainError;
use crate::pricing::Quote;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: String,
    pub shipping_address: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ContactDetails {
    pub fn validate(&self) -> Result<(), DomainError> {
        let required = [
            ("company_name", &self.company_name),
            ("contact_name", &self.contact_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("shipping_address", &self.shipping_address),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::InvariantViolation(format!("contact {field} is required")));
            }
        }

        if !self.email.contains('@') {
            return Err(DomainError::InvariantViolation(format!(
                "contact email `{}` is not an address",
                self.email
            )));
        }

        Ok(())
    }
}

/// A quote frozen at submission time. Later rate or formula changes never
/// reach a stored order; `content_hash` lets the store detect tampering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: OrderId,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub quote: Quote,
    pub contact: ContactDetails,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub content_hash: String,
}

impl OrderSnapshot {
    pub fn freeze(
        quote: Quote,
        product_id: Option<ProductId>,
        contact: ContactDetails,
    ) -> Result<Self, DomainError> {
        contact.validate()?;
        let content_hash = content_hash(&quote, product_id.as_ref())?;

        Ok(Self {
            id: OrderId::generate(),
            product_id,
            quote,
            contact,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            content_hash,
        })
    }

    pub fn verify_integrity(&self) -> bool {
        content_hash(&self.quote, self.product_id.as_ref())
            .map(|hash| hash == self.content_hash)
            .unwrap_or(false)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self.status, next),
            (OrderStatus::Pending, OrderStatus::Processing)
                | (OrderStatus::Processing, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Processing, OrderStatus::Cancelled)
        )
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidOrderTransition { from: self.status, to: next })
    }
}

fn content_hash(quote: &Quote, product_id: Option<&ProductId>) -> Result<String, DomainError> {
    let payload = serde_json::to_vec(&(quote, product_id)).map_err(|error| {
        DomainError::InvariantViolation(format!("quote could not be serialized: {error}"))
    })?;
    Ok(sha256_hex(&payload))
}

fn sha256_hex(payload: &[u8]) -> String {
    Sha256::digest(payload).iter().map(|byte| format!("{byte:02x}")).collect()
}
