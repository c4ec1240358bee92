use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storefront_core::ProductId;

/// Envelope for an event, containing stream metadata.
///
/// Every product has its own stream. `sequence_number` starts at 1 and grows by
/// one per event applied to that product, so observers can verify they see a
/// product's transitions in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    product_id: ProductId,

    /// Monotonically increasing position in the product stream.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(event_id: Uuid, product_id: ProductId, sequence_number: u64, payload: E) -> Self {
        Self {
            event_id,
            product_id,
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
