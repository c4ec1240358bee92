//! Projection runner: ordered, de-duplicated application of envelopes.
//!
//! Tracks the last applied sequence number per product stream and refuses to
//! apply an envelope that would move a stream backwards.

use std::collections::HashMap;

use thiserror::Error;

use storefront_core::ProductId;

use crate::{EventEnvelope, Projection};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    /// The envelope was already applied (same or older sequence number).
    #[error("duplicate envelope for {product_id} (last={last}, found={found})")]
    Duplicate {
        product_id: ProductId,
        last: u64,
        found: u64,
    },

    /// The envelope skips ahead of the next expected sequence number.
    #[error("gap in stream for {product_id} (last={last}, found={found})")]
    Gap {
        product_id: ProductId,
        last: u64,
        found: u64,
    },
}

/// Runs envelopes through a projection and tracks per-product progress.
#[derive(Debug)]
pub struct ProjectionRunner<P>
where
    P: Projection,
{
    projection: P,
    cursors: HashMap<ProductId, u64>,
}

impl<P> ProjectionRunner<P>
where
    P: Projection,
{
    pub fn new(projection: P) -> Self {
        Self {
            projection,
            cursors: HashMap::new(),
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn into_projection(self) -> P {
        self.projection
    }

    /// Last applied sequence number for a product stream (0 if none).
    pub fn cursor(&self, product_id: &ProductId) -> u64 {
        self.cursors.get(product_id).copied().unwrap_or(0)
    }

    /// Apply a single envelope, enforcing gap-free monotonic sequencing.
    pub fn apply(&mut self, envelope: &EventEnvelope<P::Ev>) -> Result<(), ProjectionError> {
        let product_id = envelope.product_id();
        let found = envelope.sequence_number();
        let last = self.cursor(product_id);

        if found <= last {
            return Err(ProjectionError::Duplicate {
                product_id: product_id.clone(),
                last,
                found,
            });
        }
        if found != last + 1 {
            return Err(ProjectionError::Gap {
                product_id: product_id.clone(),
                last,
                found,
            });
        }

        self.projection.apply(envelope);
        self.cursors.insert(product_id.clone(), found);
        Ok(())
    }

    /// Apply many envelopes in order.
    pub fn run<'a>(
        &mut self,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Result<(), ProjectionError>
    where
        P::Ev: 'a,
    {
        for env in envelopes {
            self.apply(env)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::Event;

    #[derive(Debug, Clone)]
    struct Tick;

    impl Event for Tick {
        fn event_type(&self) -> &'static str {
            "test.tick"
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            DateTime::<Utc>::UNIX_EPOCH
        }
    }

    #[derive(Debug, Default)]
    struct Counter {
        seen: Vec<(ProductId, u64)>,
    }

    impl Projection for Counter {
        type Ev = Tick;

        fn apply(&mut self, envelope: &EventEnvelope<Tick>) {
            self.seen
                .push((envelope.product_id().clone(), envelope.sequence_number()));
        }
    }

    fn env(product: &str, seq: u64) -> EventEnvelope<Tick> {
        EventEnvelope::new(Uuid::now_v7(), ProductId::new(product), seq, Tick)
    }

    #[test]
    fn streams_are_tracked_independently() {
        let mut runner = ProjectionRunner::new(Counter::default());
        runner
            .run(&[env("a", 1), env("b", 1), env("a", 2)])
            .unwrap();

        assert_eq!(runner.cursor(&ProductId::new("a")), 2);
        assert_eq!(runner.cursor(&ProductId::new("b")), 1);
        assert_eq!(runner.projection().seen.len(), 3);
    }

    #[test]
    fn duplicates_and_gaps_are_rejected() {
        let mut runner = ProjectionRunner::new(Counter::default());
        runner.apply(&env("a", 1)).unwrap();

        assert!(matches!(
            runner.apply(&env("a", 1)),
            Err(ProjectionError::Duplicate { last: 1, found: 1, .. })
        ));
        assert!(matches!(
            runner.apply(&env("a", 3)),
            Err(ProjectionError::Gap { last: 1, found: 3, .. })
        ));
        assert_eq!(runner.into_projection().seen.len(), 1);
    }
}
