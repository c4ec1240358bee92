use crate::{Event, EventEnvelope};

/// A projection builds a read model from a stream of enveloped events.
///
/// Read models are disposable: the store's per-product aggregates are the
/// source of truth, projections are views derived from their events (for
/// example the ordered list of purchased products shown by the UI).
///
/// ## Idempotency
///
/// Applying the same envelope twice must produce the same read model. The
/// [`ProjectionRunner`](crate::ProjectionRunner) additionally skips envelopes
/// whose per-product sequence number was already seen.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the projection, updating the read model.
    ///
    /// Events irrelevant to this projection are ignored.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
