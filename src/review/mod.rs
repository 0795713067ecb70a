//! Access review evaluation and notification
//!
//! Data flows one way: [`source`] -> [`normalize`] -> [`window`] -> per record
//! [`urgency`] -> [`compose`] -> delivery -> [`audit`]. [`pipeline`] wires the stages
//! together and [`summary`] holds the result of a run.

pub mod audit;
pub mod compose;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod source;
pub mod summary;
pub mod urgency;
pub mod window;

pub use pipeline::{Delivery, PipelineOptions, ReviewPipeline};
pub use record::{
    AssignmentKind, DecisionStatus, DispatchOutcome, NotificationKind, ReviewableRecord,
    UrgencyTier,
};
pub use source::{EntityKind, IdentitySource, RawRecord};
pub use summary::{RunOutcome, RunSummary};
