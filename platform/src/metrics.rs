//! Metric names reported by the platform.
//!
//! The store's own counters live in `convene_runtime::metrics`; these cover
//! admission, ratings, the journal and the analytics boundary. Call
//! [`describe_metrics`] once after installing the recorder.

use ::metrics::describe_counter;

/// Platform metric names.
pub mod names {
    /// Participation requests accepted, labelled by resulting `status`.
    pub const REQUESTS_SUBMITTED: &str = "convene.requests.submitted";
    /// Commands refused by a domain rule, labelled by `category`.
    pub const COMMANDS_REFUSED: &str = "convene.commands.refused";
    /// Requests moderated in bulk, labelled by `decision`.
    pub const REQUESTS_MODERATED: &str = "convene.requests.moderated";
    /// Reaction ledger writes, labelled by `op`.
    pub const REACTIONS_APPLIED: &str = "convene.reactions.applied";
    /// Compilation writes, labelled by `op`.
    pub const COMPILATIONS_CHANGED: &str = "convene.compilations.changed";
    /// View lookups answered with zeros after an analytics failure.
    pub const VIEWS_FALLBACK: &str = "convene.views.fallback";
    /// Hits that could not be delivered to the analytics service.
    pub const HITS_DROPPED: &str = "convene.hits.dropped";
    /// Facts that could not be written to the journal.
    pub const JOURNAL_FAILURES: &str = "convene.journal.failures";
}

/// Register descriptions for every platform metric.
pub fn describe_metrics() {
    describe_counter!(names::REQUESTS_SUBMITTED, "Participation requests accepted");
    describe_counter!(names::COMMANDS_REFUSED, "Commands refused by a domain rule");
    describe_counter!(names::REQUESTS_MODERATED, "Participation requests moderated in bulk");
    describe_counter!(names::REACTIONS_APPLIED, "Reaction ledger writes");
    describe_counter!(names::COMPILATIONS_CHANGED, "Compilations added, updated or deleted");

    describe_counter!(names::VIEWS_FALLBACK, "View lookups that fell back to zero");
    describe_counter!(names::HITS_DROPPED, "Hits the analytics service did not accept");
    describe_counter!(names::JOURNAL_FAILURES, "Facts that could not be journaled");
}
