//! Change tracking and plan compilation.
//!
//! Every mutation on a [`Database`](crate::Database) reports to the
//! [`ChangeTracker`]. On flush, the [`PlanCompiler`] reads the tracker,
//! rolls changes up per table with the [`ChangeAggregator`], orders
//! renames through the [`RenameResolver`] and emits dialect-neutral
//! statements.

mod aggregator;
mod compiler;
mod rename;
mod summary;
mod tracker;

pub use aggregator::{
    ChangeAggregator, ColumnDelta, ColumnState, ConstraintDelta, IndexTransition, TableChanges,
};
pub use compiler::PlanCompiler;
pub use rename::{PendingRename, RenameResolver, RenameStep};
pub use summary::{ChangeSummary, ObjectChanges, ObjectSummary, PropertyChange};
pub use tracker::{ChangeTracker, Descriptor, TrackedValue};
