/// Local state kept consistent with the remote store under optimistic mutation
///
/// A view renders `merge(latest snapshot, pending edits)`. Snapshots arrive
/// through subscriptions and edits through user actions. The queue drops an
/// edit once a snapshot shows it or its write fails, and after a timeout.
mod edit;
mod merge;
mod queue;
mod snapshot;
mod subscription;
mod view_state;

pub use edit::{EditId, EditState, OptimisticEdit};
pub use merge::merge;
pub use queue::OptimisticQueue;
pub use snapshot::Snapshot;
pub use subscription::{Consumer, SubscriptionHandle, SubscriptionManager};
pub use view_state::ViewStateSync;
