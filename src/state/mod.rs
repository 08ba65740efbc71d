pub mod diff;
pub mod snapshot;
pub mod store;

pub use diff::{diff_state, FileChange, Modification, StateDiff, StatementChange};
pub use snapshot::{DeclarativeRecord, MigrationState, Snapshot, StatementOrigin, TrackedFile};
pub use store::{StateFile, StateStore};
