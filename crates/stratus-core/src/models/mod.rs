pub mod format;
pub mod metadata;
pub mod snapshot;
pub mod task;

pub use format::{DecodedString, StringFormat};
pub use metadata::{FullMetadata, SettableMetadata};
pub use snapshot::TaskSnapshot;
pub use task::{TaskKind, TaskState};
