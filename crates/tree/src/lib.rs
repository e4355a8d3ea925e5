//! Tree store and reconciliation engine for grouped hierarchical records.
//! 群組化階層紀錄的樹狀儲存與調和引擎。

mod reconcile;
mod slug;

pub mod flush;
pub mod item;
pub mod moves;
pub mod notice;
pub mod session;
pub mod store;

pub use flush::{FlushError, RecordUpdate};
pub use item::{ChangeSet, FieldValue, NodeKey, SourceItem, StructuralField, TreeNode};
pub use moves::{DropEvent, DropPosition};
pub use notice::{NoticeKind, UserNotice};
pub use session::{SessionContext, SessionError, TreeSession};
pub use slug::slugify;
pub use store::{GroupState, TreeError, TreeSettings, TreeStore};
