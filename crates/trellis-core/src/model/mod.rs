pub mod item;
pub mod item_id;

pub use item::{
    ContentPatch, ItemPatch, Kind, NewWorkItem, RecordDefect, WorkItem, WorkItemRecord,
};
