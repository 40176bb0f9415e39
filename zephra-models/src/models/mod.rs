pub mod sync_item;
pub mod push;
pub mod version;
pub mod alert;
pub mod dashboard;
