pub mod add;
pub mod collection;
pub mod common;
pub mod delete;
pub mod edit;
pub mod list;
pub mod share;
pub mod sync;
