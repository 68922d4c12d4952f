pub mod catalog;
pub mod extract;
pub mod mime;
pub mod reconcile;
pub mod thumbs;
