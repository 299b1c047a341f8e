pub mod ownership;
pub mod service;
pub mod store;

pub use service::{PostDraft, PostPatch, PostService};
