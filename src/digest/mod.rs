//! Digest core: conversation aggregation, entry generation, and rendering.

pub mod aggregate;
pub mod entry;
pub mod link;
pub mod render;
pub mod window;

pub use aggregate::{Conversation, aggregate_conversations};
pub use entry::{DigestEntry, generate_entry};
pub use link::LinkMode;
pub use render::{digest_subject, render_digest};
pub use window::{TimeRange, WindowBounds};
