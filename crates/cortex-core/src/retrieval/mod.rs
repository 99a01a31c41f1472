//! Hybrid retrieval: multi-view vector indexing and tiered similarity search.

mod config;
mod index;
mod tiering;
mod views;

pub use config::RetrievalConfig;
pub use index::{fields, VectorIndex};
pub use tiering::{select_tiered, EntityHit};
pub use views::{description_views, point_id, VIEW_COUNT};
