//! Recording entity and media kind.

pub mod media_kind;
pub mod model;

pub use media_kind::MediaKind;
pub use model::{RecordedState, Recording};
