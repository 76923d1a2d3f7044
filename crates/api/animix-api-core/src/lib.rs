//! animix-api-core: engine-agnostic value, path and blend-math types shared
//! by the Animix animation crates and their hosts.

pub mod blend;
pub mod track_path;
pub mod value;

pub use track_path::{PathError, TrackPath};
pub use value::{Value, ValueKind, Xform};
