//! animix-blend-core: a blend-graph animation evaluator.
//!
//! A tree of blend nodes (clips, cross-fades, one-shots, additive mixes,
//! time controls, nested containers) is evaluated once per frame against an
//! animation player. The walk propagates per-track blend weights top-down
//! and collects weighted clip contributions; the tree then accumulates them
//! per target track and commits blended poses, values and playback commands
//! to weakly-cached scene objects supplied by the host.
//!
//! The crate is scene-agnostic: hosts implement [`binding::SceneResolver`],
//! [`binding::AnimationPlayer`] and [`binding::AnimationTarget`].

pub mod binding;
mod cache;
pub mod data;
pub mod error;
pub mod kinds;
pub mod node;
pub mod params;
pub mod sampling;
pub mod scope;
pub mod state;
pub mod stored;
pub mod tree;

pub use binding::{
    AnimationPlayer, AnimationTarget, AudioGainTarget, DeferredCall, NestedPlayerTarget,
    ResolvedTarget, SceneResolver, SkeletonTarget,
};
pub use data::{
    Animation, AnimationKey, AudioKey, BezierKey, MethodKey, Track, TrackData, TrackKind,
    TransformKey, UpdateMode, ValueKey,
};
pub use error::{GraphError, ParameterError};
pub use kinds::{MixMode, NodeKind, OUTPUT_NAME};
pub use node::{BlendNode, FilterAction, NodeHandle, PassContext};
pub use scope::ScopedPath;
pub use tree::AnimationTree;

pub use animix_api_core::{TrackPath, Value, ValueKind, Xform};
