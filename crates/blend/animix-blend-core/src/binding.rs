//! Host-side collaborator interfaces.
//!
//! The evaluator never owns scene objects. The host hands in a
//! `SceneResolver` each frame; track targets resolved through it are held
//! weakly by the track cache so a freed object invalidates its entries
//! instead of keeping them alive.

use crate::data::Animation;
use animix_api_core::{TrackPath, Value, Xform};
use std::rc::Rc;

/// Source of animation clips, addressed by name.
pub trait AnimationPlayer {
    fn has_animation(&self, name: &str) -> bool {
        self.animation(name).is_some()
    }
    fn animation(&self, name: &str) -> Option<Rc<Animation>>;
    fn animation_list(&self) -> Vec<String>;
    /// Base path track paths resolve against.
    fn root_path(&self) -> TrackPath;
    /// Bumped whenever the player's own caches are rebuilt; the tree drops
    /// its track cache when it observes a new value.
    fn cache_epoch(&self) -> u64;
}

/// Scene access for one `advance` call.
pub trait SceneResolver {
    fn resolve_player(&self, path: &TrackPath) -> Option<Rc<dyn AnimationPlayer>>;
    fn has_node(&self, path: &TrackPath) -> bool;
    /// Resolve a track path against a base path to a target object plus the
    /// property subpath left over after the object was found.
    fn resolve_target(&self, base: &TrackPath, path: &TrackPath) -> Option<ResolvedTarget>;
}

pub struct ResolvedTarget {
    pub object: Rc<dyn AnimationTarget>,
    pub subpath: Vec<String>,
}

/// An animated scene object. Capability accessors return `Some` when the
/// object supports the richer interface; the cache probes them once at
/// build time.
pub trait AnimationTarget {
    fn set_indexed(&self, subpath: &[String], value: Value);
    fn get_indexed(&self, subpath: &[String]) -> Option<Value>;
    fn set_transform(&self, xform: Xform);
    fn call(&self, method: &str, args: &[Value]);

    fn as_skeleton(&self) -> Option<&dyn SkeletonTarget> {
        None
    }
    fn as_audio_gain(&self) -> Option<&dyn AudioGainTarget> {
        None
    }
    fn as_nested_player(&self) -> Option<&dyn NestedPlayerTarget> {
        None
    }
}

pub trait SkeletonTarget {
    fn find_bone(&self, name: &str) -> Option<usize>;
    fn set_bone_pose(&self, bone: usize, xform: Xform);
    fn bone_rest(&self, bone: usize) -> Xform;
}

/// Playback gain control for audio emitters, replacing per-frame duck-typed
/// method probing with a capability checked when the cache entry is built.
pub trait AudioGainTarget {
    fn set_gain_db(&self, db: f32);
    fn set_clip(&self, clip: &str);
    fn play_from(&self, offset: f32);
    fn stop(&self);
}

/// A nested animation player driven by animation tracks.
pub trait NestedPlayerTarget {
    fn has_animation(&self, name: &str) -> bool;
    fn animation_length(&self, name: &str) -> f32;
    fn animation_looped(&self, name: &str) -> bool;
    fn is_playing(&self) -> bool;
    fn play(&self, name: &str);
    /// Bind an animation without starting playback.
    fn set_assigned(&self, name: &str);
    /// `update` applies the seeked pose immediately.
    fn seek(&self, position: f32, update: bool);
    fn stop(&self);
}

/// A method-track invocation, drained by the driver after `advance` and
/// dispatched outside the evaluator (targets must be free to mutate the
/// scene graph).
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredCall {
    pub path: TrackPath,
    pub method: String,
    pub args: Vec<Value>,
}
