//! Track cache entries: one per unique track path across every clip the
//! bound player exposes. Targets are held weakly; a freed object makes its
//! entry stale and the next cache rebuild evicts it.

use crate::binding::AnimationTarget;
use crate::data::TrackKind;
use animix_api_core::blend::QUAT_IDENTITY;
use animix_api_core::Value;
use std::rc::Weak;

pub(crate) struct TrackEntry {
    pub target: Weak<dyn AnimationTarget>,
    /// Property subpath left over after target resolution.
    pub subpath: Vec<String>,
    /// Mark-and-sweep generation marker.
    pub setup_pass: u64,
    /// Last evaluation pass that accumulated into this entry; the commit
    /// pass only writes entries touched in the current pass.
    pub process_pass: u64,
    pub root_motion: bool,
    pub state: TrackState,
}

pub(crate) enum TrackState {
    Transform {
        bone: Option<usize>,
        pos: [f32; 3],
        rot: [f32; 4],
        rot_blend_accum: f32,
        scale: [f32; 3],
    },
    Value {
        value: Value,
    },
    Method,
    Bezier {
        value: f32,
    },
    Audio {
        playing: bool,
        start: f32,
        len: f32,
    },
    Animation {
        playing: bool,
    },
}

impl TrackState {
    pub fn transform(bone: Option<usize>) -> TrackState {
        TrackState::Transform {
            bone,
            pos: [0.0; 3],
            rot: QUAT_IDENTITY,
            rot_blend_accum: 0.0,
            scale: [1.0; 3],
        }
    }
}

impl TrackEntry {
    pub fn kind(&self) -> TrackKind {
        match self.state {
            TrackState::Transform { .. } => TrackKind::Transform,
            TrackState::Value { .. } => TrackKind::Value,
            TrackState::Method => TrackKind::Method,
            TrackState::Bezier { .. } => TrackKind::Bezier,
            TrackState::Audio { .. } => TrackKind::Audio,
            TrackState::Animation { .. } => TrackKind::Animation,
        }
    }

    pub fn target_alive(&self) -> bool {
        self.target.strong_count() > 0
    }
}
