//! Animation clip data model: a named clip with a fixed length, a loop flag
//! and a list of typed tracks. Clips are immutable once loaded; the evaluator
//! shares them behind `Rc`.

use animix_api_core::{TrackPath, Value};
use serde::{Deserialize, Serialize};

/// Track kind discriminant, used for cache-entry compatibility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Transform,
    Value,
    Method,
    Bezier,
    Audio,
    Animation,
}

/// How a value track applies its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    #[default]
    Continuous,
    Discrete,
    Trigger,
    Capture,
}

impl UpdateMode {
    /// Discrete-family modes replay keys instead of interpolating.
    pub fn is_discrete(self) -> bool {
        !matches!(self, UpdateMode::Continuous)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformKey {
    pub time: f32,
    pub pos: [f32; 3],
    pub rot: [f32; 4],
    pub scale: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueKey {
    pub time: f32,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodKey {
    pub time: f32,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Bezier keys carry handles relative to the key point: x is a time offset,
/// y a value offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BezierKey {
    pub time: f32,
    pub value: f32,
    pub in_handle: [f32; 2],
    pub out_handle: [f32; 2],
}

/// `clip: None` is a stop key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioKey {
    pub time: f32,
    pub clip: Option<String>,
    #[serde(default)]
    pub length: f32,
    #[serde(default)]
    pub start_offset: f32,
    #[serde(default)]
    pub end_offset: f32,
}

/// `animation: None` is a stop key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationKey {
    pub time: f32,
    pub animation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackData {
    Transform {
        keys: Vec<TransformKey>,
    },
    Value {
        #[serde(default)]
        update: UpdateMode,
        keys: Vec<ValueKey>,
    },
    Method {
        keys: Vec<MethodKey>,
    },
    Bezier {
        keys: Vec<BezierKey>,
    },
    Audio {
        keys: Vec<AudioKey>,
    },
    Animation {
        keys: Vec<AnimationKey>,
    },
}

impl TrackData {
    pub fn kind(&self) -> TrackKind {
        match self {
            TrackData::Transform { .. } => TrackKind::Transform,
            TrackData::Value { .. } => TrackKind::Value,
            TrackData::Method { .. } => TrackKind::Method,
            TrackData::Bezier { .. } => TrackKind::Bezier,
            TrackData::Audio { .. } => TrackKind::Audio,
            TrackData::Animation { .. } => TrackKind::Animation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub path: TrackPath,
    #[serde(flatten)]
    pub data: TrackData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    pub name: String,
    pub length: f32,
    #[serde(default)]
    pub looped: bool,
    pub tracks: Vec<Track>,
}

impl Animation {
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}
