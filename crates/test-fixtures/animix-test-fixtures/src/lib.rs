//! Shared test fixtures: an in-memory scene with mock players and targets,
//! plus small builders for animation clips.
//!
//! Targets record everything the evaluator does to them so tests can assert
//! on committed values, issued playback commands and gain changes.

use animix_api_core::{TrackPath, Value, Xform};
use animix_blend_core::binding::{
    AnimationPlayer, AnimationTarget, AudioGainTarget, NestedPlayerTarget, ResolvedTarget,
    SceneResolver, SkeletonTarget,
};
use animix_blend_core::data::{
    Animation, AnimationKey, AudioKey, BezierKey, MethodKey, Track, TrackData, TransformKey,
    UpdateMode, ValueKey,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

// ---- player ----

#[derive(Default)]
pub struct MockPlayer {
    animations: RefCell<HashMap<String, Rc<Animation>>>,
    root: RefCell<String>,
    epoch: Cell<u64>,
}

impl MockPlayer {
    pub fn new(root: &str) -> Rc<MockPlayer> {
        let player = MockPlayer::default();
        *player.root.borrow_mut() = root.to_string();
        Rc::new(player)
    }

    pub fn add_animation(&self, animation: Animation) {
        self.animations
            .borrow_mut()
            .insert(animation.name.clone(), Rc::new(animation));
    }

    pub fn remove_animation(&self, name: &str) {
        self.animations.borrow_mut().remove(name);
    }

    /// Signals the tree that the player's contents changed.
    pub fn bump_epoch(&self) {
        self.epoch.set(self.epoch.get() + 1);
    }
}

impl AnimationPlayer for MockPlayer {
    fn animation(&self, name: &str) -> Option<Rc<Animation>> {
        self.animations.borrow().get(name).cloned()
    }

    fn animation_list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.animations.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    fn root_path(&self) -> TrackPath {
        TrackPath::parse(&self.root.borrow()).expect("fixture root path")
    }

    fn cache_epoch(&self) -> u64 {
        self.epoch.get()
    }
}

// ---- plain property target ----

#[derive(Default)]
pub struct MockTarget {
    values: RefCell<HashMap<String, Vec<Value>>>,
    transforms: RefCell<Vec<Xform>>,
    calls: RefCell<Vec<(String, Vec<Value>)>>,
}

impl MockTarget {
    pub fn new() -> Rc<MockTarget> {
        Rc::new(MockTarget::default())
    }

    /// Last value written to a property subpath.
    pub fn value(&self, subpath: &str) -> Option<Value> {
        self.values
            .borrow()
            .get(subpath)
            .and_then(|v| v.last().cloned())
    }

    /// Every value ever written to a property subpath, in order.
    pub fn writes(&self, subpath: &str) -> Vec<Value> {
        self.values.borrow().get(subpath).cloned().unwrap_or_default()
    }

    pub fn last_transform(&self) -> Option<Xform> {
        self.transforms.borrow().last().copied()
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.borrow().clone()
    }
}

fn subpath_key(subpath: &[String]) -> String {
    subpath.join(".")
}

impl AnimationTarget for MockTarget {
    fn set_indexed(&self, subpath: &[String], value: Value) {
        self.values
            .borrow_mut()
            .entry(subpath_key(subpath))
            .or_default()
            .push(value);
    }

    fn get_indexed(&self, subpath: &[String]) -> Option<Value> {
        self.value(&subpath_key(subpath))
    }

    fn set_transform(&self, xform: Xform) {
        self.transforms.borrow_mut().push(xform);
    }

    fn call(&self, method: &str, args: &[Value]) {
        self.calls
            .borrow_mut()
            .push((method.to_string(), args.to_vec()));
    }
}

// ---- skeleton ----

pub struct MockSkeleton {
    bones: Vec<(String, Xform)>,
    poses: RefCell<HashMap<usize, Xform>>,
}

impl MockSkeleton {
    pub fn new(bones: &[&str]) -> Rc<MockSkeleton> {
        Rc::new(MockSkeleton {
            bones: bones
                .iter()
                .map(|b| ((*b).to_string(), Xform::IDENTITY))
                .collect(),
            poses: RefCell::new(HashMap::new()),
        })
    }

    pub fn with_rests(bones: Vec<(String, Xform)>) -> Rc<MockSkeleton> {
        Rc::new(MockSkeleton {
            bones,
            poses: RefCell::new(HashMap::new()),
        })
    }

    pub fn pose(&self, bone: usize) -> Option<Xform> {
        self.poses.borrow().get(&bone).copied()
    }
}

impl AnimationTarget for MockSkeleton {
    fn set_indexed(&self, _subpath: &[String], _value: Value) {}
    fn get_indexed(&self, _subpath: &[String]) -> Option<Value> {
        None
    }
    fn set_transform(&self, _xform: Xform) {}
    fn call(&self, _method: &str, _args: &[Value]) {}

    fn as_skeleton(&self) -> Option<&dyn SkeletonTarget> {
        Some(self)
    }
}

impl SkeletonTarget for MockSkeleton {
    fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|(b, _)| b == name)
    }

    fn set_bone_pose(&self, bone: usize, xform: Xform) {
        self.poses.borrow_mut().insert(bone, xform);
    }

    fn bone_rest(&self, bone: usize) -> Xform {
        self.bones
            .get(bone)
            .map(|(_, rest)| *rest)
            .unwrap_or(Xform::IDENTITY)
    }
}

// ---- audio emitter ----

#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    Clip(String),
    Play(f32),
    Stop,
}

#[derive(Default)]
pub struct MockAudio {
    events: RefCell<Vec<AudioEvent>>,
    gain_db: Cell<f32>,
}

impl MockAudio {
    pub fn new() -> Rc<MockAudio> {
        Rc::new(MockAudio::default())
    }

    pub fn events(&self) -> Vec<AudioEvent> {
        self.events.borrow().clone()
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db.get()
    }

    pub fn stop_count(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, AudioEvent::Stop))
            .count()
    }
}

impl AnimationTarget for MockAudio {
    fn set_indexed(&self, _subpath: &[String], _value: Value) {}
    fn get_indexed(&self, _subpath: &[String]) -> Option<Value> {
        None
    }
    fn set_transform(&self, _xform: Xform) {}
    fn call(&self, _method: &str, _args: &[Value]) {}

    fn as_audio_gain(&self) -> Option<&dyn AudioGainTarget> {
        Some(self)
    }
}

impl AudioGainTarget for MockAudio {
    fn set_gain_db(&self, db: f32) {
        self.gain_db.set(db);
    }

    fn set_clip(&self, clip: &str) {
        self.events
            .borrow_mut()
            .push(AudioEvent::Clip(clip.to_string()));
    }

    fn play_from(&self, offset: f32) {
        self.events.borrow_mut().push(AudioEvent::Play(offset));
    }

    fn stop(&self) {
        self.events.borrow_mut().push(AudioEvent::Stop);
    }
}

// ---- nested animation player ----

#[derive(Debug, Clone, PartialEq)]
pub enum NestedEvent {
    Play(String),
    Assigned(String),
    Seek(f32, bool),
    Stop,
}

#[derive(Default)]
pub struct MockNestedPlayer {
    animations: HashMap<String, (f32, bool)>,
    events: RefCell<Vec<NestedEvent>>,
    playing: Cell<bool>,
}

impl MockNestedPlayer {
    pub fn new(animations: &[(&str, f32, bool)]) -> Rc<MockNestedPlayer> {
        Rc::new(MockNestedPlayer {
            animations: animations
                .iter()
                .map(|(n, len, looped)| ((*n).to_string(), (*len, *looped)))
                .collect(),
            events: RefCell::new(Vec::new()),
            playing: Cell::new(false),
        })
    }

    pub fn events(&self) -> Vec<NestedEvent> {
        self.events.borrow().clone()
    }
}

impl AnimationTarget for MockNestedPlayer {
    fn set_indexed(&self, _subpath: &[String], _value: Value) {}
    fn get_indexed(&self, _subpath: &[String]) -> Option<Value> {
        None
    }
    fn set_transform(&self, _xform: Xform) {}
    fn call(&self, _method: &str, _args: &[Value]) {}

    fn as_nested_player(&self) -> Option<&dyn NestedPlayerTarget> {
        Some(self)
    }
}

impl NestedPlayerTarget for MockNestedPlayer {
    fn has_animation(&self, name: &str) -> bool {
        self.animations.contains_key(name)
    }

    fn animation_length(&self, name: &str) -> f32 {
        self.animations.get(name).map(|(l, _)| *l).unwrap_or(0.0)
    }

    fn animation_looped(&self, name: &str) -> bool {
        self.animations.get(name).map(|(_, l)| *l).unwrap_or(false)
    }

    fn is_playing(&self) -> bool {
        self.playing.get()
    }

    fn play(&self, name: &str) {
        self.playing.set(true);
        self.events
            .borrow_mut()
            .push(NestedEvent::Play(name.to_string()));
    }

    fn set_assigned(&self, name: &str) {
        self.events
            .borrow_mut()
            .push(NestedEvent::Assigned(name.to_string()));
    }

    fn seek(&self, position: f32, update: bool) {
        self.events
            .borrow_mut()
            .push(NestedEvent::Seek(position, update));
    }

    fn stop(&self) {
        self.playing.set(false);
        self.events.borrow_mut().push(NestedEvent::Stop);
    }
}

// ---- scene ----

/// Flat scene registry: targets are keyed by the node part of their track
/// path; the subpath handed back is the path's property fields.
#[derive(Default)]
pub struct MockScene {
    players: HashMap<String, Rc<dyn AnimationPlayer>>,
    targets: RefCell<HashMap<String, Rc<dyn AnimationTarget>>>,
}

impl MockScene {
    pub fn new() -> MockScene {
        MockScene::default()
    }

    pub fn add_player(&mut self, path: &str, player: Rc<dyn AnimationPlayer>) {
        self.players.insert(path.to_string(), player);
    }

    pub fn add_target(&self, path: &str, target: Rc<dyn AnimationTarget>) {
        self.targets
            .borrow_mut()
            .insert(path.to_string(), target);
    }

    pub fn remove_target(&self, path: &str) {
        self.targets.borrow_mut().remove(path);
    }
}

impl SceneResolver for MockScene {
    fn resolve_player(&self, path: &TrackPath) -> Option<Rc<dyn AnimationPlayer>> {
        self.players.get(&path.to_string()).cloned()
    }

    fn has_node(&self, path: &TrackPath) -> bool {
        let key = path.node_segments().join("/");
        self.targets.borrow().contains_key(&key) || self.players.contains_key(&key)
    }

    fn resolve_target(&self, _base: &TrackPath, path: &TrackPath) -> Option<ResolvedTarget> {
        let key = path.node_segments().join("/");
        let object = self.targets.borrow().get(&key).cloned()?;
        Some(ResolvedTarget {
            object,
            subpath: path.fields().to_vec(),
        })
    }
}

// ---- clip builders ----

pub fn path(s: &str) -> TrackPath {
    TrackPath::parse(s).expect("fixture track path")
}

pub fn clip(name: &str, length: f32, looped: bool, tracks: Vec<Track>) -> Animation {
    Animation {
        name: name.to_string(),
        length,
        looped,
        tracks,
    }
}

pub fn float_track(p: &str, keys: &[(f32, f32)]) -> Track {
    Track {
        path: path(p),
        data: TrackData::Value {
            update: UpdateMode::Continuous,
            keys: keys
                .iter()
                .map(|(t, v)| ValueKey {
                    time: *t,
                    value: Value::Float(*v),
                })
                .collect(),
        },
    }
}

pub fn discrete_track(p: &str, keys: Vec<(f32, Value)>) -> Track {
    Track {
        path: path(p),
        data: TrackData::Value {
            update: UpdateMode::Discrete,
            keys: keys
                .into_iter()
                .map(|(t, v)| ValueKey { time: t, value: v })
                .collect(),
        },
    }
}

pub fn transform_track(p: &str, keys: Vec<TransformKey>) -> Track {
    Track {
        path: path(p),
        data: TrackData::Transform { keys },
    }
}

pub fn transform_key(time: f32, pos: [f32; 3], rot: [f32; 4], scale: [f32; 3]) -> TransformKey {
    TransformKey {
        time,
        pos,
        rot,
        scale,
    }
}

pub fn method_track(p: &str, keys: Vec<(f32, &str, Vec<Value>)>) -> Track {
    Track {
        path: path(p),
        data: TrackData::Method {
            keys: keys
                .into_iter()
                .map(|(t, m, args)| MethodKey {
                    time: t,
                    method: m.to_string(),
                    args,
                })
                .collect(),
        },
    }
}

pub fn bezier_track(p: &str, keys: Vec<BezierKey>) -> Track {
    Track {
        path: path(p),
        data: TrackData::Bezier { keys },
    }
}

pub fn audio_track(p: &str, keys: Vec<AudioKey>) -> Track {
    Track {
        path: path(p),
        data: TrackData::Audio { keys },
    }
}

pub fn animation_track(p: &str, keys: Vec<(f32, Option<&str>)>) -> Track {
    Track {
        path: path(p),
        data: TrackData::Animation {
            keys: keys
                .into_iter()
                .map(|(t, a)| AnimationKey {
                    time: t,
                    animation: a.map(str::to_string),
                })
                .collect(),
        },
    }
}
