//! The animation tree evaluator.
//!
//! `advance(host, delta)` runs one evaluation pass: bind the player, rebuild
//! the track cache if stale, walk the blend graph collecting weighted
//! animation contributions, accumulate them per track, then commit the
//! blended results to the cached targets.
//!
//! Configuration failures (no root, unresolvable player) deactivate the
//! tree and are reported through `config_error()`. In-pass failures mark
//! the pass invalid; its results are discarded and the tree stays active.

use crate::binding::{AnimationPlayer, DeferredCall, SceneResolver};
use crate::cache::{TrackEntry, TrackState};
use crate::data::{TrackData, TrackKind};
use crate::node::{self, NodeHandle, PassContext};
use crate::params::{Activity, ActivityMap, ParamStore};
use crate::sampling::{find_key, key_indices_in_range, transform_interpolate, value_interpolate};
use crate::scope::ScopedPath;
use crate::state::EvalState;
use animix_api_core::blend::{
    fposmod, lerp_f32, lerp_vec3, linear_to_db, quat_conjugate, quat_mul, normalize_quat,
    slerp_quat, CMP_EPSILON, QUAT_IDENTITY,
};
use animix_api_core::{TrackPath, Value, Xform};
use hashbrown::{HashMap, HashSet};
use std::rc::{Rc, Weak};

#[derive(Default)]
pub struct AnimationTree {
    root: Option<NodeHandle>,
    player_path: Option<TrackPath>,
    active: bool,
    started: bool,
    process_pass: u64,
    setup_pass: u64,
    cache_valid: bool,
    last_player: Option<Weak<dyn AnimationPlayer>>,
    last_epoch: u64,
    state: EvalState,
    params: ParamStore,
    properties_dirty: bool,
    input_activity: ActivityMap,
    track_cache: HashMap<TrackPath, TrackEntry>,
    playing: HashSet<TrackPath>,
    root_motion_track: Option<TrackPath>,
    root_motion_transform: Xform,
    deferred: Vec<DeferredCall>,
    config_error: Option<String>,
}

impl AnimationTree {
    pub fn new() -> AnimationTree {
        AnimationTree {
            properties_dirty: true,
            ..Default::default()
        }
    }

    // ---- configuration ----

    pub fn set_root(&mut self, root: Option<NodeHandle>) {
        self.root = root;
        self.properties_dirty = true;
    }

    pub fn root(&self) -> Option<NodeHandle> {
        self.root.clone()
    }

    pub fn set_player_path(&mut self, path: Option<TrackPath>) {
        self.player_path = path;
        self.last_player = None;
        self.cache_valid = false;
    }

    pub fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        self.started = active;
        if !active {
            self.stop_playing_caches();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_root_motion_track(&mut self, track: Option<TrackPath>) {
        self.root_motion_track = track;
    }

    pub fn root_motion_transform(&self) -> Xform {
        self.root_motion_transform
    }

    /// Call after editing the node graph so parameters and activity slots
    /// are re-declared before the next pass.
    pub fn mark_tree_changed(&mut self) {
        self.properties_dirty = true;
    }

    // ---- diagnostics ----

    pub fn is_state_invalid(&self) -> bool {
        !self.state.valid
    }

    pub fn invalid_state_reason(&self) -> &str {
        self.state.invalid_reasons()
    }

    pub fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    pub fn last_process_pass(&self) -> u64 {
        self.process_pass
    }

    /// Blend weight last fed through an input of the node at `node_path`
    /// (e.g. `"parameters/Transition"`). Zero once the record goes stale.
    pub fn connection_activity(&self, node_path: &str, input: usize) -> f32 {
        let key;
        let lookup: &str = if node_path.ends_with('/') {
            node_path
        } else {
            key = format!("{node_path}/");
            &key
        };
        match self.input_activity.get(lookup).and_then(|v| v.get(input)) {
            Some(a) if a.last_pass == self.process_pass => a.activity,
            _ => 0.0,
        }
    }

    /// Method-track invocations queued by committed passes, in track order
    /// within each pass. The driver dispatches them after `advance`.
    pub fn take_deferred_calls(&mut self) -> Vec<DeferredCall> {
        std::mem::take(&mut self.deferred)
    }

    // ---- property bridge ----

    pub fn set_property(&mut self, path: &str, value: Value) -> bool {
        self.ensure_properties();
        self.params.set(path, value)
    }

    pub fn get_property(&mut self, path: &str) -> Option<Value> {
        self.ensure_properties();
        self.params.get(path)
    }

    pub fn properties(&mut self) -> Vec<(String, Value)> {
        self.ensure_properties();
        self.params.properties()
    }

    fn ensure_properties(&mut self) {
        if !self.properties_dirty {
            return;
        }
        self.properties_dirty = false;
        self.params.clear_declarations();
        self.input_activity.clear();
        if let Some(root) = self.root.clone() {
            declare_node(&mut self.params, &mut self.input_activity, &root, ScopedPath::root());
        }
    }

    // ---- evaluation ----

    pub fn advance(&mut self, host: &dyn SceneResolver, delta: f32) {
        if !self.active {
            return;
        }
        self.process_graph(host, delta);
    }

    fn config_fail(&mut self, reason: String) {
        log::error!("AnimationTree: {reason}");
        self.config_error = Some(reason);
        self.set_active(false);
    }

    fn process_graph(&mut self, host: &dyn SceneResolver, delta: f32) {
        self.root_motion_transform = Xform::IDENTITY;

        let Some(root) = self.root.clone() else {
            self.config_fail("no root node set.".to_string());
            return;
        };
        let Some(player_path) = self.player_path.clone() else {
            self.config_fail("no animation player path set.".to_string());
            return;
        };
        let Some(player) = host.resolve_player(&player_path) else {
            self.config_fail(format!("animation player not found: '{player_path}'."));
            return;
        };
        self.config_error = None;

        let current = Rc::downgrade(&player);
        let rebound = match &self.last_player {
            Some(prev) => !prev.ptr_eq(&current),
            None => true,
        };
        if rebound {
            self.last_player = Some(current);
            self.last_epoch = player.cache_epoch();
            self.cache_valid = false;
        } else if player.cache_epoch() != self.last_epoch {
            self.last_epoch = player.cache_epoch();
            self.clear_caches();
        }

        if !self.cache_valid && !self.update_caches(host, &player) {
            return;
        }
        self.ensure_properties();

        self.process_pass += 1;
        self.state.begin_pass(self.process_pass);

        {
            let root_blends = root.borrow().blends_handle();
            let mut blends = root_blends.borrow_mut();
            blends.clear();
            blends.resize(self.state.track_count, 1.0);
        }

        let scope = ScopedPath::root();
        {
            let mut ctx = PassContext {
                state: &mut self.state,
                params: &mut self.params,
                activity: &mut self.input_activity,
                player: &player,
            };
            if self.started {
                // freshly activated: settle the graph with a seek to zero
                node::pre_process(&root, scope.clone(), scope.clone(), &mut ctx, 0.0, true);
                self.started = false;
            }
            node::pre_process(&root, scope.clone(), scope, &mut ctx, delta, false);
        }

        if !self.state.valid {
            log::warn!(
                "AnimationTree: invalid evaluation state:\n{}",
                self.state.invalid_reasons()
            );
            return;
        }

        self.accumulate();
        self.commit();
    }

    fn clear_caches(&mut self) {
        self.stop_playing_caches();
        self.track_cache.clear();
        self.cache_valid = false;
    }

    fn stop_playing_caches(&mut self) {
        let playing: Vec<TrackPath> = self.playing.drain().collect();
        for path in playing {
            let Some(entry) = self.track_cache.get_mut(&path) else {
                continue;
            };
            let Some(target) = entry.target.upgrade() else {
                continue;
            };
            match &mut entry.state {
                TrackState::Audio { playing, .. } => {
                    if *playing {
                        if let Some(audio) = target.as_audio_gain() {
                            audio.stop();
                        }
                        *playing = false;
                    }
                }
                TrackState::Animation { playing } => {
                    if *playing {
                        if let Some(np) = target.as_nested_player() {
                            np.stop();
                        }
                        *playing = false;
                    }
                }
                _ => {}
            }
        }
    }

    /// Mark-and-sweep rebuild of the track cache across every clip the
    /// player exposes. Unresolvable tracks are skipped with a warning;
    /// surviving entries keep their playback state.
    fn update_caches(&mut self, host: &dyn SceneResolver, player: &Rc<dyn AnimationPlayer>) -> bool {
        self.setup_pass += 1;
        let root_path = player.root_path();
        if !host.has_node(&root_path) {
            self.config_fail(format!("player root node not found: '{root_path}'."));
            return false;
        }

        for name in player.animation_list() {
            let Some(anim) = player.animation(&name) else {
                continue;
            };
            for track in &anim.tracks {
                let path = &track.path;
                let kind = track.data.kind();

                if let Some(entry) = self.track_cache.get(path) {
                    if entry.kind() != kind || !entry.target_alive() {
                        self.playing.remove(path);
                        self.track_cache.remove(path);
                    }
                }
                if let Some(entry) = self.track_cache.get_mut(path) {
                    entry.setup_pass = self.setup_pass;
                    continue;
                }

                let Some(resolved) = host.resolve_target(&root_path, path) else {
                    log::warn!(
                        "AnimationTree: animation '{name}': couldn't resolve track '{path}'."
                    );
                    continue;
                };

                let state = match kind {
                    TrackKind::Transform => {
                        if path.fields().len() == 1 {
                            let bone_name = &path.fields()[0];
                            let Some(skeleton) = resolved.object.as_skeleton() else {
                                log::warn!(
                                    "AnimationTree: track '{path}' addresses a bone but the target is not a skeleton."
                                );
                                continue;
                            };
                            let Some(bone) = skeleton.find_bone(bone_name) else {
                                log::warn!("AnimationTree: bone not found: '{path}'.");
                                continue;
                            };
                            TrackState::transform(Some(bone))
                        } else {
                            TrackState::transform(None)
                        }
                    }
                    TrackKind::Value => TrackState::Value {
                        value: Value::Float(0.0),
                    },
                    TrackKind::Method => TrackState::Method,
                    TrackKind::Bezier => TrackState::Bezier { value: 0.0 },
                    TrackKind::Audio => {
                        if resolved.object.as_audio_gain().is_none() {
                            log::warn!(
                                "AnimationTree: audio track '{path}' target has no gain control."
                            );
                            continue;
                        }
                        TrackState::Audio {
                            playing: false,
                            start: 0.0,
                            len: 0.0,
                        }
                    }
                    TrackKind::Animation => {
                        if resolved.object.as_nested_player().is_none() {
                            log::warn!(
                                "AnimationTree: animation track '{path}' target is not an animation player."
                            );
                            continue;
                        }
                        TrackState::Animation { playing: false }
                    }
                };

                self.track_cache.insert(
                    path.clone(),
                    TrackEntry {
                        target: Rc::downgrade(&resolved.object),
                        subpath: resolved.subpath,
                        setup_pass: self.setup_pass,
                        process_pass: 0,
                        root_motion: false,
                        state,
                    },
                );
            }
        }

        let stale: Vec<TrackPath> = self
            .track_cache
            .iter()
            .filter(|(_, e)| e.setup_pass != self.setup_pass)
            .map(|(p, _)| p.clone())
            .collect();
        for path in stale {
            self.playing.remove(&path);
            self.track_cache.remove(&path);
        }

        // dense index map, stable for this cache generation
        self.state.track_map.clear();
        for (i, path) in self.track_cache.keys().enumerate() {
            self.state.track_map.insert(path.clone(), i);
        }
        self.state.track_count = self.track_cache.len();
        self.cache_valid = true;
        true
    }

    /// Fold every contribution collected by the walk into the per-track
    /// cache entries. Discrete semantics (key replay, audio and nested
    /// player commands) apply immediately; continuous results wait for the
    /// commit pass.
    fn accumulate(&mut self) {
        let pass = self.process_pass;
        let contributions = std::mem::take(&mut self.state.contributions);
        let mut key_scratch: Vec<usize> = Vec::new();

        for contrib in &contributions {
            let anim = &contrib.animation;
            let blends = contrib.track_blends.borrow();

            for track in &anim.tracks {
                let path = &track.path;
                let Some(entry) = self.track_cache.get_mut(path) else {
                    continue;
                };
                if entry.kind() != track.data.kind() {
                    continue;
                }
                let Some(&idx) = self.state.track_map.get(path) else {
                    continue;
                };
                entry.root_motion = self.root_motion_track.as_ref() == Some(path);
                let blend = blends.get(idx).copied().unwrap_or(0.0) * contrib.blend;
                if blend < CMP_EPSILON {
                    continue;
                }

                match &track.data {
                    TrackData::Transform { keys } => {
                        let TrackState::Transform {
                            bone: _,
                            pos,
                            rot,
                            rot_blend_accum,
                            scale,
                        } = &mut entry.state
                        else {
                            continue;
                        };
                        if entry.process_pass != pass {
                            entry.process_pass = pass;
                            *pos = [0.0; 3];
                            *rot = QUAT_IDENTITY;
                            *rot_blend_accum = 0.0;
                            *scale = [0.0; 3];
                        }
                        if entry.root_motion {
                            // accumulate deltas over the interval walked
                            // this frame, wrapping across the loop point
                            if contrib.seeked {
                                continue;
                            }
                            let mut prev_time = contrib.time - contrib.delta;
                            if prev_time < 0.0 {
                                prev_time = if anim.looped && anim.length > 0.0 {
                                    fposmod(prev_time, anim.length)
                                } else {
                                    0.0
                                };
                            }
                            if prev_time > contrib.time {
                                let Some(a) = transform_interpolate(keys, prev_time) else {
                                    continue;
                                };
                                let Some(b) = transform_interpolate(keys, anim.length) else {
                                    continue;
                                };
                                accumulate_root_delta(pos, rot, scale, &a, &b, blend);
                                prev_time = 0.0;
                            }
                            let Some(a) = transform_interpolate(keys, prev_time) else {
                                continue;
                            };
                            let Some(b) = transform_interpolate(keys, contrib.time) else {
                                continue;
                            };
                            accumulate_root_delta(pos, rot, scale, &a, &b, blend);
                        } else {
                            let Some((sample_pos, sample_rot, sample_scale)) =
                                transform_interpolate(keys, contrib.time)
                            else {
                                continue;
                            };
                            *pos = lerp_vec3(*pos, sample_pos, blend);
                            if *rot_blend_accum == 0.0 {
                                *rot = sample_rot;
                                *rot_blend_accum = blend;
                            } else {
                                let total = *rot_blend_accum + blend;
                                *rot = slerp_quat(sample_rot, *rot, *rot_blend_accum / total);
                                *rot_blend_accum = total;
                            }
                            *scale = lerp_vec3(*scale, sample_scale, blend);
                        }
                    }

                    TrackData::Value { update, keys } => {
                        if !update.is_discrete() {
                            let TrackState::Value { value } = &mut entry.state else {
                                continue;
                            };
                            let Some(sample) = value_interpolate(keys, contrib.time) else {
                                continue;
                            };
                            if entry.process_pass != pass {
                                entry.process_pass = pass;
                                *value = sample.clone();
                            }
                            *value = Value::interpolate(value, &sample, blend);
                        } else {
                            // discrete: replayed immediately, never blended
                            let Some(target) = entry.target.upgrade() else {
                                continue;
                            };
                            if contrib.seeked {
                                let Some(i) = find_key(keys, contrib.time, |k| k.time) else {
                                    continue;
                                };
                                target.set_indexed(&entry.subpath, keys[i].value.clone());
                            } else {
                                key_indices_in_range(
                                    keys,
                                    |k| k.time,
                                    contrib.time,
                                    contrib.delta,
                                    anim.length,
                                    anim.looped,
                                    &mut key_scratch,
                                );
                                for &i in &key_scratch {
                                    target.set_indexed(&entry.subpath, keys[i].value.clone());
                                }
                            }
                        }
                    }

                    TrackData::Method { keys } => {
                        if contrib.delta == 0.0 {
                            continue;
                        }
                        key_indices_in_range(
                            keys,
                            |k| k.time,
                            contrib.time,
                            contrib.delta,
                            anim.length,
                            anim.looped,
                            &mut key_scratch,
                        );
                        for &i in &key_scratch {
                            self.deferred.push(DeferredCall {
                                path: path.clone(),
                                method: keys[i].method.clone(),
                                args: keys[i].args.clone(),
                            });
                        }
                    }

                    TrackData::Bezier { keys } => {
                        let TrackState::Bezier { value } = &mut entry.state else {
                            continue;
                        };
                        let Some(sample) = crate::sampling::bezier_interpolate(keys, contrib.time)
                        else {
                            continue;
                        };
                        if entry.process_pass != pass {
                            entry.process_pass = pass;
                            *value = sample;
                        }
                        *value = lerp_f32(*value, sample, blend);
                    }

                    TrackData::Audio { keys } => {
                        let Some(target) = entry.target.upgrade() else {
                            continue;
                        };
                        let Some(audio) = target.as_audio_gain() else {
                            continue;
                        };
                        let TrackState::Audio {
                            playing,
                            start,
                            len,
                        } = &mut entry.state
                        else {
                            continue;
                        };
                        if contrib.seeked {
                            if let Some(i) = find_key(keys, contrib.time, |k| k.time) {
                                let key = &keys[i];
                                match &key.clip {
                                    None => {
                                        if *playing {
                                            audio.stop();
                                            *playing = false;
                                            self.playing.remove(path);
                                        }
                                    }
                                    Some(clip) => {
                                        let start_ofs =
                                            key.start_offset + (contrib.time - key.time);
                                        if start_ofs > key.length - key.end_offset {
                                            if *playing {
                                                audio.stop();
                                                *playing = false;
                                                self.playing.remove(path);
                                            }
                                        } else {
                                            audio.set_clip(clip);
                                            audio.play_from(start_ofs);
                                            *playing = true;
                                            *start = contrib.time;
                                            *len = if key.length > 0.0 && key.end_offset > 0.0 {
                                                key.length - start_ofs - key.end_offset
                                            } else {
                                                0.0
                                            };
                                            self.playing.insert(path.clone());
                                        }
                                    }
                                }
                            }
                        } else {
                            key_indices_in_range(
                                keys,
                                |k| k.time,
                                contrib.time,
                                contrib.delta,
                                anim.length,
                                anim.looped,
                                &mut key_scratch,
                            );
                            if let Some(&i) = key_scratch.last() {
                                let key = &keys[i];
                                match &key.clip {
                                    None => {
                                        audio.stop();
                                        *playing = false;
                                        self.playing.remove(path);
                                    }
                                    Some(clip) => {
                                        audio.set_clip(clip);
                                        audio.play_from(key.start_offset);
                                        *playing = true;
                                        *start = contrib.time;
                                        *len = if key.length > 0.0 && key.end_offset > 0.0 {
                                            key.length - key.start_offset - key.end_offset
                                        } else {
                                            0.0
                                        };
                                        self.playing.insert(path.clone());
                                    }
                                }
                            } else if *playing {
                                // trimmed clips stop exactly once when the
                                // played span exceeds the trimmed length
                                let mut stop = false;
                                if !anim.looped && contrib.time < *start {
                                    stop = true;
                                } else if *len > 0.0 {
                                    let played = if *start > contrib.time {
                                        (anim.length - *start) + contrib.time
                                    } else {
                                        contrib.time - *start
                                    };
                                    if played > *len {
                                        stop = true;
                                    }
                                }
                                if stop {
                                    audio.stop();
                                    *playing = false;
                                    self.playing.remove(path);
                                }
                            }
                        }
                        audio.set_gain_db(linear_to_db(blend.max(0.00001)));
                    }

                    TrackData::Animation { keys } => {
                        let Some(target) = entry.target.upgrade() else {
                            continue;
                        };
                        let Some(np) = target.as_nested_player() else {
                            continue;
                        };
                        let TrackState::Animation { playing } = &mut entry.state else {
                            continue;
                        };
                        if contrib.seeked {
                            let Some(i) = find_key(keys, contrib.time, |k| k.time) else {
                                continue;
                            };
                            let key = &keys[i];
                            let Some(anim_name) = &key.animation else {
                                continue;
                            };
                            if !np.has_animation(anim_name) {
                                continue;
                            }
                            let nested_len = np.animation_length(anim_name);
                            let at = if np.animation_looped(anim_name) && nested_len > 0.0 {
                                fposmod(contrib.time - key.time, nested_len)
                            } else {
                                (contrib.time - key.time).min(nested_len)
                            };
                            if np.is_playing() {
                                np.play(anim_name);
                                np.seek(at, false);
                                *playing = true;
                                self.playing.insert(path.clone());
                            } else {
                                np.set_assigned(anim_name);
                                np.seek(at, true);
                            }
                        } else {
                            key_indices_in_range(
                                keys,
                                |k| k.time,
                                contrib.time,
                                contrib.delta,
                                anim.length,
                                anim.looped,
                                &mut key_scratch,
                            );
                            if let Some(&i) = key_scratch.last() {
                                match &keys[i].animation {
                                    Some(anim_name) if np.has_animation(anim_name) => {
                                        np.play(anim_name);
                                        *playing = true;
                                        self.playing.insert(path.clone());
                                    }
                                    _ => {
                                        if *playing {
                                            np.stop();
                                            *playing = false;
                                            self.playing.remove(path);
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Write blended continuous results to their targets. Only entries
    /// touched by the pass that just ran are written.
    fn commit(&mut self) {
        let pass = self.process_pass;
        for entry in self.track_cache.values() {
            if entry.process_pass != pass {
                continue;
            }
            let Some(target) = entry.target.upgrade() else {
                continue;
            };
            match &entry.state {
                TrackState::Transform {
                    bone,
                    pos,
                    rot,
                    rot_blend_accum: _,
                    scale,
                } => {
                    if entry.root_motion {
                        let mut xform = Xform {
                            pos: *pos,
                            rot: *rot,
                            scale: [1.0 + scale[0], 1.0 + scale[1], 1.0 + scale[2]],
                        };
                        if let (Some(b), Some(skeleton)) = (bone, target.as_skeleton()) {
                            // express the delta in the bone's rest space
                            let rest = skeleton.bone_rest(*b);
                            xform = rest.compose(&xform).compose(&rest.inverse());
                        }
                        self.root_motion_transform = xform;
                    } else if let Some(b) = bone {
                        if let Some(skeleton) = target.as_skeleton() {
                            skeleton.set_bone_pose(
                                *b,
                                Xform {
                                    pos: *pos,
                                    rot: *rot,
                                    scale: *scale,
                                },
                            );
                        }
                    } else {
                        target.set_transform(Xform {
                            pos: *pos,
                            rot: *rot,
                            scale: *scale,
                        });
                    }
                }
                TrackState::Value { value } => {
                    target.set_indexed(&entry.subpath, value.clone());
                }
                TrackState::Bezier { value } => {
                    target.set_indexed(&entry.subpath, Value::Float(*value));
                }
                // discrete kinds were applied during accumulation
                TrackState::Method | TrackState::Audio { .. } | TrackState::Animation { .. } => {}
            }
        }
    }
}

fn declare_node(
    params: &mut ParamStore,
    activity: &mut ActivityMap,
    node: &NodeHandle,
    scope: ScopedPath,
) {
    let Ok(n) = node.try_borrow() else {
        return;
    };
    for (name, default) in n.kind.parameters() {
        params.declare(&scope, name, default);
    }
    if n.input_count() > 0 {
        activity.insert(
            scope.as_str().to_string(),
            vec![Activity::default(); n.input_count()],
        );
    }
    for (child_name, child) in n.kind.child_nodes() {
        declare_node(params, activity, &child, scope.join(&child_name));
    }
}

fn accumulate_root_delta(
    pos: &mut [f32; 3],
    rot: &mut [f32; 4],
    scale: &mut [f32; 3],
    from: &([f32; 3], [f32; 4], [f32; 3]),
    to: &([f32; 3], [f32; 4], [f32; 3]),
    blend: f32,
) {
    for i in 0..3 {
        pos[i] += (to.0[i] - from.0[i]) * blend;
        scale[i] += (to.2[i] - from.2[i]) * blend;
    }
    let step = quat_mul(quat_conjugate(from.1), to.1);
    let weighted = slerp_quat(QUAT_IDENTITY, step, blend);
    *rot = normalize_quat(quat_mul(*rot, weighted));
}
