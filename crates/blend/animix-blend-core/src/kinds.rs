//! Concrete node kinds and their per-pass processing.
//!
//! `process` is the single dispatch point: it reads the node's parameters
//! from the pass context, recurses through `blend_input` / `blend_node`,
//! writes updated parameters back and returns the remaining playback time
//! of whatever animation dominates the node.

use crate::error::GraphError;
use crate::node::{BlendNode, Connection, FilterAction, NodeHandle, PassContext};
use animix_api_core::blend::fposmod;
use animix_api_core::Value;
use hashbrown::HashMap;

/// Reserved member name of a blend-tree container's output node.
pub const OUTPUT_NAME: &str = "output";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixMode {
    Blend,
    Add,
}

pub enum NodeKind {
    /// Leaf: plays one clip from the bound player.
    Animation { animation: String },
    OneShot {
        fade_in: f32,
        fade_out: f32,
        autorestart: bool,
        autorestart_delay: f32,
        mix: MixMode,
        sync: bool,
    },
    Add2 { sync: bool },
    Blend2 { sync: bool },
    TimeScale,
    TimeSeek,
    Transition {
        xfade: f32,
        auto_advance: Vec<bool>,
    },
    Output,
    /// Container of named member nodes; `output` is reserved and pre-created.
    BlendTree { nodes: HashMap<String, NodeHandle> },
}

impl NodeKind {
    pub fn caption(&self) -> &'static str {
        match self {
            NodeKind::Animation { .. } => "Animation",
            NodeKind::OneShot { .. } => "OneShot",
            NodeKind::Add2 { .. } => "Add2",
            NodeKind::Blend2 { .. } => "Blend2",
            NodeKind::TimeScale => "TimeScale",
            NodeKind::TimeSeek => "TimeSeek",
            NodeKind::Transition { .. } => "Transition",
            NodeKind::Output => "Output",
            NodeKind::BlendTree { .. } => "BlendTree",
        }
    }

    /// Kinds whose inputs are partitioned by the node's track filter.
    pub fn has_filter(&self) -> bool {
        matches!(
            self,
            NodeKind::OneShot { .. } | NodeKind::Add2 { .. } | NodeKind::Blend2 { .. }
        )
    }

    /// Parameter declarations: name and default, namespaced under the
    /// node's scope by the tree's property bridge.
    pub fn parameters(&self) -> Vec<(&'static str, Value)> {
        match self {
            NodeKind::Animation { .. } => vec![("time", Value::Float(0.0))],
            NodeKind::OneShot { .. } => vec![
                ("active", Value::Bool(false)),
                ("prev_active", Value::Bool(false)),
                ("time", Value::Float(0.0)),
                ("remaining", Value::Float(0.0)),
                ("time_to_restart", Value::Float(-1.0)),
            ],
            NodeKind::Add2 { .. } => vec![("add_amount", Value::Float(0.0))],
            NodeKind::Blend2 { .. } => vec![("blend_amount", Value::Float(0.0))],
            NodeKind::TimeScale => vec![("scale", Value::Float(1.0))],
            // -1 is inert; a non-negative write requests a one-frame seek.
            NodeKind::TimeSeek => vec![("seek_position", Value::Float(-1.0))],
            NodeKind::Transition { .. } => vec![
                ("current", Value::Int(0)),
                ("prev_current", Value::Int(0)),
                ("prev", Value::Int(-1)),
                ("time", Value::Float(0.0)),
                ("prev_xfading", Value::Float(0.0)),
            ],
            NodeKind::Output | NodeKind::BlendTree { .. } => vec![],
        }
    }

    /// Named children for the property bridge walk, sorted for stable
    /// declaration order.
    pub fn child_nodes(&self) -> Vec<(String, NodeHandle)> {
        match self {
            NodeKind::BlendTree { nodes } => {
                let mut out: Vec<(String, NodeHandle)> = nodes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                out.sort_by(|a, b| a.0.cmp(&b.0));
                out
            }
            _ => vec![],
        }
    }
}

// ---- constructors ----

impl BlendNode {
    pub fn animation(name: impl Into<String>) -> NodeHandle {
        BlendNode::with_inputs(
            NodeKind::Animation {
                animation: name.into(),
            },
            &[],
        )
    }

    pub fn one_shot() -> NodeHandle {
        BlendNode::with_inputs(
            NodeKind::OneShot {
                fade_in: 0.0,
                fade_out: 0.0,
                autorestart: false,
                autorestart_delay: 1.0,
                mix: MixMode::Blend,
                sync: false,
            },
            &["in", "shot"],
        )
    }

    pub fn add2() -> NodeHandle {
        BlendNode::with_inputs(NodeKind::Add2 { sync: false }, &["in", "add"])
    }

    pub fn blend2() -> NodeHandle {
        BlendNode::with_inputs(NodeKind::Blend2 { sync: false }, &["in", "blend"])
    }

    pub fn time_scale() -> NodeHandle {
        BlendNode::with_inputs(NodeKind::TimeScale, &["in"])
    }

    pub fn time_seek() -> NodeHandle {
        BlendNode::with_inputs(NodeKind::TimeSeek, &["in"])
    }

    pub fn transition(input_count: usize) -> NodeHandle {
        let names: Vec<String> = (0..input_count).map(|i| format!("state {i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        BlendNode::with_inputs(
            NodeKind::Transition {
                xfade: 0.0,
                auto_advance: vec![false; input_count],
            },
            &refs,
        )
    }

    pub fn output() -> NodeHandle {
        BlendNode::with_inputs(NodeKind::Output, &[OUTPUT_NAME])
    }

    pub fn blend_tree() -> NodeHandle {
        let mut nodes = HashMap::new();
        nodes.insert(OUTPUT_NAME.to_string(), BlendNode::output());
        BlendNode::with_inputs(NodeKind::BlendTree { nodes }, &[])
    }
}

// ---- kind configuration ----

impl BlendNode {
    pub fn set_xfade_time(&mut self, value: f32) -> Result<(), GraphError> {
        match &mut self.kind {
            NodeKind::Transition { xfade, .. } => {
                *xfade = value.max(0.0);
                Ok(())
            }
            _ => Err(GraphError::NotAContainer),
        }
    }

    pub fn set_auto_advance(&mut self, input: usize, enabled: bool) -> Result<(), GraphError> {
        let caption = self.kind.caption().to_string();
        match &mut self.kind {
            NodeKind::Transition { auto_advance, .. } => {
                let slot = auto_advance
                    .get_mut(input)
                    .ok_or(GraphError::InputIndexOutOfRange {
                        node: caption,
                        index: input,
                    })?;
                *slot = enabled;
                Ok(())
            }
            _ => Err(GraphError::NotAContainer),
        }
    }
}

// ---- container ops ----

impl BlendNode {
    fn container(&self) -> Result<&HashMap<String, NodeHandle>, GraphError> {
        match &self.kind {
            NodeKind::BlendTree { nodes } => Ok(nodes),
            _ => Err(GraphError::NotAContainer),
        }
    }

    fn container_mut(&mut self) -> Result<&mut HashMap<String, NodeHandle>, GraphError> {
        match &mut self.kind {
            NodeKind::BlendTree { nodes } => Ok(nodes),
            _ => Err(GraphError::NotAContainer),
        }
    }

    pub fn add_node(&mut self, name: &str, node: NodeHandle) -> Result<(), GraphError> {
        if name.is_empty() || name.contains('/') {
            return Err(GraphError::InvalidName(name.to_string()));
        }
        if name == OUTPUT_NAME {
            return Err(GraphError::OutputReserved);
        }
        let nodes = self.container_mut()?;
        if nodes.contains_key(name) {
            return Err(GraphError::DuplicateNode(name.to_string()));
        }
        nodes.insert(name.to_string(), node);
        Ok(())
    }

    pub fn get_node(&self, name: &str) -> Result<NodeHandle, GraphError> {
        self.container()?
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::NodeNotFound(name.to_string()))
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.container().map_or(false, |n| n.contains_key(name))
    }

    pub fn node_list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .container()
            .map(|n| n.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn remove_node(&mut self, name: &str) -> Result<(), GraphError> {
        if name == OUTPUT_NAME {
            return Err(GraphError::OutputReserved);
        }
        let nodes = self.container_mut()?;
        if nodes.remove(name).is_none() {
            return Err(GraphError::NodeNotFound(name.to_string()));
        }
        // drop any connection fed by the removed node
        for member in nodes.values() {
            let Ok(mut member) = member.try_borrow_mut() else {
                continue;
            };
            for i in 0..member.input_count() {
                let fed_by_removed = member.inputs[i]
                    .connection
                    .as_ref()
                    .map_or(false, |c| c.name == name);
                if fed_by_removed {
                    member.set_input_connection(i, None);
                }
            }
        }
        Ok(())
    }

    /// Wire member `source` into input `input_index` of member `sink`.
    /// A member can feed at most one input; the output node is a sink only.
    pub fn connect_node(
        &mut self,
        sink: &str,
        input_index: usize,
        source: &str,
    ) -> Result<(), GraphError> {
        if source == OUTPUT_NAME {
            return Err(GraphError::OutputReserved);
        }
        if sink == source {
            return Err(GraphError::SelfConnection);
        }
        let nodes = self.container()?;
        let sink_node = nodes
            .get(sink)
            .cloned()
            .ok_or_else(|| GraphError::NodeNotFound(sink.to_string()))?;
        let source_node = nodes
            .get(source)
            .cloned()
            .ok_or_else(|| GraphError::NodeNotFound(source.to_string()))?;

        for member in nodes.values() {
            let Ok(member) = member.try_borrow() else {
                continue;
            };
            for input in &member.inputs {
                if input.connection.as_ref().map_or(false, |c| c.name == source) {
                    return Err(GraphError::ConnectionExists(source.to_string()));
                }
            }
        }

        let mut sink_mut = sink_node
            .try_borrow_mut()
            .map_err(|_| GraphError::SelfConnection)?;
        if input_index >= sink_mut.input_count() {
            return Err(GraphError::InputIndexOutOfRange {
                node: sink.to_string(),
                index: input_index,
            });
        }
        if sink_mut.inputs[input_index].connection.is_some() {
            return Err(GraphError::InputOccupied {
                node: sink.to_string(),
                index: input_index,
            });
        }
        sink_mut.set_input_connection(
            input_index,
            Some(Connection {
                name: source.to_string(),
                node: source_node,
            }),
        );
        Ok(())
    }

    pub fn disconnect_node(&mut self, sink: &str, input_index: usize) -> Result<(), GraphError> {
        let nodes = self.container()?;
        let sink_node = nodes
            .get(sink)
            .cloned()
            .ok_or_else(|| GraphError::NodeNotFound(sink.to_string()))?;
        let mut sink_mut = sink_node
            .try_borrow_mut()
            .map_err(|_| GraphError::SelfConnection)?;
        if input_index >= sink_mut.input_count() {
            return Err(GraphError::InputIndexOutOfRange {
                node: sink.to_string(),
                index: input_index,
            });
        }
        sink_mut.set_input_connection(input_index, None);
        Ok(())
    }
}

// ---- processing ----

pub(crate) fn process(node: &NodeHandle, ctx: &mut PassContext<'_>, time: f32, seek: bool) -> f32 {
    let n = node.borrow();
    match &n.kind {
        NodeKind::Animation { animation } => {
            let Some(anim) = ctx.player.animation(animation) else {
                ctx.state.make_invalid(format!(
                    "{}: animation not found: '{}'.",
                    n.describe(),
                    animation
                ));
                return 0.0;
            };
            let length = anim.length;
            let (mut t, step) = if seek {
                (time, 0.0)
            } else {
                (n.param_f32(ctx, "time", 0.0) + time, time)
            };
            if anim.looped && length > 0.0 {
                t = fposmod(t, length);
            } else {
                t = t.clamp(0.0, length);
            }
            n.blend_animation(ctx, animation, t, step, seek, 1.0);
            n.write_param(ctx, "time", Value::Float(t));
            length - t
        }

        NodeKind::OneShot {
            fade_in,
            fade_out,
            autorestart,
            autorestart_delay,
            mix,
            sync,
        } => {
            let mut active = n.param_bool(ctx, "active", false);
            let prev_active = n.param_bool(ctx, "prev_active", false);
            let mut t = n.param_f32(ctx, "time", 0.0);
            let mut remaining = n.param_f32(ctx, "remaining", 0.0);
            let mut time_to_restart = n.param_f32(ctx, "time_to_restart", -1.0);

            if !active {
                // pass input 0 through as if this node were absent
                if prev_active {
                    n.write_param(ctx, "prev_active", Value::Bool(false));
                }
                if time_to_restart >= 0.0 && !seek {
                    time_to_restart -= time;
                    if time_to_restart < 0.0 {
                        n.write_param(ctx, "active", Value::Bool(true));
                        active = true;
                        time_to_restart = -1.0;
                    }
                    n.write_param(ctx, "time_to_restart", Value::Float(time_to_restart));
                }
                if !active {
                    return n.blend_input(ctx, 0, time, seek, 1.0, FilterAction::Ignore, *sync);
                }
            }

            let mut shot_seek = seek;
            if seek {
                t = time;
            }
            let do_start = !prev_active;
            if do_start {
                t = 0.0;
                shot_seek = true;
                n.write_param(ctx, "prev_active", Value::Bool(true));
            }

            let blend = if *fade_in > 0.0 && t < *fade_in {
                (t / *fade_in).clamp(0.0, 1.0)
            } else if !do_start && *fade_out > 0.0 && remaining < *fade_out {
                (remaining / *fade_out).clamp(0.0, 1.0)
            } else {
                1.0
            };

            let main_rem = match mix {
                MixMode::Add => n.blend_input(ctx, 0, time, seek, 1.0, FilterAction::Ignore, *sync),
                MixMode::Blend => {
                    n.blend_input(ctx, 0, time, seek, 1.0 - blend, FilterAction::Blend, *sync)
                }
            };
            let shot_time = if shot_seek { t } else { time };
            let shot_rem =
                n.blend_input(ctx, 1, shot_time, shot_seek, blend, FilterAction::Pass, true);

            if do_start {
                remaining = shot_rem;
            }
            if !seek {
                t += time;
                remaining = shot_rem;
                if remaining <= 0.0 {
                    n.write_param(ctx, "active", Value::Bool(false));
                    n.write_param(ctx, "prev_active", Value::Bool(false));
                    if *autorestart {
                        n.write_param(ctx, "time_to_restart", Value::Float(*autorestart_delay));
                    }
                }
            }

            n.write_param(ctx, "time", Value::Float(t));
            n.write_param(ctx, "remaining", Value::Float(remaining));
            main_rem.max(remaining)
        }

        NodeKind::Add2 { sync } => {
            let amount = n.param_f32(ctx, "add_amount", 0.0);
            let rem = n.blend_input(ctx, 0, time, seek, 1.0, FilterAction::Ignore, *sync);
            n.blend_input(ctx, 1, time, seek, amount, FilterAction::Pass, *sync);
            rem
        }

        NodeKind::Blend2 { sync } => {
            let amount = n.param_f32(ctx, "blend_amount", 0.0);
            let rem0 = n.blend_input(ctx, 0, time, seek, 1.0 - amount, FilterAction::Blend, *sync);
            let rem1 = n.blend_input(ctx, 1, time, seek, amount, FilterAction::Pass, *sync);
            if amount > 0.5 {
                rem1
            } else {
                rem0
            }
        }

        NodeKind::TimeScale => {
            let scale = n.param_f32(ctx, "scale", 1.0);
            if seek {
                n.blend_input(ctx, 0, time, true, 1.0, FilterAction::Ignore, true)
            } else {
                n.blend_input(ctx, 0, time * scale, false, 1.0, FilterAction::Ignore, true)
            }
        }

        NodeKind::TimeSeek => {
            if seek {
                return n.blend_input(ctx, 0, time, true, 1.0, FilterAction::Ignore, true);
            }
            let seek_pos = n.param_f32(ctx, "seek_position", -1.0);
            if seek_pos >= 0.0 {
                let rem = n.blend_input(ctx, 0, seek_pos, true, 1.0, FilterAction::Ignore, true);
                n.write_param(ctx, "seek_position", Value::Float(-1.0));
                rem
            } else {
                n.blend_input(ctx, 0, time, false, 1.0, FilterAction::Ignore, true)
            }
        }

        NodeKind::Transition {
            xfade,
            auto_advance,
        } => {
            let current = n.param_i64(ctx, "current", 0);
            let prev_current = n.param_i64(ctx, "prev_current", 0);
            let mut prev = n.param_i64(ctx, "prev", -1);
            let mut t = n.param_f32(ctx, "time", 0.0);
            let mut prev_xfading = n.param_f32(ctx, "prev_xfading", 0.0);

            let input_count = n.input_count() as i64;
            if current < 0 || current >= input_count {
                ctx.state.make_invalid(format!(
                    "{}: current state {} out of range.",
                    n.describe(),
                    current
                ));
                return 0.0;
            }

            let switched = current != prev_current;
            if switched {
                n.write_param(ctx, "prev_current", Value::Int(current));
                n.write_param(ctx, "prev", Value::Int(prev_current));
                prev = prev_current;
                prev_xfading = *xfade;
                t = 0.0;
            }

            let rem;
            if prev < 0 || prev >= input_count {
                // not cross-fading
                rem = n.blend_input(ctx, current as usize, time, seek, 1.0, FilterAction::Ignore, true);
                if seek {
                    t = time;
                } else {
                    t += time;
                }
                if !seek
                    && auto_advance.get(current as usize).copied().unwrap_or(false)
                    && rem <= *xfade
                {
                    n.write_param(ctx, "current", Value::Int((current + 1) % input_count));
                }
            } else {
                let fade = if *xfade <= 0.0 {
                    0.0
                } else {
                    (prev_xfading / *xfade).clamp(0.0, 1.0)
                };
                if switched && !seek {
                    rem = n.blend_input(
                        ctx,
                        current as usize,
                        0.0,
                        true,
                        1.0 - fade,
                        FilterAction::Ignore,
                        true,
                    );
                } else {
                    if seek {
                        t = time;
                    }
                    rem = n.blend_input(
                        ctx,
                        current as usize,
                        time,
                        seek,
                        1.0 - fade,
                        FilterAction::Ignore,
                        true,
                    );
                }
                if seek {
                    n.blend_input(ctx, prev as usize, time, true, fade, FilterAction::Ignore, true);
                    t = time;
                } else {
                    n.blend_input(ctx, prev as usize, time, false, fade, FilterAction::Ignore, true);
                    t += time;
                    prev_xfading -= time;
                    if prev_xfading < 0.0 {
                        n.write_param(ctx, "prev", Value::Int(-1));
                    }
                }
            }

            n.write_param(ctx, "time", Value::Float(t));
            n.write_param(ctx, "prev_xfading", Value::Float(prev_xfading));
            rem
        }

        NodeKind::Output => n.blend_input(ctx, 0, time, seek, 1.0, FilterAction::Ignore, true),

        NodeKind::BlendTree { nodes } => {
            let Some(output) = nodes.get(OUTPUT_NAME).cloned() else {
                ctx.state
                    .make_invalid(format!("{}: container has no output node.", n.describe()));
                return 0.0;
            };
            n.blend_node(
                ctx,
                OUTPUT_NAME,
                &output,
                time,
                seek,
                1.0,
                FilterAction::Ignore,
                true,
            )
        }
    }
}
