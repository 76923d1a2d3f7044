//! Blend node base: input ports, filter sets, per-track weight buffers and
//! the weight-propagation primitives (`blend_input` / `blend_node` /
//! `blend_animation`) every node kind composes from.
//!
//! Nodes are shared behind `Rc<RefCell<...>>`; evaluation is single-threaded.
//! Scope bindings are transient: they exist only while a node sits on the
//! active evaluation path, which is what makes sharing one node between
//! several trees (or several places in one tree) sound.

use crate::binding::AnimationPlayer;
use crate::error::{GraphError, ParameterError};
use crate::kinds::NodeKind;
use crate::params::{ActivityMap, ParamStore};
use crate::scope::ScopedPath;
use crate::state::{AnimationContribution, EvalState};
use animix_api_core::blend::CMP_EPSILON;
use animix_api_core::{TrackPath, Value};
use hashbrown::HashSet;
use std::cell::RefCell;
use std::rc::Rc;

pub type NodeHandle = Rc<RefCell<BlendNode>>;

/// How a parent's filter set partitions the weights handed to a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    /// Filter does not apply; every track gets `parent * blend`.
    Ignore,
    /// Filtered tracks get `parent * blend`, the rest get zero.
    Pass,
    /// Filtered tracks get zero, the rest get `parent * blend`.
    Stop,
    /// Filtered tracks get `parent * blend`, the rest pass at full parent
    /// weight.
    Blend,
}

#[derive(Clone)]
pub struct Connection {
    /// Member name of the source node inside the owning container. Also the
    /// namespace segment for the child's parameters.
    pub name: String,
    pub node: NodeHandle,
}

pub struct Input {
    pub name: String,
    pub connection: Option<Connection>,
}

/// Everything a node may touch while processing, borrowed from the tree for
/// the duration of one pass.
pub struct PassContext<'a> {
    pub state: &'a mut EvalState,
    pub params: &'a mut ParamStore,
    pub activity: &'a mut ActivityMap,
    pub player: &'a Rc<dyn AnimationPlayer>,
}

pub struct BlendNode {
    pub kind: NodeKind,
    pub(crate) inputs: Vec<Input>,
    filter: HashSet<TrackPath>,
    filter_enabled: bool,
    /// Per-track blend weights for this node, sized to the active cache
    /// generation. Shared by reference into contribution records.
    pub(crate) blends: Rc<RefCell<Vec<f32>>>,
    pub(crate) scope: Option<ScopedPath>,
    pub(crate) parent_scope: Option<ScopedPath>,
}

impl BlendNode {
    pub(crate) fn with_inputs(kind: NodeKind, input_names: &[&str]) -> NodeHandle {
        Rc::new(RefCell::new(BlendNode {
            kind,
            inputs: input_names
                .iter()
                .map(|n| Input {
                    name: (*n).to_string(),
                    connection: None,
                })
                .collect(),
            filter: HashSet::new(),
            filter_enabled: false,
            blends: Rc::new(RefCell::new(Vec::new())),
            scope: None,
            parent_scope: None,
        }))
    }

    // ---- inputs ----

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn input_name(&self, index: usize) -> Option<&str> {
        self.inputs.get(index).map(|i| i.name.as_str())
    }

    pub fn add_input(&mut self, name: &str) -> Result<usize, GraphError> {
        validate_port_name(name)?;
        self.inputs.push(Input {
            name: name.to_string(),
            connection: None,
        });
        Ok(self.inputs.len() - 1)
    }

    pub fn set_input_name(&mut self, index: usize, name: &str) -> Result<(), GraphError> {
        validate_port_name(name)?;
        let caption = self.kind.caption();
        let input = self
            .inputs
            .get_mut(index)
            .ok_or_else(|| GraphError::InputIndexOutOfRange {
                node: caption.to_string(),
                index,
            })?;
        input.name = name.to_string();
        Ok(())
    }

    pub fn remove_input(&mut self, index: usize) -> Result<(), GraphError> {
        if index >= self.inputs.len() {
            return Err(GraphError::InputIndexOutOfRange {
                node: self.kind.caption().to_string(),
                index,
            });
        }
        self.inputs.remove(index);
        Ok(())
    }

    pub(crate) fn set_input_connection(&mut self, index: usize, conn: Option<Connection>) {
        if let Some(input) = self.inputs.get_mut(index) {
            input.connection = conn;
        }
    }

    // ---- filter ----

    pub fn set_filter_enabled(&mut self, enabled: bool) {
        self.filter_enabled = enabled;
    }

    pub fn is_filter_enabled(&self) -> bool {
        self.filter_enabled
    }

    pub fn set_filter_path(&mut self, path: TrackPath, enabled: bool) {
        if enabled {
            self.filter.insert(path);
        } else {
            self.filter.remove(&path);
        }
    }

    pub fn is_path_filtered(&self, path: &TrackPath) -> bool {
        self.filter.contains(path)
    }

    pub fn caption(&self) -> &'static str {
        self.kind.caption()
    }

    pub(crate) fn blends_handle(&self) -> Rc<RefCell<Vec<f32>>> {
        Rc::clone(&self.blends)
    }

    pub fn has_filter(&self) -> bool {
        self.kind.has_filter()
    }

    // ---- parameters ----

    /// Parameters are resolved against the scope this node is bound to on
    /// the active evaluation path; outside a pass there is no scope and no
    /// parameter storage to address.
    pub fn get_parameter(&self, ctx: &PassContext<'_>, name: &str) -> Result<Value, ParameterError> {
        let scope = self.scope.as_ref().ok_or(ParameterError::InvalidState)?;
        ctx.params.get_scoped(scope, name)
    }

    pub fn set_parameter(
        &self,
        ctx: &mut PassContext<'_>,
        name: &str,
        value: Value,
    ) -> Result<(), ParameterError> {
        let scope = self.scope.as_ref().ok_or(ParameterError::InvalidState)?;
        ctx.params.set_scoped(scope, name, value)
    }

    pub(crate) fn param_f32(&self, ctx: &PassContext<'_>, name: &str, default: f32) -> f32 {
        self.get_parameter(ctx, name)
            .map(|v| v.to_f32())
            .unwrap_or(default)
    }

    pub(crate) fn param_i64(&self, ctx: &PassContext<'_>, name: &str, default: i64) -> i64 {
        self.get_parameter(ctx, name)
            .map(|v| v.to_i64())
            .unwrap_or(default)
    }

    pub(crate) fn param_bool(&self, ctx: &PassContext<'_>, name: &str, default: bool) -> bool {
        self.get_parameter(ctx, name)
            .map(|v| v.to_bool())
            .unwrap_or(default)
    }

    /// Write-through that surfaces a missing declaration as a pass
    /// invalidity instead of silently dropping node state.
    pub(crate) fn write_param(&self, ctx: &mut PassContext<'_>, name: &str, value: Value) {
        if let Err(err) = self.set_parameter(ctx, name, value) {
            ctx.state
                .make_invalid(format!("{}: {}", self.describe(), err));
        }
    }

    pub(crate) fn describe(&self) -> String {
        match &self.scope {
            Some(s) => format!("{} '{}'", self.kind.caption(), s),
            None => self.kind.caption().to_string(),
        }
    }

    // ---- blending ----

    /// Blend the node connected to input `index`. The child is namespaced
    /// under this node's *parent* scope, so siblings in a container sit flat
    /// beside each other.
    #[allow(clippy::too_many_arguments)]
    pub fn blend_input(
        &self,
        ctx: &mut PassContext<'_>,
        index: usize,
        time: f32,
        seek: bool,
        blend: f32,
        filter: FilterAction,
        sync: bool,
    ) -> f32 {
        let Some(input) = self.inputs.get(index) else {
            debug_assert!(false, "input index out of range");
            ctx.state.make_invalid(format!(
                "{}: input index {} out of range.",
                self.describe(),
                index
            ));
            return 0.0;
        };
        let Some(conn) = input.connection.clone() else {
            ctx.state.make_invalid(format!(
                "{}: input '{}' is not connected.",
                self.describe(),
                input.name
            ));
            return 0.0;
        };
        let Some(parent_scope) = self.parent_scope.clone() else {
            debug_assert!(false, "blend_input on an unbound node");
            ctx.state
                .make_invalid(format!("{}: node is not bound to a pass.", self.describe()));
            return 0.0;
        };
        let child_scope = parent_scope.join(&conn.name);
        let (rem, max_weight) = self.blend_child(
            ctx,
            &conn.node,
            child_scope,
            parent_scope,
            time,
            seek,
            blend,
            filter,
            sync,
        );
        // activity is the peak per-track weight handed down, after filtering
        if let Some(scope) = &self.scope {
            if let Some(slots) = ctx.activity.get_mut(scope.as_str()) {
                if let Some(slot) = slots.get_mut(index) {
                    slot.activity = max_weight;
                    slot.last_pass = ctx.state.last_pass;
                }
            }
        }
        rem
    }

    /// Blend an ad-hoc child that is not wired through an input port. The
    /// child is namespaced under this node's own scope; containers use this
    /// for their members.
    #[allow(clippy::too_many_arguments)]
    pub fn blend_node(
        &self,
        ctx: &mut PassContext<'_>,
        subpath: &str,
        node: &NodeHandle,
        time: f32,
        seek: bool,
        blend: f32,
        filter: FilterAction,
        sync: bool,
    ) -> f32 {
        let Some(scope) = self.scope.clone() else {
            debug_assert!(false, "blend_node on an unbound node");
            ctx.state
                .make_invalid(format!("{}: node is not bound to a pass.", self.describe()));
            return 0.0;
        };
        let child_scope = scope.join(subpath);
        self.blend_child(ctx, node, child_scope, scope, time, seek, blend, filter, sync)
            .0
    }

    /// Record an animation contribution weighted by this node's blend
    /// buffer. Consumed by the tree's accumulation pass.
    pub fn blend_animation(
        &self,
        ctx: &mut PassContext<'_>,
        animation: &str,
        time: f32,
        delta: f32,
        seeked: bool,
        blend: f32,
    ) {
        let Some(anim) = ctx.player.animation(animation) else {
            ctx.state.make_invalid(format!(
                "{}: animation not found: '{}'.",
                self.describe(),
                animation
            ));
            return;
        };
        ctx.state.contributions.push(AnimationContribution {
            animation: anim,
            time,
            delta,
            blend,
            seeked,
            track_blends: Rc::clone(&self.blends),
        });
    }

    /// Returns the child's remaining playback time and the maximum per-track
    /// weight written into its blend buffer.
    #[allow(clippy::too_many_arguments)]
    fn blend_child(
        &self,
        ctx: &mut PassContext<'_>,
        child: &NodeHandle,
        scope: ScopedPath,
        parent_scope: ScopedPath,
        time: f32,
        seek: bool,
        blend: f32,
        filter: FilterAction,
        sync: bool,
    ) -> (f32, f32) {
        let child_blends = match child.try_borrow() {
            Ok(c) => Rc::clone(&c.blends),
            Err(_) => {
                ctx.state.make_invalid(format!(
                    "{}: cycle detected in blend graph.",
                    self.describe()
                ));
                return (0.0, 0.0);
            }
        };

        let mut max_weight = 0.0f32;
        {
            let parent = self.blends.borrow();
            let track_count = parent.len();
            let mut weights = child_blends.borrow_mut();
            weights.clear();
            weights.resize(track_count, 0.0);

            if filter != FilterAction::Ignore && self.filter_enabled {
                let mut mask = vec![false; track_count];
                for path in &self.filter {
                    if let Some(&i) = ctx.state.track_map.get(path) {
                        mask[i] = true;
                    }
                }
                match filter {
                    FilterAction::Pass => {
                        for i in 0..track_count {
                            weights[i] = if mask[i] { parent[i] * blend } else { 0.0 };
                        }
                    }
                    FilterAction::Stop => {
                        for i in 0..track_count {
                            weights[i] = if mask[i] { 0.0 } else { parent[i] * blend };
                        }
                    }
                    FilterAction::Blend => {
                        for i in 0..track_count {
                            weights[i] = if mask[i] { parent[i] * blend } else { parent[i] };
                        }
                    }
                    FilterAction::Ignore => unreachable!(),
                }
            } else {
                for i in 0..track_count {
                    weights[i] = parent[i] * blend;
                }
            }
            for w in weights.iter() {
                max_weight = max_weight.max(w.abs());
            }
        }

        // Silent subtrees are skipped unless seeking or kept in sync; their
        // internal clocks then simply hold.
        if !seek && max_weight <= CMP_EPSILON && !sync {
            return (0.0, max_weight);
        }
        (
            pre_process(child, scope, parent_scope, ctx, time, seek),
            max_weight,
        )
    }
}

fn validate_port_name(name: &str) -> Result<(), GraphError> {
    if name.is_empty() || name.contains('/') || name.contains('.') {
        return Err(GraphError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Bind a node to its scope, dispatch to the kind's process logic, then
/// unbind. A node already on the active path cannot be re-entered; that is
/// reported as a pass invalidity rather than a borrow panic.
pub(crate) fn pre_process(
    node: &NodeHandle,
    scope: ScopedPath,
    parent_scope: ScopedPath,
    ctx: &mut PassContext<'_>,
    time: f32,
    seek: bool,
) -> f32 {
    match node.try_borrow_mut() {
        Ok(mut n) => {
            n.scope = Some(scope);
            n.parent_scope = Some(parent_scope);
        }
        Err(_) => {
            ctx.state
                .make_invalid("cycle detected in blend graph.".to_string());
            return 0.0;
        }
    }
    let rem = crate::kinds::process(node, ctx, time, seek);
    if let Ok(mut n) = node.try_borrow_mut() {
        n.scope = None;
        n.parent_scope = None;
    }
    rem
}
