//! Per-pass evaluation state shared down the node walk.

use crate::data::Animation;
use animix_api_core::TrackPath;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// One animation contribution collected during the graph walk. The blend
/// buffer is the contributing node's per-track weight view, attached by
/// reference; it is read during accumulation after the walk finishes.
pub struct AnimationContribution {
    pub animation: Rc<Animation>,
    pub time: f32,
    pub delta: f32,
    pub blend: f32,
    pub seeked: bool,
    pub track_blends: Rc<RefCell<Vec<f32>>>,
}

/// Evaluation state owned by the tree, rebuilt at the top of every pass.
pub struct EvalState {
    pub valid: bool,
    invalid_reasons: String,
    /// Pass counter snapshot, lets activity records expire.
    pub last_pass: u64,
    /// Dense per-cache-generation track indexing.
    pub track_map: HashMap<TrackPath, usize>,
    pub track_count: usize,
    pub contributions: Vec<AnimationContribution>,
}

impl Default for EvalState {
    fn default() -> Self {
        EvalState {
            valid: true,
            invalid_reasons: String::new(),
            last_pass: 0,
            track_map: HashMap::new(),
            track_count: 0,
            contributions: Vec::new(),
        }
    }
}

impl EvalState {
    pub fn begin_pass(&mut self, pass: u64) {
        self.valid = true;
        self.invalid_reasons.clear();
        self.last_pass = pass;
        self.contributions.clear();
    }

    /// Record a whole-pass invalidity. The pass keeps running so every
    /// reason is collected, but its results are discarded.
    pub fn make_invalid(&mut self, reason: impl AsRef<str>) {
        self.valid = false;
        if !self.invalid_reasons.is_empty() {
            self.invalid_reasons.push('\n');
        }
        self.invalid_reasons.push_str("- ");
        self.invalid_reasons.push_str(reason.as_ref());
    }

    pub fn invalid_reasons(&self) -> &str {
        &self.invalid_reasons
    }
}
