//! Parameter storage and the tree's flattened property bridge.
//!
//! Parameters are declared per node scope when the tree walks its graph
//! (`AnimationTree::mark_tree_changed` invalidates the walk). Values survive
//! re-declaration so editing the graph does not reset tuned parameters.

use crate::error::ParameterError;
use crate::scope::ScopedPath;
use animix_api_core::Value;
use hashbrown::HashMap;

#[derive(Default)]
pub struct ParamStore {
    values: HashMap<String, Value>,
    /// scope string -> parameter name -> full key
    by_scope: HashMap<String, HashMap<String, String>>,
    /// declaration order, for stable property enumeration
    order: Vec<String>,
}

impl ParamStore {
    pub fn clear_declarations(&mut self) {
        self.by_scope.clear();
        self.order.clear();
    }

    /// Declare a parameter in a scope, keeping any existing value.
    pub fn declare(&mut self, scope: &ScopedPath, name: &str, default: Value) {
        let key = scope.param(name);
        self.by_scope
            .entry(scope.as_str().to_string())
            .or_default()
            .insert(name.to_string(), key.clone());
        if !self.values.contains_key(&key) {
            self.values.insert(key.clone(), default);
        }
        self.order.push(key);
    }

    pub fn get_scoped(&self, scope: &ScopedPath, name: &str) -> Result<Value, ParameterError> {
        let key = self
            .by_scope
            .get(scope.as_str())
            .and_then(|m| m.get(name))
            .ok_or_else(|| ParameterError::UnknownParameter(name.to_string()))?;
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ParameterError::UnknownParameter(name.to_string()))
    }

    pub fn set_scoped(
        &mut self,
        scope: &ScopedPath,
        name: &str,
        value: Value,
    ) -> Result<(), ParameterError> {
        let key = self
            .by_scope
            .get(scope.as_str())
            .and_then(|m| m.get(name))
            .ok_or_else(|| ParameterError::UnknownParameter(name.to_string()))?;
        self.values.insert(key.clone(), value);
        Ok(())
    }

    /// Lookup by full path, e.g. `"parameters/Blend/blend_amount"`.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.values.get(path).cloned()
    }

    /// Write by full path. Returns false for paths never declared.
    pub fn set(&mut self, path: &str, value: Value) -> bool {
        if self.values.contains_key(path) {
            self.values.insert(path.to_string(), value);
            true
        } else {
            false
        }
    }

    /// Declared properties in declaration order.
    pub fn properties(&self) -> Vec<(String, Value)> {
        self.order
            .iter()
            .filter_map(|k| self.values.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }
}

/// Per-input evaluation activity, for editor-style connection meters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Activity {
    pub activity: f32,
    pub last_pass: u64,
}

/// scope string -> one slot per input of the node bound to that scope
pub type ActivityMap = HashMap<String, Vec<Activity>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_preserves_existing_values() {
        let mut store = ParamStore::default();
        let scope = ScopedPath::root().join("Blend");
        store.declare(&scope, "blend_amount", Value::Float(0.0));
        store.set_scoped(&scope, "blend_amount", Value::Float(0.75)).unwrap();

        store.clear_declarations();
        store.declare(&scope, "blend_amount", Value::Float(0.0));
        assert_eq!(
            store.get_scoped(&scope, "blend_amount").unwrap(),
            Value::Float(0.75)
        );
    }

    #[test]
    fn unknown_parameter_is_typed() {
        let store = ParamStore::default();
        let scope = ScopedPath::root();
        assert_eq!(
            store.get_scoped(&scope, "nope"),
            Err(ParameterError::UnknownParameter("nope".to_string()))
        );
    }

    #[test]
    fn full_path_access() {
        let mut store = ParamStore::default();
        let scope = ScopedPath::root().join("OneShot");
        store.declare(&scope, "active", Value::Bool(false));
        assert!(store.set("parameters/OneShot/active", Value::Bool(true)));
        assert_eq!(
            store.get("parameters/OneShot/active"),
            Some(Value::Bool(true))
        );
        assert!(!store.set("parameters/OneShot/missing", Value::Bool(true)));
    }
}
