//! String-grammar path addressing an animated target:
//!
//!   node/node/target.field.field
//!
//! `'/'` separates scene-node segments; an optional `'.'`-separated property
//! subpath hangs off the last segment. Transform tracks with exactly one
//! field address a skeleton bone (the field is the bone name).
//!
//! `TrackPath` hashes and compares structurally and serializes as the plain
//! string form so it can key JSON maps directly.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty path")]
    Empty,
    #[error("empty node segment in '{0}'")]
    EmptySegment(String),
    #[error("empty property field in '{0}'")]
    EmptyField(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackPath {
    nodes: Vec<String>,
    fields: Vec<String>,
}

impl TrackPath {
    pub fn parse(s: &str) -> Result<TrackPath, PathError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        let (node_part, field_part) = match s.split_once('.') {
            Some((n, f)) => (n, Some(f)),
            None => (s, None),
        };
        let mut nodes = Vec::new();
        for seg in node_part.split('/') {
            let seg = seg.trim();
            if seg.is_empty() {
                return Err(PathError::EmptySegment(s.to_string()));
            }
            nodes.push(seg.to_string());
        }
        let mut fields = Vec::new();
        if let Some(f) = field_part {
            for field in f.split('.') {
                let field = field.trim();
                if field.is_empty() {
                    return Err(PathError::EmptyField(s.to_string()));
                }
                fields.push(field.to_string());
            }
        }
        Ok(TrackPath { nodes, fields })
    }

    pub fn node_segments(&self) -> &[String] {
        &self.nodes
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn last_node(&self) -> &str {
        // parse guarantees at least one node segment
        self.nodes.last().map(String::as_str).unwrap_or("")
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }
}

impl fmt::Display for TrackPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nodes.join("/"))?;
        for field in &self.fields {
            write!(f, ".{field}")?;
        }
        Ok(())
    }
}

impl Serialize for TrackPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TrackPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<TrackPath, D::Error> {
        let s = String::deserialize(deserializer)?;
        TrackPath::parse(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nodes_and_fields() {
        let p = TrackPath::parse("Armature/Skeleton.hips").unwrap();
        assert_eq!(p.node_segments(), ["Armature", "Skeleton"]);
        assert_eq!(p.fields(), ["hips"]);
        assert_eq!(p.last_node(), "Skeleton");
        assert_eq!(p.to_string(), "Armature/Skeleton.hips");
    }

    #[test]
    fn parse_plain_node_path() {
        let p = TrackPath::parse("Enemy/Mesh").unwrap();
        assert!(!p.has_fields());
        assert_eq!(p.to_string(), "Enemy/Mesh");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(TrackPath::parse("  "), Err(PathError::Empty));
        assert!(matches!(
            TrackPath::parse("a//b"),
            Err(PathError::EmptySegment(_))
        ));
        assert!(matches!(
            TrackPath::parse("a.b..c"),
            Err(PathError::EmptyField(_))
        ));
    }

    #[test]
    fn serde_roundtrip_as_string() {
        let p = TrackPath::parse("Player/AudioStream.volume").unwrap();
        let s = serde_json::to_string(&p).unwrap();
        assert_eq!(s, r#""Player/AudioStream.volume""#);
        let back: TrackPath = serde_json::from_str(&s).unwrap();
        assert_eq!(back, p);
    }
}
