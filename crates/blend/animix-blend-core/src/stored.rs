//! JSON (de)serialization of animation clips, for data-driven tests and
//! hosts that ship clips as assets.

use crate::data::Animation;

pub fn parse_animation_json(json: &str) -> Result<Animation, serde_json::Error> {
    serde_json::from_str(json)
}

pub fn animation_to_json(animation: &Animation) -> Result<String, serde_json::Error> {
    serde_json::to_string(animation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{TrackData, UpdateMode};

    #[test]
    fn parse_minimal_clip() {
        let json = r#"{
            "name": "walk",
            "length": 1.0,
            "looped": true,
            "tracks": [
                {
                    "path": "Enemy/Mesh.visible",
                    "kind": "value",
                    "update": "discrete",
                    "keys": [
                        { "time": 0.0, "value": { "bool": true } },
                        { "time": 0.5, "value": { "bool": false } }
                    ]
                }
            ]
        }"#;
        let anim = parse_animation_json(json).unwrap();
        assert_eq!(anim.name, "walk");
        assert!(anim.looped);
        assert_eq!(anim.tracks.len(), 1);
        match &anim.tracks[0].data {
            TrackData::Value { update, keys } => {
                assert_eq!(*update, UpdateMode::Discrete);
                assert_eq!(keys.len(), 2);
            }
            other => panic!("unexpected track kind: {other:?}"),
        }

        let back = animation_to_json(&anim).unwrap();
        let reparsed = parse_animation_json(&back).unwrap();
        assert_eq!(reparsed, anim);
    }
}
