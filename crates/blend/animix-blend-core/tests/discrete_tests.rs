//! Discrete track semantics: key replay windows, method call deferral,
//! audio trimming and nested animation player commands.

use animix_blend_core::{AnimationTree, AudioKey, BlendNode, NodeHandle, TrackPath, Value};
use animix_test_fixtures::*;

fn tree_with(root: NodeHandle) -> AnimationTree {
    let mut tree = AnimationTree::new();
    tree.set_root(Some(root));
    tree.set_player_path(Some(TrackPath::parse("Player").unwrap()));
    tree.set_active(true);
    tree
}

fn single_clip_root(name: &str) -> NodeHandle {
    let root = BlendNode::blend_tree();
    {
        let mut t = root.borrow_mut();
        t.add_node("clip", BlendNode::animation(name)).unwrap();
        t.connect_node("output", 0, "clip").unwrap();
    }
    root
}

fn seekable_clip_root(name: &str) -> NodeHandle {
    let root = BlendNode::blend_tree();
    {
        let mut t = root.borrow_mut();
        t.add_node("clip", BlendNode::animation(name)).unwrap();
        t.add_node("seek", BlendNode::time_seek()).unwrap();
        t.connect_node("seek", 0, "clip").unwrap();
        t.connect_node("output", 0, "seek").unwrap();
    }
    root
}

#[test]
fn discrete_keys_replay_once_per_crossing() {
    let mut scene = MockScene::new();
    let player = MockPlayer::new("Root");
    player.add_animation(clip(
        "states",
        1.0,
        false,
        vec![discrete_track(
            "Enemy/Mesh.state",
            vec![(0.25, Value::Int(1)), (0.75, Value::Int(2))],
        )],
    ));
    scene.add_player("Player", player);
    scene.add_target("Root", MockTarget::new());
    let target = MockTarget::new();
    scene.add_target("Enemy/Mesh", target.clone());

    let mut tree = tree_with(single_clip_root("states"));
    tree.advance(&scene, 0.5);
    assert_eq!(target.writes("state"), vec![Value::Int(1)]);

    // zero delta is an empty window
    tree.advance(&scene, 0.0);
    assert_eq!(target.writes("state"), vec![Value::Int(1)]);

    tree.advance(&scene, 0.5);
    assert_eq!(target.writes("state"), vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn seeking_applies_the_nearest_discrete_key_only() {
    let mut scene = MockScene::new();
    let player = MockPlayer::new("Root");
    player.add_animation(clip(
        "states",
        1.0,
        false,
        vec![discrete_track(
            "Enemy/Mesh.state",
            vec![
                (0.25, Value::Int(1)),
                (0.5, Value::Int(2)),
                (0.75, Value::Int(3)),
            ],
        )],
    ));
    scene.add_player("Player", player);
    scene.add_target("Root", MockTarget::new());
    let target = MockTarget::new();
    scene.add_target("Enemy/Mesh", target.clone());

    let mut tree = tree_with(seekable_clip_root("states"));
    tree.advance(&scene, 0.0);
    assert!(target.writes("state").is_empty());

    tree.set_property("parameters/seek/seek_position", Value::Float(0.6));
    tree.advance(&scene, 0.0);
    assert_eq!(target.writes("state"), vec![Value::Int(2)]);
}

#[test]
fn method_keys_queue_deferred_calls() {
    let mut scene = MockScene::new();
    let player = MockPlayer::new("Root");
    player.add_animation(clip(
        "attack",
        1.0,
        false,
        vec![method_track(
            "Turret",
            vec![(0.3, "fire", vec![Value::Int(3), Value::Text("ap".into())])],
        )],
    ));
    scene.add_player("Player", player);
    scene.add_target("Root", MockTarget::new());
    scene.add_target("Turret", MockTarget::new());

    let mut tree = tree_with(single_clip_root("attack"));
    tree.advance(&scene, 0.5);

    let calls = tree.take_deferred_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, path("Turret"));
    assert_eq!(calls[0].method, "fire");
    assert_eq!(calls[0].args, vec![Value::Int(3), Value::Text("ap".into())]);

    // the queue drains on take and the key does not replay
    assert!(tree.take_deferred_calls().is_empty());
    tree.advance(&scene, 0.2);
    assert!(tree.take_deferred_calls().is_empty());
}

#[test]
fn trimmed_audio_stops_exactly_once() {
    let mut scene = MockScene::new();
    let player = MockPlayer::new("Root");
    player.add_animation(clip(
        "bang",
        2.0,
        false,
        vec![audio_track(
            "Speaker",
            vec![AudioKey {
                time: 0.25,
                clip: Some("shot".to_string()),
                length: 1.0,
                start_offset: 0.1,
                end_offset: 0.2,
            }],
        )],
    ));
    scene.add_player("Player", player);
    scene.add_target("Root", MockTarget::new());
    let audio = MockAudio::new();
    scene.add_target("Speaker", audio.clone());

    let mut tree = tree_with(single_clip_root("bang"));
    tree.advance(&scene, 0.5);
    assert_eq!(
        audio.events(),
        vec![
            AudioEvent::Clip("shot".to_string()),
            AudioEvent::Play(0.1)
        ]
    );
    assert!(audio.gain_db().abs() < 1e-4);

    // trimmed length is 1.0 - 0.1 - 0.2; it elapses between these frames
    tree.advance(&scene, 0.5);
    assert_eq!(audio.stop_count(), 0);
    tree.advance(&scene, 0.5);
    assert_eq!(audio.stop_count(), 1);
    tree.advance(&scene, 0.5);
    assert_eq!(audio.stop_count(), 1);
}

#[test]
fn nested_players_follow_play_and_stop_keys() {
    let mut scene = MockScene::new();
    let player = MockPlayer::new("Root");
    player.add_animation(clip(
        "scene",
        2.0,
        false,
        vec![animation_track(
            "Nested",
            vec![(0.25, Some("walk")), (1.0, None)],
        )],
    ));
    scene.add_player("Player", player);
    scene.add_target("Root", MockTarget::new());
    let nested = MockNestedPlayer::new(&[("walk", 1.0, false)]);
    scene.add_target("Nested", nested.clone());

    let mut tree = tree_with(seekable_clip_root("scene"));
    tree.advance(&scene, 0.5);
    assert_eq!(nested.events(), vec![NestedEvent::Play("walk".to_string())]);

    tree.advance(&scene, 0.6);
    assert_eq!(
        nested.events(),
        vec![
            NestedEvent::Play("walk".to_string()),
            NestedEvent::Stop
        ]
    );

    // seeking into a play key while stopped assigns and positions the
    // nested clip without starting playback
    tree.set_property("parameters/seek/seek_position", Value::Float(0.5));
    tree.advance(&scene, 0.0);
    assert_eq!(
        nested.events(),
        vec![
            NestedEvent::Play("walk".to_string()),
            NestedEvent::Stop,
            NestedEvent::Assigned("walk".to_string()),
            NestedEvent::Seek(0.25, true),
        ]
    );
}

#[test]
fn unknown_nested_animations_stop_playback() {
    let mut scene = MockScene::new();
    let player = MockPlayer::new("Root");
    player.add_animation(clip(
        "scene",
        2.0,
        false,
        vec![animation_track(
            "Nested",
            vec![(0.25, Some("walk")), (1.0, Some("missing"))],
        )],
    ));
    scene.add_player("Player", player);
    scene.add_target("Root", MockTarget::new());
    let nested = MockNestedPlayer::new(&[("walk", 1.0, false)]);
    scene.add_target("Nested", nested.clone());

    let mut tree = tree_with(single_clip_root("scene"));
    tree.advance(&scene, 0.5);
    tree.advance(&scene, 0.6);
    assert_eq!(
        nested.events(),
        vec![
            NestedEvent::Play("walk".to_string()),
            NestedEvent::Stop
        ]
    );
}
