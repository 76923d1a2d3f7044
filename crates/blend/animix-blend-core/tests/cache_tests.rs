//! Track cache lifecycle: player binding, epoch invalidation, dead
//! targets and the split between configuration and evaluation failures.

use animix_blend_core::{AnimationTree, BlendNode, NodeHandle, TrackPath, Value};
use animix_test_fixtures::*;

fn approx(a: f32, b: f32) {
    assert!((a - b).abs() < 1e-4, "expected {b}, got {a}");
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

fn tree_with(root: NodeHandle) -> AnimationTree {
    let mut tree = AnimationTree::new();
    tree.set_root(Some(root));
    tree.set_player_path(Some(TrackPath::parse("Player").unwrap()));
    tree.set_active(true);
    tree
}

#[test]
fn unresolvable_player_is_a_config_error_not_an_invalid_state() {
    let scene = MockScene::new();
    let mut tree = tree_with(single_clip_root("walk"));
    tree.advance(&scene, 0.1);

    assert!(!tree.is_active());
    assert!(tree.config_error().unwrap().contains("not found"));
    assert!(!tree.is_state_invalid());
}

#[test]
fn missing_root_node_is_a_config_error() {
    let mut tree = AnimationTree::new();
    tree.set_player_path(Some(TrackPath::parse("Player").unwrap()));
    tree.set_active(true);
    tree.advance(&MockScene::new(), 0.1);
    assert!(!tree.is_active());
    assert!(tree.config_error().unwrap().contains("root"));
}

#[test]
fn missing_animation_invalidates_the_pass_but_not_the_tree() {
    let mut scene = MockScene::new();
    let player = MockPlayer::new("Root");
    player.add_animation(clip(
        "walk",
        1.0,
        false,
        vec![float_track("Enemy/Mesh.energy", &[(0.0, 1.0), (1.0, 1.0)])],
    ));
    scene.add_player("Player", player.clone());
    scene.add_target("Root", MockTarget::new());
    let target = MockTarget::new();
    scene.add_target("Enemy/Mesh", target.clone());

    let mut tree = tree_with(single_clip_root("ghost"));
    tree.advance(&scene, 0.1);

    // the pass is discarded, nothing reaches the target, the tree stays on
    assert!(tree.is_state_invalid());
    assert!(tree.invalid_state_reason().contains("ghost"));
    assert!(tree.is_active());
    assert!(tree.config_error().is_none());
    assert!(target.value("energy").is_none());

    // adding the clip heals the next pass
    player.add_animation(clip(
        "ghost",
        1.0,
        false,
        vec![float_track("Enemy/Mesh.energy", &[(0.0, 2.0), (1.0, 2.0)])],
    ));
    player.bump_epoch();
    tree.advance(&scene, 0.1);
    assert!(!tree.is_state_invalid());
    match target.value("energy") {
        Some(Value::Float(v)) => approx(v, 2.0),
        other => panic!("unexpected energy: {other:?}"),
    }
}

#[test]
fn epoch_bump_rebuilds_caches_and_stops_playing_audio() {
    use animix_blend_core::AudioKey;

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
                length: 10.0,
                start_offset: 0.0,
                end_offset: 0.0,
            }],
        )],
    ));
    scene.add_player("Player", player.clone());
    scene.add_target("Root", MockTarget::new());
    let audio = MockAudio::new();
    scene.add_target("Speaker", audio.clone());

    let mut tree = tree_with(single_clip_root("bang"));
    tree.advance(&scene, 0.5);
    assert_eq!(
        audio.events(),
        vec![
            AudioEvent::Clip("shot".to_string()),
            AudioEvent::Play(0.0)
        ]
    );

    // an untrimmed clip never times out on its own
    tree.advance(&scene, 0.5);
    assert_eq!(audio.stop_count(), 0);

    player.bump_epoch();
    tree.advance(&scene, 0.5);
    assert_eq!(audio.stop_count(), 1);
}

#[test]
fn deactivating_the_tree_stops_playing_audio() {
    use animix_blend_core::AudioKey;

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
                length: 10.0,
                start_offset: 0.0,
                end_offset: 0.0,
            }],
        )],
    ));
    scene.add_player("Player", player);
    scene.add_target("Root", MockTarget::new());
    let audio = MockAudio::new();
    scene.add_target("Speaker", audio.clone());

    let mut tree = tree_with(single_clip_root("bang"));
    tree.advance(&scene, 0.5);
    assert_eq!(audio.stop_count(), 0);
    tree.set_active(false);
    assert_eq!(audio.stop_count(), 1);
}

#[test]
fn dead_targets_are_skipped_then_swept() {
    let mut scene = MockScene::new();
    let player = MockPlayer::new("Root");
    player.add_animation(clip(
        "walk",
        1.0,
        false,
        vec![
            float_track("Gone.energy", &[(0.0, 1.0), (1.0, 1.0)]),
            float_track("Kept.energy", &[(0.0, 2.0), (1.0, 2.0)]),
        ],
    ));
    scene.add_player("Player", player.clone());
    scene.add_target("Root", MockTarget::new());
    scene.add_target("Gone", MockTarget::new());
    let kept = MockTarget::new();
    scene.add_target("Kept", kept.clone());

    let mut tree = tree_with(single_clip_root("walk"));
    tree.advance(&scene, 0.1);

    // drop the only strong reference to one target
    scene.remove_target("Gone");
    tree.advance(&scene, 0.1);
    assert!(tree.is_active());
    assert!(!tree.is_state_invalid());
    assert_eq!(kept.writes("energy").len(), 2);

    // a rebuild sweeps the dead entry without disturbing the survivor
    player.bump_epoch();
    tree.advance(&scene, 0.1);
    assert!(!tree.is_state_invalid());
    assert_eq!(kept.writes("energy").len(), 3);
}

#[test]
fn rebinding_the_player_path_resets_the_cache() {
    let mut scene = MockScene::new();
    for p in ["PlayerA", "PlayerB"] {
        let player = MockPlayer::new("Root");
        player.add_animation(clip(
            "walk",
            1.0,
            false,
            vec![float_track("Enemy/Mesh.energy", &[(0.0, 1.0), (1.0, 1.0)])],
        ));
        scene.add_player(p, player);
    }
    scene.add_target("Root", MockTarget::new());
    let target = MockTarget::new();
    scene.add_target("Enemy/Mesh", target.clone());

    let mut tree = AnimationTree::new();
    tree.set_root(Some(single_clip_root("walk")));
    tree.set_player_path(Some(TrackPath::parse("PlayerA").unwrap()));
    tree.set_active(true);
    tree.advance(&scene, 0.1);
    let before = target.writes("energy").len();
    assert!(before > 0);

    tree.set_player_path(Some(TrackPath::parse("PlayerB").unwrap()));
    tree.advance(&scene, 0.1);
    assert!(tree.is_active());
    assert!(target.writes("energy").len() > before);
}

#[test]
fn unresolvable_tracks_are_skipped_with_the_rest_committed() {
    let mut scene = MockScene::new();
    let player = MockPlayer::new("Root");
    player.add_animation(clip(
        "walk",
        1.0,
        false,
        vec![
            float_track("Nowhere.energy", &[(0.0, 1.0), (1.0, 1.0)]),
            float_track("Enemy/Mesh.energy", &[(0.0, 3.0), (1.0, 3.0)]),
        ],
    ));
    scene.add_player("Player", player.clone());
    scene.add_target("Root", MockTarget::new());
    let target = MockTarget::new();
    scene.add_target("Enemy/Mesh", target.clone());

    let mut tree = tree_with(single_clip_root("walk"));
    tree.advance(&scene, 0.1);

    assert!(tree.is_active());
    assert!(!tree.is_state_invalid());
    match target.value("energy") {
        Some(Value::Float(v)) => approx(v, 3.0),
        other => panic!("unexpected energy: {other:?}"),
    }
}
