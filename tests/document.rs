use image::{Rgba, RgbaImage};
use pixelframe::io::{AnimationCodec, AnimationFrame};
use pixelframe::ops::Transform;
use pixelframe::{EditorError, Frame, Layer, Pos, Project, Result};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Hands back a fixed frame list regardless of input bytes.
struct FixedFrames(Vec<AnimationFrame>);

impl AnimationCodec for FixedFrames {
    fn decode_sequence(&self, _bytes: &[u8]) -> Result<Vec<AnimationFrame>> {
        Ok(self.0.clone())
    }

    fn encode_sequence(&self, _frames: &[RgbaImage], _fps: f32) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

fn sample_layer() -> Layer {
    let mut layer = Layer::new("sample", 5, 3);
    for (i, pos) in layer.coords().collect::<Vec<_>>().into_iter().enumerate() {
        let v = (i * 17) as u8;
        layer.set_pixel(pos, Rgba([v, 255 - v, v / 2, 200])).unwrap();
    }
    layer
}

fn every_transform() -> Vec<Transform> {
    vec![
        Transform::FlipVertical,
        Transform::FlipHorizontal,
        Transform::Invert,
        Transform::Grayscale,
        Transform::RotateLeft,
        Transform::RotateRight,
        Transform::FloodFill {
            origin: Pos::new(0, 0),
            color: RED,
        },
    ]
}

#[test]
fn undo_restores_the_state_before_each_transform() {
    for t in every_transform() {
        let mut layer = sample_layer();
        let before = layer.buffer().clone();
        layer.apply_transform(t).unwrap();
        assert!(layer.undo(), "{}", t.name());
        assert_eq!(layer.buffer(), &before, "{}", t.name());
    }
}

#[test]
fn redo_restores_the_state_after_each_transform() {
    for t in every_transform() {
        let mut layer = sample_layer();
        layer.apply_transform(t).unwrap();
        let after = layer.buffer().clone();
        layer.undo();
        assert!(layer.redo(), "{}", t.name());
        assert_eq!(layer.buffer(), &after, "{}", t.name());
    }
}

#[test]
fn new_transform_after_undo_drops_redo() {
    let mut layer = sample_layer();
    layer.invert().unwrap();
    layer.undo();
    layer.flip_vertical().unwrap();
    let current = layer.buffer().clone();
    assert!(!layer.redo());
    assert_eq!(layer.buffer(), &current);
}

#[test]
fn flips_and_invert_are_involutions() {
    for t in [Transform::FlipHorizontal, Transform::FlipVertical, Transform::Invert] {
        let mut layer = sample_layer();
        let original = layer.buffer().clone();
        layer.apply_transform(t).unwrap();
        layer.apply_transform(t).unwrap();
        assert_eq!(layer.buffer(), &original, "{}", t.name());
    }
}

#[test]
fn four_rotations_are_identity_on_square_layers() {
    let mut layer = Layer::new("sq", 3, 3);
    layer.set_pixel(Pos::new(0, 0), RED).unwrap();
    layer.set_pixel(Pos::new(2, 1), BLUE).unwrap();
    let original = layer.buffer().clone();
    for _ in 0..4 {
        layer.rotate_right().unwrap();
    }
    assert_eq!(layer.buffer(), &original);
}

#[test]
fn merging_under_a_transparent_top_keeps_the_bottom() {
    let mut frame = Frame::new("f", 3, 3);
    frame.new_layer().load_image(&sample_layer().export_image());
    let bottom = frame.layer(1).unwrap().buffer().clone();
    frame.merge_layer_down(0).unwrap();
    assert_eq!(frame.layer_count(), 1);
    assert_eq!(frame.layer(0).unwrap().buffer(), &bottom);
}

#[test]
fn promote_top_and_demote_bottom_change_nothing() {
    let mut frame = Frame::new("f", 2, 2);
    frame.new_layer().set_id("bottom");
    frame.layer_mut(0).unwrap().set_id("top");
    frame.promote_layer(0).unwrap();
    frame.demote_layer(1).unwrap();
    let ids: Vec<_> = frame.layers().iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["top", "bottom"]);

    let mut project = Project::new(2, 2);
    project.new_frame().set_id("last");
    project.promote_frame(0).unwrap();
    project.demote_frame(1).unwrap();
    assert_eq!(project.frame(1).unwrap().id, "last");
}

#[test]
fn single_red_pixel_composite() {
    let mut project = Project::new(4, 4);
    project
        .selected_frame_mut()
        .unwrap()
        .selected_layer_mut()
        .unwrap()
        .set_pixel(Pos::new(0, 0), RED)
        .unwrap();

    let frames = project.export_animation_frames().unwrap();
    assert_eq!(frames.len(), 1);
    let img = &frames[0];
    assert_eq!(img.dimensions(), (4, 4));
    for (x, y, px) in img.enumerate_pixels() {
        let want = if (x, y) == (0, 0) { RED } else { CLEAR };
        assert_eq!(*px, want, "pixel ({x}, {y})");
    }
}

#[test]
fn copied_frame_is_independent() {
    let mut project = Project::new(3, 3);
    project.frame_mut(0).unwrap().new_layer();
    project.frame_mut(0).unwrap().layer_mut(1).unwrap().set_pixel(Pos::new(1, 1), GREEN).unwrap();

    project.copy_frame(0).unwrap();
    let copy = project.frame_mut(1).unwrap();
    assert_eq!(copy.layer_count(), 2);
    assert_eq!(copy.layer(1).unwrap().get_pixel(Pos::new(1, 1)).unwrap(), GREEN);
    copy.layer_mut(1).unwrap().flood_fill(Pos::new(0, 0), BLUE).unwrap();
    copy.layer_mut(0).unwrap().invert().unwrap();

    let original = project.frame(0).unwrap();
    assert_eq!(original.layer(1).unwrap().get_pixel(Pos::new(0, 0)).unwrap(), CLEAR);
    assert!(original.layer(0).unwrap().buffer().is_fully_transparent());
}

#[test]
fn importing_three_frames_replaces_the_sequence() {
    let colours = [RED, GREEN, BLUE];
    let codec = FixedFrames(
        colours
            .iter()
            .map(|&c| AnimationFrame {
                image: RgbaImage::from_pixel(4, 4, c),
                delay_ms: 100,
            })
            .collect(),
    );
    let mut project = Project::new(4, 4);
    project.new_frame();

    assert_eq!(project.import_animation(&codec, b"ignored").unwrap(), 3);
    assert_eq!(project.frame_count(), 3);
    for (frame, colour) in project.frames().iter().zip(colours) {
        assert_eq!(frame.layer_count(), 1);
        assert_eq!(frame.export_composite_image().unwrap(), RgbaImage::from_pixel(4, 4, colour));
    }
}

#[test]
fn blue_over_green_merges_to_blue() {
    let mut frame = Frame::empty("f", 2, 2);
    frame.new_layer().flood_fill(Pos::new(0, 0), BLUE).unwrap();
    frame.new_layer().flood_fill(Pos::new(0, 0), GREEN).unwrap();
    frame.merge_layer_down(0).unwrap();

    assert_eq!(frame.layer_count(), 1);
    let merged = frame.layer(0).unwrap();
    assert!(merged.coords().all(|p| merged.get_pixel(p).unwrap() == BLUE));
}

#[test]
fn errors_carry_their_context() {
    let mut layer = Layer::new("l", 2, 2);
    match layer.set_pixel(Pos::new(2, 0), RED) {
        Err(EditorError::OutOfBounds { x, y, width, height }) => assert_eq!((x, y, width, height), (2, 0, 2, 2)),
        other => panic!("unexpected {other:?}"),
    }
    let frame = Frame::empty("f", 2, 2);
    assert!(matches!(frame.layer(0), Err(EditorError::NoSuchLayer { index: 0, len: 0 })));
}
