//! Animation baking and the event timeline.
//!
//! Every Trainz bone is sampled at each integer frame of the scene range.
//! Events come from a free text block named `events`, one per line:
//!
//! ```text
//! <frame> <type> <trigger text>
//! 5 Sound_whistle blow horn
//! ```
//!
//! Frames are relative to the first exported frame.

use super::hierarchy::Skeleton;
use crate::diagnostics::Diagnostics;
use crate::scene::SceneSource;
use crate::types::Transform;
use glam::{Quat, Vec3};
use std::fmt;
use std::str::FromStr;

/// Name of the text block holding the event list, compared case-insensitively.
pub const EVENT_TEXT_BLOCK: &str = "events";

/// Bone pose at one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyFrame {
    pub position: Vec3,
    pub rotation: Quat,
}

impl From<Transform> for KeyFrame {
    fn from(transform: Transform) -> Self {
        Self {
            position: transform.translation,
            rotation: transform.rotation,
        }
    }
}

/// Keyframes of one bone, one per sampled frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationTrack {
    pub bone: usize,
    pub name: String,
    pub keys: Vec<KeyFrame>,
}

/// Event types known to Trainz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Sound,
    SoundSync,
    Sync,
    System3d,
    Generic,
    Effect,
    Attach,
    Detach,
    Transfer,
    AnimComplete,
    LoopComplete,
    Destroyed,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::Sound,
        EventKind::SoundSync,
        EventKind::Sync,
        EventKind::System3d,
        EventKind::Generic,
        EventKind::Effect,
        EventKind::Attach,
        EventKind::Detach,
        EventKind::Transfer,
        EventKind::AnimComplete,
        EventKind::LoopComplete,
        EventKind::Destroyed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Sound => "sound",
            EventKind::SoundSync => "soundsync",
            EventKind::Sync => "sync",
            EventKind::System3d => "3dsys",
            EventKind::Generic => "generic",
            EventKind::Effect => "effect",
            EventKind::Attach => "attach",
            EventKind::Detach => "detach",
            EventKind::Transfer => "transfer",
            EventKind::AnimComplete => "animcomplete",
            EventKind::LoopComplete => "loopcomplete",
            EventKind::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ();

    /// Case-insensitive; only the text before the first `_` counts, so
    /// `Sound_whistle` is a sound event.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        let base = lowered.split('_').next().unwrap_or_default();
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == base)
            .ok_or(())
    }
}

/// A timeline event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Frame relative to the first exported frame.
    pub frame: u32,
    pub kind: EventKind,
    pub trigger: String,
}

/// The baked animation of a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub frame_rate: u32,
    pub tracks: Vec<AnimationTrack>,
    pub events: Vec<Event>,
}

/// Parse an event list; invalid lines are dropped with a warning.
///
/// `last_frame` is the highest valid relative frame.
pub fn parse_events(text: &str, last_frame: i32, diagnostics: &mut Diagnostics) -> Vec<Event> {
    let mut events = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let number = index + 1;
        let ignore = |diagnostics: &mut Diagnostics, reason: &str| {
            diagnostics.warning(format!(
                "ignore event \"{}\" at line {}: {}",
                line, number, reason
            ));
        };

        let Some((frame, kind, trigger)) = split_event_line(line) else {
            ignore(diagnostics, "wrong format");
            continue;
        };
        let Ok(frame) = frame.parse::<i64>() else {
            ignore(diagnostics, "wrong format");
            continue;
        };
        if frame < 0 {
            ignore(diagnostics, "framenumber lower than first frame(0)");
            continue;
        }
        if frame > i64::from(last_frame) {
            ignore(
                diagnostics,
                &format!("framenumber higher than last frame({})", last_frame),
            );
            continue;
        }
        let Ok(kind) = kind.parse::<EventKind>() else {
            ignore(diagnostics, "unknown event type");
            continue;
        };
        events.push(Event {
            frame: frame as u32,
            kind,
            trigger: trigger.to_string(),
        });
    }
    events
}

/// Split `<frame> <type> <trigger…>`; the trigger keeps inner whitespace.
fn split_event_line(line: &str) -> Option<(&str, &str, &str)> {
    let line = line.trim();
    let (frame, rest) = line.split_once(char::is_whitespace)?;
    let (kind, trigger) = rest.trim_start().split_once(char::is_whitespace)?;
    let trigger = trigger.trim();
    if trigger.is_empty() {
        return None;
    }
    Some((frame, kind, trigger))
}

/// Read the event text block, if the scene has one.
pub fn scene_events<S: SceneSource + ?Sized>(
    scene: &S,
    diagnostics: &mut Diagnostics,
) -> Vec<Event> {
    let settings = scene.settings();
    let block = scene
        .text_blocks()
        .iter()
        .find(|t| t.name.to_lowercase() == EVENT_TEXT_BLOCK);
    match block {
        Some(block) => parse_events(
            &block.body,
            settings.frame_end - settings.frame_start,
            diagnostics,
        ),
        None => {
            diagnostics.info("no event text found, no events generated");
            Vec::new()
        }
    }
}

/// Transform of a bone at `frame`, in skeleton space.
pub fn bone_transform_at<S: SceneSource + ?Sized>(
    scene: &S,
    skeleton: &Skeleton,
    index: usize,
    frame: i32,
) -> Transform {
    let Some(bone) = skeleton.bones().get(index) else {
        return Transform::IDENTITY;
    };
    match bone.container {
        Some(container) => scene
            .world_transform_at(container, frame)
            .mul_transform(&scene.pose_transform_at(bone.node, frame)),
        None => scene.world_transform_at(bone.node, frame),
    }
}

/// Bake every bone over the scene frame range.
///
/// Returns `None` with a warning when there is nothing to animate.
pub fn bake<S: SceneSource + ?Sized>(
    scene: &S,
    skeleton: &Skeleton,
    diagnostics: &mut Diagnostics,
) -> Option<Animation> {
    if skeleton.is_empty() {
        diagnostics.warning("no Trainz Bones shall be exported, animation export skipped");
        return None;
    }
    if !scene.nodes().iter().any(|n| n.animation.is_animated()) {
        diagnostics.warning("no animation data found, animation export skipped");
        return None;
    }

    let settings = scene.settings();
    let frames = settings.frame_start..=settings.frame_end;
    let tracks: Vec<AnimationTrack> = (0..skeleton.len())
        .map(|index| AnimationTrack {
            bone: index,
            name: skeleton.name(scene, index),
            keys: frames
                .clone()
                .map(|frame| bone_transform_at(scene, skeleton, index, frame).into())
                .collect(),
        })
        .collect();
    tracing::info!(
        "baked {} tracks over frames {}..={}",
        tracks.len(),
        settings.frame_start,
        settings.frame_end
    );

    Some(Animation {
        frame_rate: settings.fps,
        tracks,
        events: scene_events(scene, diagnostics),
    })
}
