//! Scenecast turns an ordered list of narrated scenes into an audible preview or a finished MP4.
//!
//! The pieces:
//!
//! - A [`Project`] holds the scenes; a [`Workspace`] owns the current one.
//! - A [`SceneSequencer`] walks scenes strictly in order, one traversal at a time per project.
//! - A [`NarrationSynthesizer`] speaks (preview) or synthesizes (render) each scene's text.
//! - A [`FrameCompositor`] draws one scene (image or style gradient, tint, caption) per frame.
//! - A [`StreamMuxer`] holds frames for each scene's dwell and lays narration and music under them.
//! - A [`RenderOrchestrator`] drives the whole render and reports progress; [`Studio`] wraps it
//!   together with preview.
#![forbid(unsafe_code)]

mod foundation;

pub(crate) mod assets;
pub(crate) mod audio;
pub(crate) mod compose;
/// Engine configuration.
pub mod config;
pub(crate) mod encode;
pub(crate) mod model;
pub(crate) mod narration;
pub(crate) mod render;
pub(crate) mod script;
pub(crate) mod sequence;
mod studio;

pub use crate::foundation::core::{Fps, FrameRGBA, ProgressUpdate, Resolution};
pub use crate::foundation::error::{ReelError, ReelResult};

pub use crate::assets::decode::{PreparedImage, cover_fit, decode_image, prepare_image};
pub use crate::assets::media::{
    AudioPcm, MIX_SAMPLE_RATE, decode_audio_f32_stereo, is_ffmpeg_on_path, read_wav, write_wav,
};
pub use crate::assets::music::{MusicCatalog, MusicTrack};
pub use crate::assets::source::{FsImageSource, HttpImageSource, ImageSource, RoutingImageSource};
pub use crate::compose::caption::{
    CaptionColors, CaptionLayout, CaptionRenderer, caption_region, estimated_advance, layout_caption,
};
pub use crate::compose::compositor::{FrameCompositor, write_png};
pub use crate::compose::style::StylePalette;
pub use crate::config::{EngineConfig, SpeechConfig};
pub use crate::encode::ffmpeg::{FfmpegMuxer, FfmpegMuxerOpts};
pub use crate::encode::muxer::{Artifact, InMemoryMuxer, MuxConfig, StreamMuxer};
pub use crate::model::project::{Project, ProjectSnapshot, ProjectStatus, StyleTag};
pub use crate::model::scene::{SCENE_MAX_SECS, SCENE_MIN_SECS, Scene, SceneId, clamp_scene_duration};
pub use crate::model::workspace::{ProjectHandle, Workspace};
pub use crate::narration::command::CommandSynthesizer;
pub use crate::narration::scripted::{ScriptedSynthesizer, SpeechEvent};
pub use crate::narration::synth::{NarrationSynthesizer, SpeechEnd, Utterance};
pub use crate::narration::voice::{VoiceCatalog, VoiceInfo, VoiceType};
pub use crate::render::capture::{CaptureStats, CaptureVisitor};
pub use crate::render::orchestrator::RenderOrchestrator;
pub use crate::script::generators::{
    ImageFill, ImageGenerator, ScriptGenerator, populate_scene_images,
};
pub use crate::script::parse::{SceneDraft, estimate_duration, parse_script};
pub use crate::sequence::clock::{Clock, TokioClock};
pub use crate::sequence::preview::{PreviewEvent, PreviewVisitor, SPEECH_GRACE};
pub use crate::sequence::sequencer::{
    SceneSequencer, SceneVisitor, SequencerState, Traversal, TraversalOutcome, TraversalReport,
    Visit, VisitContext,
};
pub use crate::studio::Studio;
