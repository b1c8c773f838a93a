pub(crate) mod ffmpeg;
pub(crate) mod muxer;
