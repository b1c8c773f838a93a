use std::path::{Path, PathBuf};

use crate::assets::media::{AudioPcm, decode_audio_f32_stereo, read_wav};
use crate::foundation::error::{ReelError, ReelResult};

/// One entry of the built-in music catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MusicTrack {
    pub id: &'static str,
    pub title: &'static str,
}

const TRACKS: &[MusicTrack] = &[
    MusicTrack {
        id: "calm-piano",
        title: "Calm Piano",
    },
    MusicTrack {
        id: "upbeat-pop",
        title: "Upbeat Pop",
    },
    MusicTrack {
        id: "cinematic-strings",
        title: "Cinematic Strings",
    },
    MusicTrack {
        id: "lofi-beats",
        title: "Lo-fi Beats",
    },
    MusicTrack {
        id: "ambient-pads",
        title: "Ambient Pads",
    },
];

const EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "m4a"];

/// Fixed catalog of background tracks, stored as `<music_dir>/<id>.<ext>`.
#[derive(Clone, Debug)]
pub struct MusicCatalog {
    dir: PathBuf,
}

impl MusicCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn tracks() -> &'static [MusicTrack] {
        TRACKS
    }

    pub fn track(id: &str) -> ReelResult<MusicTrack> {
        TRACKS
            .iter()
            .copied()
            .find(|t| t.id == id)
            .ok_or_else(|| ReelError::validation(format!("unknown music track '{id}'")))
    }

    /// Path of the first existing file for `id`. Unknown ids are a validation error; a known id
    /// without a file resolves to the `.mp3` path so the decode step reports it.
    pub fn path_for(&self, id: &str) -> ReelResult<PathBuf> {
        let track = Self::track(id)?;
        let found = EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{}.{ext}", track.id)))
            .find(|p| p.is_file());
        Ok(found.unwrap_or_else(|| self.dir.join(format!("{}.mp3", track.id))))
    }

    /// Decode a track. WAV files are read directly, anything else goes through `ffmpeg`.
    ///
    /// Blocking.
    pub fn load(&self, id: &str, sample_rate: u32) -> ReelResult<AudioPcm> {
        let path = self.path_for(id)?;
        if is_wav(&path) {
            read_wav(&path)
        } else {
            decode_audio_f32_stereo(&path, sample_rate)
        }
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}
