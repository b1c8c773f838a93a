use serde::{Deserialize, Serialize};

/// Requested voice register. A request, not a guarantee: synthesizers substitute the closest
/// available voice without failing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceType {
    Female,
    Male,
    #[default]
    Neutral,
}

impl VoiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
            Self::Neutral => "neutral",
        }
    }
}

impl std::str::FromStr for VoiceType {
    type Err = crate::foundation::error::ReelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "female" => Ok(Self::Female),
            "male" => Ok(Self::Male),
            "neutral" => Ok(Self::Neutral),
            other => Err(crate::foundation::error::ReelError::validation(format!(
                "unknown voice type '{other}' (expected female, male or neutral)"
            ))),
        }
    }
}

/// One voice offered by a synthesizer backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceInfo {
    /// Backend-specific identifier passed back to the synthesizer.
    pub id: String,
    /// Register, when the backend reports one.
    pub register: Option<VoiceType>,
}

impl VoiceInfo {
    pub fn new(id: impl Into<String>, register: Option<VoiceType>) -> Self {
        Self {
            id: id.into(),
            register,
        }
    }
}

/// Voices available on the current platform. May be empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoiceCatalog {
    voices: Vec<VoiceInfo>,
}

impl VoiceCatalog {
    pub fn new(voices: Vec<VoiceInfo>) -> Self {
        Self { voices }
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn voices(&self) -> &[VoiceInfo] {
        &self.voices
    }

    /// Best available voice for `requested`: same register, else a neutral voice, else the first
    /// voice. `None` means "use the engine default".
    pub fn best_match(&self, requested: VoiceType) -> Option<&VoiceInfo> {
        self.voices
            .iter()
            .find(|v| v.register == Some(requested))
            .or_else(|| {
                self.voices
                    .iter()
                    .find(|v| v.register == Some(VoiceType::Neutral) || v.register.is_none())
            })
            .or_else(|| self.voices.first())
    }
}
