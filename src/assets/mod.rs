pub(crate) mod decode;
pub(crate) mod media;
pub(crate) mod music;
pub(crate) mod source;
