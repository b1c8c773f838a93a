pub(crate) mod command;
pub(crate) mod scripted;
pub(crate) mod synth;
pub(crate) mod voice;
