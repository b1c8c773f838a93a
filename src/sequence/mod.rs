pub(crate) mod clock;
pub(crate) mod preview;
pub(crate) mod sequencer;
