pub(crate) mod generators;
pub(crate) mod parse;
