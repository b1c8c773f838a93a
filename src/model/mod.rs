pub(crate) mod project;
pub(crate) mod scene;
pub(crate) mod workspace;
