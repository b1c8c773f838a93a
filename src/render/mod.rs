pub(crate) mod capture;
pub(crate) mod orchestrator;
