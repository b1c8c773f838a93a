pub(crate) mod caption;
pub(crate) mod compositor;
pub(crate) mod style;
