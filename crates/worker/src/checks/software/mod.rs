pub(crate) mod docker;
pub(crate) mod port;
