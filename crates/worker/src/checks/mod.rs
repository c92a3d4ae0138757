pub(crate) mod hardware;
pub(crate) mod issue;
pub(crate) mod software;
