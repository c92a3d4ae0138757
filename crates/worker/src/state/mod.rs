pub(crate) mod controller;

pub(crate) use controller::{StateController, SyncError};
