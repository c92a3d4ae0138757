pub(crate) mod heartbeat;
