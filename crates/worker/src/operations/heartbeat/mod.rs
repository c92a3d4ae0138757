pub(crate) mod service;

pub(crate) use service::HeartbeatService;
