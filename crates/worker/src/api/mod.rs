pub(crate) mod routes;
pub(crate) mod server;

pub(crate) use server::DispatchGateway;
