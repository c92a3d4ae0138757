pub(crate) mod admission;
pub(crate) mod docker;
pub(crate) mod result;
pub(crate) mod runner;

pub(crate) use admission::{AdmissionError, JobAdmission};
pub(crate) use docker::DockerRunner;
pub(crate) use runner::{SimulatedRunner, WorkloadRunner};
