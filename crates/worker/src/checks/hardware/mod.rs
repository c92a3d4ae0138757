pub(crate) mod gpu;
pub(crate) mod probe;
pub(crate) mod score;

pub(crate) use probe::HardwareProbe;
