use common::Telemetry;
use messaging::Producer;

/// Shared handles a service is constructed with.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub telemetry: Telemetry,
    pub producer: Producer,
}

impl ServiceContext {
    pub fn new(telemetry: Telemetry, producer: Producer) -> Self {
        Self {
            telemetry,
            producer,
        }
    }
}
