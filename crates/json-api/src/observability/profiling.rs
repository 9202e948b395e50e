//! Pyroscope profiling lifecycle.

use pyroscope::{
    backend::{BackendConfig, PprofConfig, pprof_backend},
    pyroscope::{PyroscopeAgent, PyroscopeAgentBuilder, PyroscopeAgentRunning},
};
use tracing::{error, info};

use crate::config::ServerConfig;

use super::ObservabilityError;

pub(super) struct Profiling {
    agent: Option<PyroscopeAgent<PyroscopeAgentRunning>>,
}

impl Profiling {
    pub(super) fn init(config: &ServerConfig) -> Result<Self, ObservabilityError> {
        let observability = &config.observability;
        let profiling = &observability.profiling;

        if !profiling.pyroscope_enabled {
            return Ok(Self { agent: None });
        }

        let service_name = observability.service_name.as_str();
        let service_version = observability.service_version.as_str();

        let backend = pprof_backend(
            PprofConfig {
                sample_rate: profiling.pyroscope_sample_rate,
            },
            BackendConfig::default(),
        );

        let agent = PyroscopeAgentBuilder::new(
            profiling.pyroscope_server_address.as_str(),
            service_name,
            profiling.pyroscope_sample_rate,
            "pyroscope-rs",
            service_version,
            backend,
        )
        .tags(vec![
            ("service.name", service_name),
            ("service.version", service_version),
            ("deployment.environment.name", observability.environment.as_str()),
        ])
        .build()?
        .start()?;

        info!(
            server = %profiling.pyroscope_server_address,
            "pyroscope profiling started"
        );

        Ok(Self { agent: Some(agent) })
    }

    pub(super) fn shutdown(self) {
        let Some(agent) = self.agent else {
            return;
        };

        match agent.stop() {
            Ok(ready) => ready.shutdown(),
            Err(source) => error!("failed to stop pyroscope agent: {source}"),
        }
    }
}
