//! Small application wired through a [`Container`]: a logger, settings
//! derived from configuration, a server that needs both, and an optional
//! metrics sink. Used by the `stagehand` binary.

use crate::component::Registration;
use crate::config::StagehandConfig;
use crate::container::Container;
use crate::error::Result;
use crate::execution::Execution;
use crate::lifecycle::State;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::info;

/// Collects application log lines
#[derive(Debug, Default)]
pub struct Logger {
    lines: Mutex<Vec<String>>,
}

impl Logger {
    pub fn log<S: Into<String>>(&self, line: S) {
        let line = line.into();
        info!(target: "stagehand::demo", "{}", line);
        self.lines.lock().push(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub app_name: String,
    pub bind_ip: String,
    pub port: u16,
}

impl Settings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_ip, self.port)
    }
}

#[derive(Debug)]
pub struct Server {
    address: String,
    listening: AtomicBool,
}

impl Server {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct Metrics {
    servers: AtomicU64,
}

impl Metrics {
    pub fn servers_started(&self) -> u64 {
        self.servers.load(Ordering::SeqCst)
    }
}

/// Register the demo components and their executions
pub fn build_demo_container(config: &StagehandConfig) -> Result<Container> {
    let mut container = Container::with_config(config.container.clone());

    let demo = config.demo.clone();
    container.register_instance(Logger::default())?;
    container.register(Registration::new(move |_| {
        Ok(Settings {
            app_name: demo.app_name,
            bind_ip: demo.bind_ip,
            port: demo.port,
        })
    }))?;
    container.register(
        Registration::new(|resolver| {
            let settings = resolver.resolve::<Settings>()?;
            Ok(Server {
                address: settings.address(),
                listening: AtomicBool::new(false),
            })
        })
        .requires::<Settings>(),
    )?;
    if config.demo.metrics {
        container.register_instance(Metrics::default())?;
    }

    container.declare(
        Execution::on::<Logger>(State::Created)
            .label("logger.open")
            .with_callback(|logger| {
                logger.log("logger ready");
                Ok(())
            })?,
    )?;

    container.declare(
        Execution::on::<Settings>(State::Resolved)
            .label("settings.check")
            .with_dependency::<Logger>(State::Created)
            .with_callback(|settings, logger| {
                if settings.port == 0 {
                    return Err("port must be greater than 0".into());
                }
                logger.log(format!("settings loaded for {}", settings.app_name));
                Ok(())
            })?,
    )?;

    container.declare(
        Execution::on::<Server>(State::Created)
            .label("server.wire")
            .with_dependency::<Settings>(State::Resolved)
            .with_dependency::<Logger>(State::Created)
            .with_callback(|server, settings, logger| {
                logger.log(format!(
                    "server for {} wired to {}",
                    settings.app_name, server.address
                ));
                Ok(())
            })?,
    )?;

    container.declare(
        Execution::on::<Server>(State::Started)
            .label("server.listen")
            .with_dependency::<Logger>(State::Started)
            .with_optional_dependency::<Metrics>(State::Started)
            .with_callback(|server, logger, metrics| {
                server.listening.store(true, Ordering::SeqCst);
                if let Some(metrics) = metrics {
                    metrics.servers.fetch_add(1, Ordering::SeqCst);
                }
                logger.log(format!("listening on {}", server.address));
                Ok(())
            })?,
    )?;

    if config.demo.metrics {
        container.declare(
            Execution::on::<Metrics>(State::Started)
                .label("metrics.announce")
                .with_dependency::<Logger>(State::Started)
                .with_callback(|_, logger| {
                    logger.log("metrics enabled");
                    Ok(())
                })?,
        )?;
    }

    container.declare(
        Execution::on::<Server>(State::Stopped)
            .label("server.close")
            .with_dependency::<Logger>(State::Created)
            .with_callback(|server, logger| {
                server.listening.store(false, Ordering::SeqCst);
                logger.log(format!("closed {}", server.address));
                Ok(())
            })?,
    )?;

    container.declare(
        Execution::on::<Logger>(State::Stopped)
            .label("logger.flush")
            .with_callback(|logger| {
                logger.log("logger flushed");
                Ok(())
            })?,
    )?;

    Ok(container)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StagehandError;

    #[test]
    fn test_demo_starts_and_stops() {
        let config = StagehandConfig::default();
        let mut container = build_demo_container(&config).unwrap();

        let report = container.start().unwrap();
        assert!(report.skipped.is_empty());

        let server = container.get::<Server>().unwrap();
        assert!(server.is_listening());
        assert_eq!(server.address(), "127.0.0.1:8080");
        assert!(container.get::<Metrics>().is_none());

        let logger = container.get::<Logger>().unwrap();
        assert_eq!(
            logger.lines(),
            vec![
                "logger ready",
                "settings loaded for stagehand-demo",
                "server for stagehand-demo wired to 127.0.0.1:8080",
                "listening on 127.0.0.1:8080",
            ]
        );

        let teardown = container.stop().unwrap();
        assert_eq!(teardown.stopped(), &["Server", "Settings", "Logger"]);
        assert!(!server.is_listening());
        assert_eq!(logger.lines().last().map(String::as_str), Some("logger flushed"));
    }

    #[test]
    fn test_demo_with_metrics() {
        let mut config = StagehandConfig::default();
        config.demo.metrics = true;
        let mut container = build_demo_container(&config).unwrap();

        container.start().unwrap();

        let metrics = container.get::<Metrics>().unwrap();
        assert_eq!(metrics.servers_started(), 1);
        let lines = container.get::<Logger>().unwrap().lines();
        assert!(lines.contains(&"metrics enabled".to_string()));
    }

    #[test]
    fn test_demo_rejects_port_zero() {
        let mut config = StagehandConfig::default();
        config.demo.port = 0;
        let mut container = build_demo_container(&config).unwrap();

        assert!(matches!(
            container.start(),
            Err(StagehandError::ExecutionFailed { .. })
        ));
    }
}
