//! Running the external indexer
//!
//! The indexer scans installed packages and rewrites the registry index
//! documents. plugix never parses packages itself; it only runs the indexer
//! and reloads what it wrote.

use crate::errors::RebuildError;
use plugix_config::Config;
use plugix_logger as logger;
use plugix_registry::IndexFormat;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Regenerates the registry index documents
pub trait IndexRebuilder: Send + Sync + fmt::Debug {
    /// Rewrite the documents; `Ok` means they are ready to be reloaded
    fn rebuild(&self) -> Result<(), RebuildError>;
}

/// Runs the indexer executable, `-s yaml|json` selecting the output format
#[derive(Debug, Clone)]
pub struct CommandRebuilder {
    program: PathBuf,
    args: Vec<String>,
    format: Option<IndexFormat>,
    timeout: Duration,
}

impl CommandRebuilder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandRebuilder {
            program: program.into(),
            args: Vec::new(),
            format: None,
            timeout: Duration::from_secs(plugix_config::DEFAULT_REBUILD_TIMEOUT_SECS),
        }
    }

    /// Indexer, output format and timeout from the configuration
    pub fn from_config(config: &Config) -> Result<Self, plugix_config::ConfigError> {
        let program = config.resolve_indexer()?;
        let format = config.get_index_format().and_then(|name| {
            let format = IndexFormat::from_name(name);
            if format.is_none() {
                warn!("Ignoring unknown index-format '{}'", name);
            }
            format
        });
        Ok(CommandRebuilder {
            program,
            args: Vec::new(),
            format,
            timeout: config.rebuild_timeout(),
        })
    }

    /// Extra argument placed before the format selection
    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn with_format(mut self, format: IndexFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(format) = self.format {
            command.arg("-s").arg(format.as_str());
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    fn display_name(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        if let Some(format) = self.format {
            parts.push(format!("-s {}", format.as_str()));
        }
        parts.join(" ")
    }

    /// Wait for the child, killing it once the timeout passes
    fn wait(&self, child: &mut Child, name: &str) -> Result<std::process::ExitStatus, RebuildError> {
        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if started.elapsed() >= self.timeout => {
                    warn!("Indexer '{}' exceeded {:?}, killing it", name, self.timeout);
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(RebuildError::TimedOut {
                        command: name.to_string(),
                        timeout: self.timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    return Err(RebuildError::Spawn {
                        command: name.to_string(),
                        source,
                    })
                }
            }
        }
    }
}

/// Drain a child pipe on its own thread so a chatty indexer never blocks
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        buffer
    })
}

impl IndexRebuilder for CommandRebuilder {
    fn rebuild(&self) -> Result<(), RebuildError> {
        let name = self.display_name();
        logger::debug(&format!("Running: {}", name));
        let spinner = logger::Spinner::start("Rebuilding plugin registry...");

        let mut child = match self.command().spawn() {
            Ok(child) => child,
            Err(source) => {
                spinner.fail("Failed to start the indexer");
                return Err(RebuildError::Spawn {
                    command: name,
                    source,
                });
            }
        };
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait(&mut child, &name);
        let output = status.as_ref().ok().map(|status| Output {
            status: *status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        });
        if let Some(output) = &output {
            logger::capture_output(&name, output);
        }

        match status {
            Ok(status) if status.success() => {
                spinner.success("Plugin registry rebuilt");
                debug!("Indexer '{}' finished", name);
                Ok(())
            }
            Ok(status) => {
                spinner.fail("Indexer failed");
                Err(RebuildError::Failed {
                    command: name,
                    status: status.code(),
                })
            }
            Err(err) => {
                spinner.fail("Indexer did not finish");
                Err(err)
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> CommandRebuilder {
        CommandRebuilder::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn test_successful_indexer() {
        let rebuilder = shell("echo indexed; exit 0").with_format(IndexFormat::Yaml);
        assert!(rebuilder.rebuild().is_ok());
        assert_eq!(rebuilder.display_name(), "sh -c echo indexed; exit 0 -s yaml");
    }

    #[test]
    fn test_failing_indexer_reports_exit_code() {
        let result = shell("echo broken >&2; exit 3").rebuild();
        assert!(matches!(result, Err(RebuildError::Failed { status: Some(3), .. })));
    }

    #[test]
    fn test_timeout_kills_indexer() {
        let started = Instant::now();
        let result = shell("sleep 5")
            .with_timeout(Duration::from_millis(200))
            .rebuild();
        assert!(matches!(result, Err(RebuildError::TimedOut { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_missing_program() {
        let result = CommandRebuilder::new("/nonexistent/plugix-indexer").rebuild();
        assert!(matches!(result, Err(RebuildError::Spawn { .. })));
    }
}
