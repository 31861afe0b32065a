// rust/worker-core/src/error.rs

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Remote calls a worker issues against the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCall {
    Startup,
    Progress,
    Update,
    Waiting,
    Fetch,
    Complete,
    MetricsReport,
}

impl RemoteCall {
    /// Wire name of the call as it appears in the master contract.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Progress => "progress",
            Self::Update => "update",
            Self::Waiting => "waiting",
            Self::Fetch => "fetch",
            Self::Complete => "complete",
            Self::MetricsReport => "metricsReport",
        }
    }
}

impl fmt::Display for RemoteCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {

    #[error("Unable to connect to master at '{address}': {message}")]
    Connection {
        address: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A master call faulted. `description` is set when the master replied
    /// with a structured service error rather than a transport fault.
    #[error("Remote call '{call}' failed: {message}")]
    Remote {
        call: RemoteCall,
        message: String,
        description: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Protocol violation: {message}")]
    Protocol {
        message: String,
    },

    #[error("Gave up waiting on master update after {waited_ms}ms")]
    WaitTimeout {
        waited_ms: u64,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Input error at '{path}': {message}")]
    Input {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
    },

    #[error("Compute error: {message}")]
    Compute {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type Result<T> = std::result::Result<T, WorkerError>;

// Convenience constructors
impl WorkerError {

    pub fn connection(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            address: address.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn connection_with_source(
        address: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            address: address.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn remote(call: RemoteCall, message: impl Into<String>) -> Self {
        Self::Remote {
            call,
            message: message.into(),
            description: None,
            source: None,
        }
    }

    pub fn remote_with_source(
        call: RemoteCall,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Remote {
            call,
            message: message.into(),
            description: None,
            source: Some(Box::new(source)),
        }
    }

    /// A structured error reported by the master itself.
    pub fn service(call: RemoteCall, description: impl Into<String>) -> Self {
        let description = description.into();
        Self::Remote {
            call,
            message: format!("master reported a service error: {description}"),
            description: Some(description),
            source: None,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn wait_timeout(waited_ms: u64) -> Self {
        Self::WaitTimeout { waited_ms }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn input(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Input {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn input_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Input {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn compute(message: impl Into<String>) -> Self {
        Self::Compute {
            message: message.into(),
            source: None,
        }
    }

    pub fn compute_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Compute {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The structured service-error description, if the master sent one.
    pub fn service_description(&self) -> Option<&str> {
        match self {
            Self::Remote { description, .. } => description.as_deref(),
            _ => None,
        }
    }

    /// The master call this error originated from, if any.
    pub fn remote_call(&self) -> Option<RemoteCall> {
        match self {
            Self::Remote { call, .. } => Some(*call),
            _ => None,
        }
    }
}
