//! Execution environment detection.
//!
//! Allocation routes on a single question: may this process hand out its own
//! identifiers? The answer comes from an [`EnvironmentProbe`], which is asked
//! on every call and never cached, so tests are free to flip the environment
//! between calls.

use core::{fmt, str::FromStr};
use portable_atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Environment variable holding the declared runtime environment.
pub const ENVIRONMENT_VAR: &str = "IDALLOC_ENVIRONMENT";

/// Environment variable set to `true` by the pipeline harness on worker
/// processes.
pub const PIPELINE_WORKER_VAR: &str = "IDALLOC_PIPELINE_WORKER";

/// A named runtime environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Environment {
    /// Live request-serving deployment.
    #[default]
    Production = 0,
    /// Externally visible test deployment.
    Sandbox = 1,
    /// Internal pre-release deployment.
    Alpha = 2,
    /// Quality assurance deployment.
    Qa = 3,
    /// Crash-testing deployment.
    Crash = 4,
    /// A developer's local deployment.
    Local = 5,
    /// Unit test execution.
    UnitTest = 6,
}

impl Environment {
    /// Every environment, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Production,
        Self::Sandbox,
        Self::Alpha,
        Self::Qa,
        Self::Crash,
        Self::Local,
        Self::UnitTest,
    ];

    /// The canonical lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Sandbox => "sandbox",
            Self::Alpha => "alpha",
            Self::Qa => "qa",
            Self::Crash => "crash",
            Self::Local => "local",
            Self::UnitTest => "unittest",
        }
    }

    const fn from_repr(repr: u8) -> Self {
        match repr {
            1 => Self::Sandbox,
            2 => Self::Alpha,
            3 => Self::Qa,
            4 => Self::Crash,
            5 => Self::Local,
            6 => Self::UnitTest,
            _ => Self::Production,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unrecognized environment name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown environment `{0}`")]
pub struct UnknownEnvironment(pub String);

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "production" => Ok(Self::Production),
            "sandbox" => Ok(Self::Sandbox),
            "alpha" => Ok(Self::Alpha),
            "qa" => Ok(Self::Qa),
            "crash" => Ok(Self::Crash),
            "local" => Ok(Self::Local),
            "unittest" | "unit_test" | "unit-test" => Ok(Self::UnitTest),
            _ => Err(UnknownEnvironment(s.to_owned())),
        }
    }
}

/// Answers whether the current execution context allocates its own
/// identifiers.
///
/// Implementations must be cheap: the probe runs on every allocation and must
/// not perform I/O. Missing configuration resolves to the production answer.
pub trait EnvironmentProbe {
    /// The declared runtime environment.
    fn environment(&self) -> Environment;

    /// Whether the pipeline-worker marker is present and truthy.
    fn is_pipeline_worker(&self) -> bool;

    /// `true` in unit tests and on pipeline workers, `false` otherwise.
    fn is_self_allocated(&self) -> bool {
        self.environment() == Environment::UnitTest || self.is_pipeline_worker()
    }
}

impl<P: EnvironmentProbe + ?Sized> EnvironmentProbe for &P {
    fn environment(&self) -> Environment {
        (**self).environment()
    }

    fn is_pipeline_worker(&self) -> bool {
        (**self).is_pipeline_worker()
    }

    fn is_self_allocated(&self) -> bool {
        (**self).is_self_allocated()
    }
}

impl<P: EnvironmentProbe + ?Sized> EnvironmentProbe for Arc<P> {
    fn environment(&self) -> Environment {
        (**self).environment()
    }

    fn is_pipeline_worker(&self) -> bool {
        (**self).is_pipeline_worker()
    }

    fn is_self_allocated(&self) -> bool {
        (**self).is_self_allocated()
    }
}

/// Reads [`ENVIRONMENT_VAR`] and [`PIPELINE_WORKER_VAR`] from the process
/// environment on every call.
///
/// An unset or unrecognized environment name reads as
/// [`Environment::Production`]. The worker marker only counts when it is
/// exactly `true`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnvironment;

impl ProcessEnvironment {
    /// Creates a probe over the process environment.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EnvironmentProbe for ProcessEnvironment {
    fn environment(&self) -> Environment {
        environment_from(|key| std::env::var(key).ok())
    }

    fn is_pipeline_worker(&self) -> bool {
        pipeline_worker_from(|key| std::env::var(key).ok())
    }
}

fn environment_from(get: impl Fn(&str) -> Option<String>) -> Environment {
    get(ENVIRONMENT_VAR)
        .and_then(|name| name.parse().ok())
        .unwrap_or_default()
}

fn pipeline_worker_from(get: impl Fn(&str) -> Option<String>) -> bool {
    get(PIPELINE_WORKER_VAR).is_some_and(|value| is_truthy(&value))
}

fn is_truthy(value: &str) -> bool {
    value == "true"
}

/// A probe whose answers are fixed at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FixedEnvironment {
    environment: Environment,
    pipeline_worker: bool,
}

impl FixedEnvironment {
    /// A probe reporting `environment` with no pipeline-worker marker.
    #[must_use]
    pub const fn new(environment: Environment) -> Self {
        Self {
            environment,
            pipeline_worker: false,
        }
    }

    /// A probe reporting a pipeline worker running in `environment`.
    #[must_use]
    pub const fn pipeline_worker(environment: Environment) -> Self {
        Self {
            environment,
            pipeline_worker: true,
        }
    }
}

impl EnvironmentProbe for FixedEnvironment {
    fn environment(&self) -> Environment {
        self.environment
    }

    fn is_pipeline_worker(&self) -> bool {
        self.pipeline_worker
    }
}

/// A probe that can be flipped at runtime through a shared reference.
///
/// Useful for exercising both strategies against the same service instance.
///
/// ```
/// use idalloc::{Environment, EnvironmentProbe, SwitchableEnvironment};
///
/// let probe = SwitchableEnvironment::new(Environment::Production);
/// assert!(!probe.is_self_allocated());
///
/// probe.set_environment(Environment::UnitTest);
/// assert!(probe.is_self_allocated());
/// ```
#[derive(Debug, Default)]
pub struct SwitchableEnvironment {
    environment: AtomicU8,
    pipeline_worker: AtomicBool,
}

impl SwitchableEnvironment {
    /// Starts out reporting `environment` with no pipeline-worker marker.
    #[must_use]
    pub const fn new(environment: Environment) -> Self {
        Self {
            environment: AtomicU8::new(environment as u8),
            pipeline_worker: AtomicBool::new(false),
        }
    }

    /// Changes the reported environment.
    pub fn set_environment(&self, environment: Environment) {
        self.environment.store(environment as u8, Ordering::Release);
    }

    /// Sets or clears the pipeline-worker marker.
    pub fn set_pipeline_worker(&self, pipeline_worker: bool) {
        self.pipeline_worker
            .store(pipeline_worker, Ordering::Release);
    }
}

impl EnvironmentProbe for SwitchableEnvironment {
    fn environment(&self) -> Environment {
        Environment::from_repr(self.environment.load(Ordering::Acquire))
    }

    fn is_pipeline_worker(&self) -> bool {
        self.pipeline_worker.load(Ordering::Acquire)
    }
}
