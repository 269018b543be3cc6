pub mod assertion;
pub mod config;
pub mod connection;
pub mod deploy;
pub mod ids;
pub mod log;
pub mod logger;
pub mod project;
pub mod resource;

pub use assertion::{AssertionConstructError, AssertionKind, AssertionOutcome, AssertionSpec, Protocol};
pub use config::{ClockworkConfig, Env};
pub use connection::{
  Connection, ConnectionKind, DatabaseConnectionSpec, FileConnectionSpec,
  NetworkConnectionSpec, ServiceMeshConnectionSpec,
};
pub use deploy::{DeployOutput, DeployOutputs};
pub use ids::ResourceId;
pub use log::{all_logs_success, clockwork_timestamp, EnvironmentVar, Log};
pub use logger::{LogConfig, LogLevel, StdioLogMode};
pub use project::Project;
pub use resource::{
  BrewPackageSpec, ContainerSpec, DirectorySpec, FileSpec, GitRepoSpec, ResourceGraph,
  ResourceKind, ResourceNode, UserSpec,
};
