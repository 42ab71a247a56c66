pub mod context;
pub mod deploy;
pub mod settings;

pub use context::DeploymentContext;
pub use deploy::{BuildOrchestrator, Collaborators, DeployReport};
pub use settings::BuildSettings;
