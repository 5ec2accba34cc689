pub mod config;
pub mod definition;
pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use definition::{StepSpec, WorkflowDefinition};
pub use error::{FlowError, Result};
pub use event::EventBus;
pub use types::*;
