//! Workflow execution engine.
//!
//! A workflow is a flat list of steps ordered by their `order` field. The
//! [`GroupScheduler`] partitions the list into execution units: each
//! ungrouped step is its own sequential unit, and steps sharing a `group`
//! form one parallel unit whose members run concurrently. Units run one after
//! another; every step sees only the results of units that finished before
//! its own unit started.
//!
//! For each step the engine evaluates its [`condition`], resolves output
//! references in its parameters ([`resolver`]), and dispatches to the
//! matching handler in the [`ActionRegistry`]. Step failures are recorded in
//! that step's result and never stop the run.

pub mod actions;
pub mod condition;
pub mod context;
pub mod dispatcher;
pub mod executor;
pub mod resolver;
pub mod scheduler;
pub mod store;

pub use actions::llm_call::{LlmCallAction, LlmCallInput, LLM_CALL_ACTION};
pub use condition::evaluate_condition;
pub use context::PriorResults;
pub use dispatcher::ActionRegistry;
pub use executor::WorkflowExecutor;
pub use resolver::resolve_parameters;
pub use scheduler::{partition, ExecutionUnit, GroupScheduler};
pub use store::InMemoryWorkflowStore;
