use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info};

use betaflow_core::event::{EventBus, RunEvent};
use betaflow_core::types::{RunId, Step, StepResult, UnitKind};

use crate::condition::evaluate_condition;
use crate::context::PriorResults;
use crate::dispatcher::ActionRegistry;
use crate::resolver::resolve_parameters;

/// A group of steps the scheduler runs as one barrier.
///
/// Each member carries its position in the step list it was partitioned
/// from, so results can be put back in declared order.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionUnit<'a> {
    /// An ungrouped step, run on its own.
    Sequential { position: usize, step: &'a Step },
    /// Every step sharing `group`, run concurrently.
    Parallel {
        group: &'a str,
        members: Vec<(usize, &'a Step)>,
    },
}

impl<'a> ExecutionUnit<'a> {
    pub fn kind(&self) -> UnitKind {
        match self {
            Self::Sequential { .. } => UnitKind::Sequential,
            Self::Parallel { group, .. } => UnitKind::Parallel {
                group: group.to_string(),
            },
        }
    }

    /// Member steps in declared order.
    pub fn steps(&self) -> Vec<&'a Step> {
        match self {
            Self::Sequential { step, .. } => vec![*step],
            Self::Parallel { members, .. } => members.iter().map(|(_, s)| *s).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Sequential { .. } => 1,
            Self::Parallel { members, .. } => members.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split an ordered step list into execution units.
///
/// Units come out in the order their first member appears. A group whose
/// members are not adjacent still forms a single unit, placed where its
/// first member sits.
pub fn partition(steps: &[Step]) -> Vec<ExecutionUnit<'_>> {
    let mut units: Vec<ExecutionUnit<'_>> = Vec::new();
    let mut group_index: HashMap<&str, usize> = HashMap::new();

    for (position, step) in steps.iter().enumerate() {
        let Some(group) = step.group.as_deref() else {
            units.push(ExecutionUnit::Sequential { position, step });
            continue;
        };

        match group_index.get(group) {
            Some(&index) => {
                if let ExecutionUnit::Parallel { members, .. } = &mut units[index] {
                    members.push((position, step));
                }
            }
            None => {
                group_index.insert(group, units.len());
                units.push(ExecutionUnit::Parallel {
                    group,
                    members: vec![(position, step)],
                });
            }
        }
    }

    units
}

/// Drives a run: unit after unit, members of a parallel unit concurrently.
pub struct GroupScheduler {
    registry: Arc<ActionRegistry>,
    events: Arc<EventBus>,
}

impl GroupScheduler {
    pub fn new(registry: Arc<ActionRegistry>, events: Arc<EventBus>) -> Self {
        Self { registry, events }
    }

    /// Run every step and return one result per step, in the order of `steps`.
    ///
    /// `steps` must already be sorted by `order`. Step failures end up in the
    /// matching result; nothing here aborts the run.
    pub async fn run(&self, run_id: &RunId, steps: &[Step]) -> Vec<StepResult> {
        let units = partition(steps);
        debug!(run_id = %run_id, units = units.len(), steps = steps.len(), "Partitioned workflow");

        // Only this loop appends; units read frozen snapshots.
        let mut completed: Vec<StepResult> = Vec::with_capacity(steps.len());
        let mut positions: Vec<usize> = Vec::with_capacity(steps.len());

        for unit in &units {
            let prior = PriorResults::snapshot(&completed);
            self.events.publish(RunEvent::UnitStarted {
                run_id: run_id.clone(),
                unit: unit.kind(),
                size: unit.len(),
            });

            match unit {
                ExecutionUnit::Sequential { position, step } => {
                    let result = self.execute_step(run_id, step, &prior).await;
                    positions.push(*position);
                    completed.push(result);
                }
                ExecutionUnit::Parallel { group, members } => {
                    debug!(run_id = %run_id, group = %group, size = members.len(), "Running parallel group");
                    let prior = &prior;
                    let outcomes = join_all(members.iter().map(|(position, step)| async move {
                        (*position, self.execute_step(run_id, step, prior).await)
                    }))
                    .await;

                    for (position, result) in outcomes {
                        positions.push(position);
                        completed.push(result);
                    }
                }
            }
        }

        let mut ordered: Vec<(usize, StepResult)> = positions.into_iter().zip(completed).collect();
        ordered.sort_by_key(|(position, _)| *position);
        ordered.into_iter().map(|(_, result)| result).collect()
    }

    /// Gate, resolve, dispatch. Always yields a result.
    async fn execute_step(&self, run_id: &RunId, step: &Step, prior: &PriorResults) -> StepResult {
        let result = if !evaluate_condition(step.condition.as_ref(), prior) {
            info!(run_id = %run_id, step = %step.name, "Condition not met, skipping step");
            StepResult::skipped(&step.name)
        } else {
            self.events.publish(RunEvent::StepStarted {
                run_id: run_id.clone(),
                step_name: step.name.clone(),
            });

            let parameters = resolve_parameters(&step.parameters, prior);
            match self.registry.dispatch(&step.action, parameters).await {
                Ok(output) => {
                    debug!(run_id = %run_id, step = %step.name, "Step completed");
                    StepResult::success(&step.name, output)
                }
                Err(e) => {
                    error!(run_id = %run_id, step = %step.name, action = %step.action, error = %e, "Step failed");
                    StepResult::failed(&step.name, e.to_string())
                }
            }
        };

        self.events.publish(RunEvent::StepFinished {
            run_id: run_id.clone(),
            result: result.clone(),
        });
        result
    }
}
