use log::{error, info, warn};
use serde::Deserialize;
use thiserror::Error;

use super::{MissionContext, SubTask, TaskError};

/// What the sequencer does after a sub-task fails.
/// Cancellation always stops the mission regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy{
    #[default]
    Halt,
    Continue,
}

#[derive(Debug, Error)]
pub enum MissionError{
    #[error("mission cancelled at '{task}'")]
    Cancelled{ task: String },
    #[error("sub-task '{name}' failed")]
    TaskFailed{
        name: String,
        #[source]
        source: TaskError,
    },
}

#[derive(Debug, Default)]
pub struct MissionReport{
    pub completed: Vec<String>,
    /// Only populated under `FailurePolicy::Continue`
    pub failed: Vec<(String, TaskError)>,
}

impl MissionReport{
    pub fn is_clean(&self) -> bool{
        self.failed.is_empty()
    }
}

pub struct MissionSequencer{
    tasks: Vec<(String, Box<dyn SubTask>)>,
    policy: FailurePolicy,
}

impl MissionSequencer{
    pub fn new(policy: FailurePolicy) -> Self{
        MissionSequencer{ tasks: Vec::new(), policy }
    }

    pub fn push(&mut self, name: &str, task: Box<dyn SubTask>) -> &mut Self{
        self.tasks.push((name.to_string(), task));
        self
    }

    pub fn len(&self) -> usize{
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool{
        self.tasks.is_empty()
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str>{
        self.tasks.iter().map(|(name, _)| name.as_str())
    }

    /// Run every sub-task in order, each to completion before the next starts.
    pub fn run(&mut self, ctx: &mut MissionContext<'_>) -> Result<MissionReport, MissionError>{
        info!("task sequencer running {} tasks", self.tasks.len());
        let mut report = MissionReport::default();

        for (name, task) in self.tasks.iter_mut(){
            if ctx.cancel.is_cancelled(){
                warn!("mission cancelled before {}", name);
                return Err(MissionError::Cancelled{ task: name.clone() });
            }

            info!("{} started", name);
            match task.run(ctx){
                Ok(()) => {
                    info!("{} finished", name);
                    report.completed.push(name.clone());
                }
                Err(e) if e.is_cancellation() => {
                    warn!("{} cancelled", name);
                    return Err(MissionError::Cancelled{ task: name.clone() });
                }
                Err(e) => match self.policy{
                    FailurePolicy::Halt => {
                        error!("{} failed, halting mission: {}", name, e);
                        return Err(MissionError::TaskFailed{ name: name.clone(), source: e });
                    }
                    FailurePolicy::Continue => {
                        warn!("{} failed, continuing: {}", name, e);
                        report.failed.push((name.clone(), e));
                    }
                },
            }
        }

        info!(
            "mission finished: {} completed, {} failed",
            report.completed.len(), report.failed.len()
        );
        Ok(report)
    }
}
