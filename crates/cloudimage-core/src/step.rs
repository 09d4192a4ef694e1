use crate::error::StepError;
use crate::state::{StateBag, StateKey};
use async_trait::async_trait;

/// What the runner should do after a step's forward action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    Continue,
    /// Stop forward progress and unwind. The step has already recorded why.
    Halt,
}

/// One unit of a pipeline: a forward action plus its compensating cleanup
///
/// `run` must register every resource it creates in the state bag before
/// returning, and must record an error (see [`StateBag::halt`]) before
/// returning [`StepAction::Halt`].
///
/// `cleanup` is called for every step that started, in reverse order, after
/// the run finishes or halts. It must check whether the resource it owns is
/// still present and do nothing if not. Errors it returns are reported but
/// never stop the unwind.
#[async_trait]
pub trait Step: Send {
    fn name(&self) -> &'static str;

    /// Keys that must be present before `run`.
    fn requires(&self) -> &'static [StateKey] {
        &[]
    }

    /// Keys present after a successful `run`.
    fn produces(&self) -> &'static [StateKey] {
        &[]
    }

    async fn run(&mut self, state: &mut StateBag) -> StepAction;

    async fn cleanup(&mut self, _state: &mut StateBag) -> Result<(), StepError> {
        Ok(())
    }
}
