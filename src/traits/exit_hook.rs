use crate::errors::StageFailure;

/// A one-shot callback run after a stage's process has exited.
///
/// Hooks run in registration order, after every capture of the stage has
/// received its final byte. A returned failure becomes part of the chain's
/// aggregate error; it never changes the recorded exit code.
pub trait ExitHook: Send {
    /// `command` is the stage's command line, for error messages
    fn on_exit(self: Box<Self>, command: &str) -> Result<(), StageFailure>;
}

impl<F> ExitHook for F
where
    F: FnOnce(&str) -> Result<(), StageFailure> + Send,
{
    fn on_exit(self: Box<Self>, command: &str) -> Result<(), StageFailure> {
        (*self)(command)
    }
}
