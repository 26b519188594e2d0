use crate::ProjectContext;

/// Sink for live command output.
///
/// Sending never blocks the step that produced the line.
pub trait JobMessageSender: Send + Sync {
    /// Forwards one output line. `is_final` closes the job stream.
    fn send(&self, context: &ProjectContext, line: &str, is_final: bool);
}
