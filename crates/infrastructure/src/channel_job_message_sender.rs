use plangate_application::{JobMessageSender, ProjectContext};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;
use uuid::Uuid;

/// One line of live output for a project job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobMessage {
    /// Job the line belongs to.
    pub job_id: Uuid,
    /// Output line without its newline. Empty for the closing message.
    pub line: String,
    /// Whether the job stream is complete.
    pub is_final: bool,
}

/// Forwards job output into an unbounded channel so senders never wait.
#[derive(Debug, Clone)]
pub struct ChannelJobMessageSender {
    sender: UnboundedSender<JobMessage>,
}

impl ChannelJobMessageSender {
    /// Creates a sender and the receiver its messages arrive on.
    #[must_use]
    pub fn new() -> (Self, UnboundedReceiver<JobMessage>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl JobMessageSender for ChannelJobMessageSender {
    fn send(&self, context: &ProjectContext, line: &str, is_final: bool) {
        let message = JobMessage {
            job_id: context.job_id,
            line: line.to_owned(),
            is_final,
        };

        if self.sender.send(message).is_err() {
            debug!(job_id = %context.job_id, "job output receiver is gone");
        }
    }
}
