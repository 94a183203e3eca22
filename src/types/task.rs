//! Async-poll task lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status value reported by the backend for a finished task.
pub const STATUS_SUCCEED: &str = "SUCCEED";
/// Status value reported by the backend for a failed task.
pub const STATUS_FAILED: &str = "FAILED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Submitted,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

impl TaskStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }
}

/// A submitted generation task. Transitions are driven by poll responses only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollTask {
    pub task_id: String,
    pub status: TaskStatus,
    pub result_url: Option<String>,
    /// Number of poll responses observed so far.
    pub polls: u32,
    pub submitted_at: DateTime<Utc>,
}

impl PollTask {
    pub fn submitted(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Submitted,
            result_url: None,
            polls: 0,
            submitted_at: Utc::now(),
        }
    }

    /// Apply one poll response. Ignored once the task is terminal.
    ///
    /// `SUCCEED` without outputs is a failure.
    pub fn observe(&mut self, status: Option<&str>, outputs: &[String]) -> TaskStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        self.polls += 1;
        self.status = match status {
            Some(STATUS_SUCCEED) => match outputs.first() {
                Some(url) => {
                    self.result_url = Some(url.clone());
                    TaskStatus::Succeeded
                }
                None => TaskStatus::Failed,
            },
            Some(STATUS_FAILED) => TaskStatus::Failed,
            _ => TaskStatus::Polling,
        };
        self.status
    }

    /// Mark the task as abandoned after the poll ceiling.
    pub fn time_out(&mut self) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::TimedOut;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_then_success() {
        let mut task = PollTask::submitted("t1");
        assert_eq!(task.observe(Some("PENDING"), &[]), TaskStatus::Polling);
        assert_eq!(task.observe(Some("RUNNING"), &[]), TaskStatus::Polling);
        let outputs = vec!["http://z/out.png".to_string()];
        assert_eq!(task.observe(Some("SUCCEED"), &outputs), TaskStatus::Succeeded);
        assert_eq!(task.result_url.as_deref(), Some("http://z/out.png"));
        assert_eq!(task.polls, 3);
    }

    #[test]
    fn succeed_without_outputs_fails() {
        let mut task = PollTask::submitted("t1");
        assert_eq!(task.observe(Some("SUCCEED"), &[]), TaskStatus::Failed);
    }

    #[test]
    fn terminal_state_is_sticky() {
        let mut task = PollTask::submitted("t1");
        task.observe(Some("FAILED"), &[]);
        let outputs = vec!["http://late".to_string()];
        assert_eq!(task.observe(Some("SUCCEED"), &outputs), TaskStatus::Failed);
        task.time_out();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.polls, 1);
    }

    #[test]
    fn time_out_from_polling() {
        let mut task = PollTask::submitted("t1");
        task.observe(None, &[]);
        task.time_out();
        assert_eq!(task.status, TaskStatus::TimedOut);
    }
}
