//! Async submit/poll dialect
//!
//! A generation is submitted as a task and its status polled until it
//! succeeds, fails, or the poll ceiling is reached. Image-to-image is not
//! offered by this backend.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use super::DialectAdapter;
use crate::error::{ImageGenError, Result};
use crate::execution::{RequestDescriptor, ResilientExecutor, TimeoutClass, bearer_json_headers};
use crate::types::{BackendProfile, Dialect, GenerationRequest, PollTask, TaskStatus};
use crate::utils::cancel::CancelHandle;

pub const SUBMIT_PATH: &str = "/v1/images/generations";
pub const TASKS_PATH: &str = "/v1/tasks";
pub const ASYNC_MODE_HEADER: &str = "X-ModelScope-Async-Mode";
pub const TASK_TYPE_HEADER: &str = "X-ModelScope-Task-Type";
pub const TASK_TYPE_IMAGE_GENERATION: &str = "image_generation";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_POLLS: u32 = 60;

/// Poll cadence of the async dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

pub struct AsyncPollAdapter {
    profile: Arc<BackendProfile>,
    executor: Arc<ResilientExecutor>,
    poll: PollSettings,
}

impl AsyncPollAdapter {
    pub fn new(profile: Arc<BackendProfile>, executor: Arc<ResilientExecutor>) -> Self {
        Self {
            profile,
            executor,
            poll: PollSettings::default(),
        }
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    /// Submit the task and return it in the `Submitted` state.
    pub async fn submit(&self, prompt: &str, cancel: &CancelHandle) -> Result<PollTask> {
        let url = format!("{}{SUBMIT_PATH}", self.profile.trimmed_base_url());
        let body = json!({"model": self.profile.model, "prompt": prompt});
        let descriptor = RequestDescriptor::post_json(url, body)
            .with_headers(bearer_json_headers(&self.profile.api_key)?)
            .with_header(ASYNC_MODE_HEADER, "true")?
            .with_timeout(TimeoutClass::LongLived);

        let response = self.executor.send_json(&descriptor, cancel).await?;
        let task_id = match response.get("task_id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(ImageGenError::invalid_response(format!(
                    "async API did not return task_id: {response}"
                )));
            }
        };

        tracing::debug!(target: "pixelrelay::poll", task_id = %task_id, "task submitted");
        Ok(PollTask::submitted(task_id))
    }

    /// Poll `task` until it reaches a terminal state; returns the result URL.
    pub async fn wait(&self, task: &mut PollTask, cancel: &CancelHandle) -> Result<String> {
        let url = format!(
            "{}{TASKS_PATH}/{}",
            self.profile.trimmed_base_url(),
            urlencoding::encode(&task.task_id)
        );
        let descriptor = RequestDescriptor::get(url)
            .with_headers(bearer_json_headers(&self.profile.api_key)?)
            .with_header(TASK_TYPE_HEADER, TASK_TYPE_IMAGE_GENERATION)?
            .with_timeout(TimeoutClass::Ordinary(self.profile.request_timeout));

        for poll in 1..=self.poll.max_polls {
            let response = self.executor.send_json(&descriptor, cancel).await?;
            let status = response.get("task_status").and_then(Value::as_str);
            let outputs: Vec<String> = response
                .get("output_images")
                .and_then(Value::as_array)
                .map(|images| {
                    images
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            match task.observe(status, &outputs) {
                TaskStatus::Succeeded => {
                    tracing::debug!(
                        target: "pixelrelay::poll",
                        task_id = %task.task_id,
                        polls = task.polls,
                        "task succeeded"
                    );
                    return task.result_url.clone().ok_or_else(|| {
                        ImageGenError::invalid_response(format!(
                            "task {} succeeded without a result",
                            task.task_id
                        ))
                    });
                }
                TaskStatus::Failed => {
                    return Err(ImageGenError::TaskFailed {
                        task_id: task.task_id.clone(),
                        details: response.to_string(),
                    });
                }
                _ => {
                    tracing::debug!(
                        target: "pixelrelay::poll",
                        task_id = %task.task_id,
                        poll,
                        status = status.unwrap_or("<missing>"),
                        "task pending"
                    );
                }
            }

            if poll < self.poll.max_polls {
                cancel.sleep(self.poll.interval).await?;
            }
        }

        task.time_out();
        // reported against the configured ceiling (60 x 5 s = 300 s)
        let waited = self.poll.interval * self.poll.max_polls;
        Err(ImageGenError::TaskTimedOut {
            task_id: task.task_id.clone(),
            polls: task.polls,
            waited_secs: waited.as_secs(),
        })
    }
}

#[async_trait]
impl DialectAdapter for AsyncPollAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::AsyncPoll
    }

    async fn text_to_image(
        &self,
        request: &GenerationRequest,
        cancel: &CancelHandle,
    ) -> Result<String> {
        let mut task = self.submit(request.prompt(), cancel).await?;
        self.wait(&mut task, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_poll_cadence() {
        let poll = PollSettings::default();
        assert_eq!(poll.interval, Duration::from_secs(5));
        assert_eq!(poll.max_polls, 60);
    }
}
