//! Background compute tasks
//!
//! Precomputation (environment maps, lookup tables) runs on a worker
//! thread. The frame loop polls the task once per frame and keeps using
//! its fallback until the result arrives.

use super::{RenderError, RenderResult};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use std::thread;

enum TaskState<T> {
    Pending(Receiver<RenderResult<T>>),
    Ready(T),
    Failed(RenderError),
    Taken,
}

/// Handle to a result produced off the frame thread
pub struct ComputeTask<T> {
    name: String,
    state: TaskState<T>,
}

impl<T: Send + 'static> ComputeTask<T> {
    /// Run `job` on a named worker thread
    pub fn spawn<F>(name: impl Into<String>, job: F) -> RenderResult<Self>
    where
        F: FnOnce() -> RenderResult<T> + Send + 'static,
    {
        let name = name.into();
        let (sender, receiver) = bounded(1);
        thread::Builder::new()
            .name(format!("compute-{name}"))
            .spawn(move || {
                // The receiver may already be gone if the task was dropped.
                let _ = sender.send(job());
            })
            .map_err(|e| RenderError::InitializationFailed(format!("failed to spawn compute task '{name}': {e}")))?;

        log::debug!("Spawned compute task '{}'", name);
        Ok(Self {
            name,
            state: TaskState::Pending(receiver),
        })
    }

    /// Task whose result is already known
    pub fn ready(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            state: TaskState::Ready(value),
        }
    }
}

impl<T> ComputeTask<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check for completion without blocking
    ///
    /// Returns the result once it has arrived. A failed or abandoned job
    /// is logged once and never becomes ready.
    pub fn poll(&mut self) -> Option<&T> {
        if let TaskState::Pending(receiver) = &self.state {
            match receiver.try_recv() {
                Ok(Ok(value)) => {
                    log::debug!("Compute task '{}' finished", self.name);
                    self.state = TaskState::Ready(value);
                }
                Ok(Err(error)) => {
                    log::error!("Compute task '{}' failed: {}", self.name, error);
                    self.state = TaskState::Failed(error);
                }
                Err(TryRecvError::Disconnected) => {
                    log::error!("Compute task '{}' ended without a result", self.name);
                    self.state = TaskState::Failed(RenderError::InvalidOperation {
                        reason: format!("compute task '{}' panicked", self.name),
                    });
                }
                Err(TryRecvError::Empty) => {}
            }
        }
        match &self.state {
            TaskState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ready(&mut self) -> bool {
        self.poll().is_some()
    }

    /// Error the job finished with, if it failed
    pub fn error(&self) -> Option<&RenderError> {
        match &self.state {
            TaskState::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Move the result out once it is ready
    pub fn take(&mut self) -> Option<T> {
        self.poll()?;
        match std::mem::replace(&mut self.state, TaskState::Taken) {
            TaskState::Ready(value) => Some(value),
            other => {
                self.state = other;
                None
            }
        }
    }
}

impl<T> std::fmt::Debug for ComputeTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            TaskState::Pending(_) => "pending",
            TaskState::Ready(_) => "ready",
            TaskState::Failed(_) => "failed",
            TaskState::Taken => "taken",
        };
        f.debug_struct("ComputeTask")
            .field("name", &self.name)
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::{Duration, Instant};

    fn wait_ready<T>(task: &mut ComputeTask<T>) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if task.poll().is_some() || task.error().is_some() {
                return task.poll().is_some();
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_result_arrives_after_release() {
        let (release, gate) = unbounded::<()>();
        let mut task = ComputeTask::spawn("brdf", move || {
            gate.recv().ok();
            Ok(vec![1u8, 2, 3])
        })
        .unwrap();

        assert!(task.poll().is_none(), "still waiting on the gate");
        release.send(()).unwrap();
        assert!(wait_ready(&mut task));
        assert_eq!(task.poll(), Some(&vec![1, 2, 3]));

        assert_eq!(task.take(), Some(vec![1, 2, 3]));
        assert!(task.take().is_none());
        assert!(task.poll().is_none());
    }

    #[test]
    fn test_failed_job_never_becomes_ready() {
        let mut task: ComputeTask<u32> =
            ComputeTask::spawn("irradiance", || Err(RenderError::ResourceCreationFailed("cube".into()))).unwrap();
        assert!(!wait_ready(&mut task));
        assert!(matches!(task.error(), Some(RenderError::ResourceCreationFailed(_))));
    }

    #[test]
    fn test_ready_task() {
        let mut task = ComputeTask::ready("placeholder", 7);
        assert!(task.is_ready());
        assert_eq!(task.name(), "placeholder");
    }
}
