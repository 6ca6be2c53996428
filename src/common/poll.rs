use crate::common::error::{Error, PollDeadlineElapsed, Result};
use std::{future::Future, time::Duration};
use tokio::time::{sleep, Instant};

/// The poll budget elapsed. Carries the last attempt error, if any attempt
/// completed with one.
#[derive(Debug)]
pub(crate) struct PollTimeout {
    pub(crate) deadline: Duration,
    pub(crate) last: Option<Error>,
}

impl PollTimeout {
    /// Surfaces the last underlying attempt error. A timed-out poll is
    /// indistinguishable from one whose final attempt failed.
    pub(crate) fn into_last_error(self) -> Error {
        let deadline = self.deadline;
        self.last
            .unwrap_or_else(|| PollDeadlineElapsed { deadline }.build())
    }
}

/// Runs `attempt` immediately and then on every `interval` tick until it
/// completes with a value, or until `deadline` elapses. An attempt may report
/// "not done yet" with `Ok(None)`, or fail with an error; failed attempts are
/// retried and only their last error is kept.
pub(crate) async fn poll_immediate<T, F, Fut>(
    interval: Duration,
    deadline: Duration,
    mut attempt: F,
) -> Result<T, PollTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let mut last: Option<Error> = None;

    loop {
        match attempt().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(error) => last = Some(error),
        }

        if started.elapsed() >= deadline {
            return Err(PollTimeout { deadline, last });
        }
        sleep(interval).await;
    }
}
