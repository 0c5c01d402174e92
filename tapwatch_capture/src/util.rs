use std::io::{self, Read};
use std::process::{Child, ExitStatus};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::{BackendError, Result};

/// Wait for `child` to exit, or kill it once `timeout` expires.
/// Polls in small intervals to avoid CPU spinning.
pub fn wait_child_with_timeout(
    child: &mut Child,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            if let Err(e) = child.kill() {
                tracing::warn!(error = %e, "failed to kill timed-out child");
            }
            // reap
            let _ = child.wait();
            return Err(BackendError::Timeout(timeout));
        }
        std::thread::sleep(poll_interval);
    }
}

/// A captured pipe read to EOF on a helper thread, so a child that writes
/// more than the pipe buffer holds keeps running while it is waited on.
#[derive(Debug)]
pub struct PipeDrain(Option<JoinHandle<io::Result<Vec<u8>>>>);

impl PipeDrain {
    pub fn spawn(pipe: Option<impl Read + Send + 'static>) -> Self {
        Self(pipe.map(|mut p| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                p.read_to_end(&mut buf)?;
                Ok(buf)
            })
        }))
    }

    /// Everything the pipe produced (lossy on invalid UTF-8).
    pub fn finish(self) -> Result<String> {
        let Some(handle) = self.0 else {
            return Ok(String::new());
        };
        let buf = handle
            .join()
            .map_err(|_| BackendError::Io(io::Error::other("pipe reader panicked")))??;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
