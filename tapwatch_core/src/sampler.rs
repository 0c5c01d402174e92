//! Background reading worker.
//!
//! Spawns a thread that owns the capture backend and the recognizer and
//! services one read request at a time over bounded channels. The caller
//! waits with a deadline, so a wedged collaborator costs one timeout per
//! field instead of hanging the session.
//!
//! Each `Sampler` spawns exactly one thread. Dropping it signals shutdown
//! and joins the thread, detaching it if a collaborator call is still stuck
//! after a grace period.
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tapwatch_traits::{Capture, Clock, OcrHints, Recognizer, Region};

use crate::error::CollaboratorFailure;
use crate::field::RawReading;

/// How long `Drop` waits for the worker before detaching it.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);
const SHUTDOWN_POLL: Duration = Duration::from_millis(5);

struct ReadRequest {
    seq: u64,
    region: Region,
    hints: OcrHints,
    timeout: Duration,
}

struct ReadReply {
    seq: u64,
    result: Result<RawReading, CollaboratorFailure>,
}

pub struct Sampler {
    req_tx: Option<xch::Sender<ReadRequest>>,
    reply_rx: xch::Receiver<ReadReply>,
    next_seq: u64,
    /// Shutdown flag checked by the worker between requests
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Sampler {
    /// Start the worker. Readings are stamped with `clock.ms_since(epoch)`
    /// right after the capture returns.
    pub fn spawn<Cap, Rec>(
        mut capture: Cap,
        mut recognizer: Rec,
        clock: Arc<dyn Clock + Send + Sync>,
        epoch: Instant,
    ) -> crate::error::Result<Self>
    where
        Cap: Capture + Send + 'static,
        Rec: Recognizer + Send + 'static,
    {
        // One queued request at most: a second one finds the queue full
        // while the worker is stuck and fails fast.
        let (req_tx, req_rx) = xch::bounded::<ReadRequest>(1);
        let (reply_tx, reply_rx) = xch::bounded::<ReadReply>(2);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::Builder::new()
            .name("tapwatch-sampler".into())
            .spawn(move || {
                while let Ok(req) = req_rx.recv() {
                    if shutdown_clone.load(Ordering::Relaxed) {
                        tracing::debug!("Sampler thread received shutdown signal");
                        break;
                    }
                    let started = Instant::now();
                    let result = capture
                        .capture(&req.region, req.timeout)
                        .map_err(CollaboratorFailure::from)
                        .and_then(|frame| {
                            let t_ms = clock.ms_since(epoch);
                            let left = req.timeout.saturating_sub(started.elapsed());
                            recognizer
                                .recognize(&frame, &req.hints, left)
                                .map(|text| RawReading { text, t_ms })
                                .map_err(CollaboratorFailure::from)
                        });
                    // If send fails, consumer is gone; exit gracefully
                    if reply_tx
                        .send(ReadReply {
                            seq: req.seq,
                            result,
                        })
                        .is_err()
                    {
                        tracing::debug!("Sampler consumer disconnected, exiting thread");
                        break;
                    }
                }
                tracing::trace!("Sampler thread exiting cleanly");
            })
            .map_err(|e| eyre::eyre!("failed to spawn sampler thread: {e}"))?;

        Ok(Self {
            req_tx: Some(req_tx),
            reply_rx,
            next_seq: 0,
            shutdown,
            join_handle: Some(join_handle),
        })
    }

    /// Capture `region` and OCR it, waiting at most `timeout` of real time.
    pub fn read(
        &mut self,
        region: &Region,
        hints: &OcrHints,
        timeout: Duration,
    ) -> Result<RawReading, CollaboratorFailure> {
        for stale in self.reply_rx.try_iter() {
            tracing::trace!(seq = stale.seq, "discarding late reply");
        }
        let Some(tx) = &self.req_tx else {
            return Err(CollaboratorFailure::WorkerGone);
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        let req = ReadRequest {
            seq,
            region: region.clone(),
            hints: hints.clone(),
            timeout,
        };
        match tx.try_send(req) {
            Ok(()) => {}
            Err(xch::TrySendError::Full(_)) => {
                tracing::debug!(seq, "sampler still busy with an earlier request");
                return Err(CollaboratorFailure::Timeout);
            }
            Err(xch::TrySendError::Disconnected(_)) => return Err(CollaboratorFailure::WorkerGone),
        }

        let deadline = Instant::now() + timeout;
        loop {
            match self.reply_rx.recv_deadline(deadline) {
                Ok(reply) if reply.seq == seq => return reply.result,
                Ok(stale) => tracing::trace!(seq = stale.seq, "discarding late reply"),
                Err(xch::RecvTimeoutError::Timeout) => return Err(CollaboratorFailure::Timeout),
                Err(xch::RecvTimeoutError::Disconnected) => {
                    return Err(CollaboratorFailure::WorkerGone);
                }
            }
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Closing the request channel wakes a worker blocked in recv().
        self.req_tx.take();

        if let Some(handle) = self.join_handle.take() {
            let deadline = Instant::now() + SHUTDOWN_GRACE;
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(SHUTDOWN_POLL);
            }
            if !handle.is_finished() {
                tracing::warn!("sampler thread still busy after shutdown grace; detaching");
                return;
            }
            match handle.join() {
                Ok(()) => tracing::trace!("Sampler thread joined successfully"),
                Err(e) => tracing::warn!(?e, "Sampler thread panicked during shutdown"),
            }
        }
    }
}
