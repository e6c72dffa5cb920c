use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use swupdd::engine::{CancelMode, DaemonEvent, JobId, JobSpec};
use swupdd::errors::Result;
use swupdd::exec::{INTERRUPTED_STATUS, ProcessBackend};

/// How the fake reacts to launches.
#[derive(Debug, Clone)]
pub enum FakeBehaviour {
    /// Jobs stay running until the test sends `ChildTerminated` itself or
    /// cancels them. A signal ends the job with `INTERRUPTED_STATUS`.
    Manual,
    /// Every job finishes right after launch with this status and output.
    CompleteImmediately { status: i32, output: Vec<String> },
    /// `launch` itself fails.
    FailLaunch,
}

/// Everything the fake was asked to do, shared with the test.
#[derive(Debug, Clone, Default)]
pub struct BackendLog {
    launched: Arc<Mutex<Vec<JobSpec>>>,
    signals: Arc<Mutex<Vec<(JobId, CancelMode)>>>,
    shutdowns: Arc<Mutex<usize>>,
}

impl BackendLog {
    pub fn launched(&self) -> Vec<JobSpec> {
        self.launched.lock().unwrap().clone()
    }

    pub fn signals(&self) -> Vec<(JobId, CancelMode)> {
        self.signals.lock().unwrap().clone()
    }

    /// How many times the runtime asked the backend to shut down.
    pub fn shutdowns(&self) -> usize {
        *self.shutdowns.lock().unwrap()
    }
}

/// A process backend that never spawns anything.
pub struct FakeProcessBackend {
    runtime_tx: mpsc::Sender<DaemonEvent>,
    behaviour: FakeBehaviour,
    log: BackendLog,
}

impl FakeProcessBackend {
    pub fn new(runtime_tx: mpsc::Sender<DaemonEvent>, behaviour: FakeBehaviour) -> Self {
        Self {
            runtime_tx,
            behaviour,
            log: BackendLog::default(),
        }
    }

    pub fn log(&self) -> BackendLog {
        self.log.clone()
    }
}

impl ProcessBackend for FakeProcessBackend {
    fn launch(&mut self, job: JobSpec) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let behaviour = self.behaviour.clone();
        let log = self.log.clone();

        Box::pin(async move {
            if let FakeBehaviour::FailLaunch = behaviour {
                return Err(anyhow::anyhow!("fake backend refused job {}", job.job_id).into());
            }

            log.launched.lock().unwrap().push(job.clone());

            if let FakeBehaviour::CompleteImmediately { status, output } = behaviour {
                // Report from a separate task, like a real supervisor would.
                let job_id = job.job_id;
                tokio::spawn(async move {
                    let _ = tx
                        .send(DaemonEvent::ChildTerminated {
                            job_id,
                            status,
                            output,
                        })
                        .await;
                });
            }
            Ok(())
        })
    }

    fn signal(
        &mut self,
        job_id: JobId,
        mode: CancelMode,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let behaviour = self.behaviour.clone();
        let log = self.log.clone();

        Box::pin(async move {
            log.signals.lock().unwrap().push((job_id, mode));

            if let FakeBehaviour::Manual = behaviour {
                tokio::spawn(async move {
                    let _ = tx
                        .send(DaemonEvent::ChildTerminated {
                            job_id,
                            status: INTERRUPTED_STATUS,
                            output: Vec::new(),
                        })
                        .await;
                });
            }
            Ok(())
        })
    }

    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let log = self.log.clone();
        Box::pin(async move {
            *log.shutdowns.lock().unwrap() += 1;
            Ok(())
        })
    }
}
