use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::audio::{ElementId, SampleBuffer};
use crate::error::SequencerError;
use crate::pipeline::instrument::SampleId;

#[derive(Clone, Debug, PartialEq)]
pub enum LoadRequest {
    // an instrument from the manifest
    Sample { id: SampleId, path: PathBuf },
    // a mic take already playing from its element, decoded for scheduling
    Recording { element: ElementId, path: PathBuf },
}

#[derive(Debug)]
pub enum LoadResult {
    Sample { id: SampleId, buffer: SampleBuffer },
    Recording { element: ElementId, buffer: SampleBuffer },
    Failed(SequencerError),
}

// Load a WAV from disk and prepare it for registration with the engine
pub fn load(path: &Path, target_rate: u32) -> anyhow::Result<SampleBuffer> {
    SampleBuffer::load_wav(path, target_rate)
}

fn run(request: LoadRequest, target_rate: u32) -> LoadResult {
    let (name, path) = match &request {
        LoadRequest::Sample { id, path } => (id.key().to_string(), path),
        LoadRequest::Recording { path, .. } => (path.display().to_string(), path),
    };
    match load(path, target_rate) {
        Ok(buffer) => match request {
            LoadRequest::Sample { id, .. } => LoadResult::Sample { id, buffer },
            LoadRequest::Recording { element, .. } => LoadResult::Recording { element, buffer },
        },
        Err(e) => LoadResult::Failed(SequencerError::LoadFailure {
            name,
            reason: format!("{e:#}"),
        }),
    }
}

// One worker, one file at a time, results in request order
pub struct LoaderHandle {
    tx: Sender<LoadRequest>,
    rx: Receiver<LoadResult>,
    _worker: JoinHandle<()>,
}

impl LoaderHandle {
    pub fn spawn(target_rate: u32) -> anyhow::Result<Self> {
        let (tx, requests) = crossbeam_channel::unbounded::<LoadRequest>();
        let (results, rx) = crossbeam_channel::unbounded::<LoadResult>();

        let worker = std::thread::Builder::new()
            .name("sample-loader".to_string())
            .spawn(move || {
                // ends once the handle (and its sender) is dropped
                for request in requests {
                    if results.send(run(request, target_rate)).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            tx,
            rx,
            _worker: worker,
        })
    }

    pub fn request(&self, request: LoadRequest) {
        if self.tx.send(request).is_err() {
            log::error!("sample loader is gone, request dropped");
        }
    }

    pub fn poll(&self) -> Option<LoadResult> {
        self.rx.try_recv().ok()
    }

    #[cfg(test)]
    fn wait(&self) -> Option<LoadResult> {
        self.rx.recv_timeout(std::time::Duration::from_secs(5)).ok()
    }
}
