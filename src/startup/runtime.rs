use std::{future::Future, io};

use bevy::prelude::*;
use tokio::{runtime::Runtime, task::JoinHandle};

const WORKER_THREADS: usize = 2;

/// Tokio runtime for network and decode work. Bevy systems hand it futures
/// and poll the results back through channels.
#[derive(Resource)]
pub struct AsyncRuntime(Runtime);

impl AsyncRuntime {
    pub fn new() -> io::Result<Self> {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(WORKER_THREADS)
            .thread_name("panodock-io")
            .enable_all()
            .build()
            .map(Self)
    }

    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.0.spawn(future)
    }
}
