// Copyright 2018 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool over a rendezvous channel: `execute` blocks until
/// a worker is free, which keeps accept-loop backpressure honest. Workers
/// stay joinable so shutdown can prove none are left behind.
pub struct ThreadPool {
    tx: Option<crossbeam_channel::Sender<Job>>,
    busy: Arc<AtomicUsize>,
    idle_signal: Arc<(Mutex<()>, Condvar)>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new(size: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded::<Job>(0);
        let busy = Arc::new(AtomicUsize::new(0));
        let idle_signal = Arc::new((Mutex::new(()), Condvar::new()));

        let workers = (0..size)
            .map(|index| {
                let rx = rx.clone();
                let busy = busy.clone();
                let idle_signal = idle_signal.clone();

                std::thread::spawn(move || {
                    // Runs until the sender side is dropped at shutdown.
                    while let Ok(job) = rx.recv() {
                        busy.fetch_add(1, Ordering::SeqCst);
                        job();
                        // fetch_sub returns the previous count; 1 means this
                        // worker was the last one busy.
                        if busy.fetch_sub(1, Ordering::SeqCst) == 1 {
                            let (lock, cvar) = &*idle_signal;
                            let guard = lock.lock().unwrap();
                            cvar.notify_all();
                            drop(guard);
                        }
                    }
                    log::debug!("pool worker {} stopped", index);
                })
            })
            .collect();

        ThreadPool {
            tx: Some(tx),
            busy,
            idle_signal,
            workers,
        }
    }

    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.tx {
            Some(tx) => {
                if tx.send(Box::new(f)).is_err() {
                    log::error!("no workers left to take the job");
                }
            }
            None => log::error!("pool already shut down, dropping job"),
        }
    }

    /// Blocks until every running job has finished.
    pub fn drain(&self) {
        let (lock, cvar) = &*self.idle_signal;
        let mut guard = lock.lock().unwrap();
        while self.busy.load(Ordering::SeqCst) > 0 {
            guard = cvar.wait(guard).unwrap();
        }
    }

    /// Closes the job channel and joins every worker thread.
    pub fn shutdown(&mut self) {
        self.tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
