// Copyright 2018 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::common::net::bind_tcp_listener;
use crate::common::{ClientAddr, ServerError};
use crate::connection::{
    Connection, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_HEADER_BYTES,
};
use crate::router::Router;
use crate::thread_pool::ThreadPool;

/// Everything the serving loop is configured with. The defaults mirror a
/// bare construction: port 8080 on all interfaces, backlog 1, one worker.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Bind host; empty means all interfaces.
    pub host: String,
    pub port: u16,
    pub backlog: i32,
    /// Read chunk for the connection codec.
    pub chunk_size: usize,
    /// 1 handles connections inline on the accept thread; more submits them
    /// to a fixed-size worker pool.
    pub worker_threads: usize,
    /// Sleep tick while the pause flag is set.
    pub pause_sleep: Duration,
    /// Optional sleep between accepts.
    pub accept_sleep: Duration,
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8080,
            backlog: 1,
            chunk_size: DEFAULT_CHUNK_SIZE,
            worker_threads: 1,
            pause_sleep: Duration::from_millis(100),
            accept_sleep: Duration::ZERO,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Remote control over a serving loop: pause, resume, shut down. Obtainable
/// before `serve` takes the server away, or returned by `spawn`.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_flag: Arc<AtomicBool>,
    pause_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting new connections; in-flight ones are unaffected.
    pub fn pause(&self) {
        self.pause_flag.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.pause_flag.store(false, Ordering::SeqCst);
    }

    /// Signals the accept loop, wakes it, and waits until the listener is
    /// closed and every worker has drained.
    pub fn shutdown(mut self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
        self.pause_flag.store(false, Ordering::SeqCst);
        // A blocking accept only notices the flag on its next return.
        let _ = TcpStream::connect(self.addr);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The HTTP server: a TCP listener, a read-only router, and the §5 thread
/// model — one accept thread, connections handled inline or on a fixed
/// worker pool.
pub struct Server {
    listener: TcpListener,
    router: Arc<Router>,
    config: ServerConfig,
    local_addr: SocketAddr,
    shutdown_flag: Arc<AtomicBool>,
    pause_flag: Arc<AtomicBool>,
}

impl Server {
    /// Binds the listening socket (`SO_REUSEADDR` set) without serving yet.
    pub fn bind(router: Router, config: ServerConfig) -> Result<Self, ServerError> {
        let listener = bind_tcp_listener(&config.host, config.port, config.backlog)?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            router: Arc::new(router),
            config,
            local_addr,
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            pause_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A control handle; grab one before calling `serve`.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            addr: self.local_addr,
            shutdown_flag: self.shutdown_flag.clone(),
            pause_flag: self.pause_flag.clone(),
            thread: None,
        }
    }

    /// Binds and serves on a background thread, returning the joinable
    /// control handle.
    pub fn spawn(router: Router, config: ServerConfig) -> Result<ServerHandle, ServerError> {
        let server = Self::bind(router, config)?;
        let mut handle = server.handle();
        let thread = std::thread::spawn(move || {
            if let Err(error) = server.serve() {
                log::error!("server loop failed: {}", error);
            }
        });
        handle.thread = Some(thread);
        Ok(handle)
    }

    /// Runs the accept loop until the shutdown flag is set. Consumes the
    /// server so the listening socket closes when the loop returns.
    pub fn serve(self) -> Result<(), ServerError> {
        log::info!("Serving HTTP on port {}...", self.local_addr.port());
        log::info!("Go to /swagger to see documentation.");
        log::info!("Go to /api for an api playground.");

        let mut pool = (self.config.worker_threads > 1)
            .then(|| ThreadPool::new(self.config.worker_threads));

        while !self.shutdown_flag.load(Ordering::SeqCst) {
            while self.pause_flag.load(Ordering::SeqCst)
                && !self.shutdown_flag.load(Ordering::SeqCst)
            {
                std::thread::sleep(self.config.pause_sleep);
            }
            if self.shutdown_flag.load(Ordering::SeqCst) {
                break;
            }
            if !self.config.accept_sleep.is_zero() {
                std::thread::sleep(self.config.accept_sleep);
            }

            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(error) => {
                    if self.shutdown_flag.load(Ordering::SeqCst) {
                        break;
                    }
                    log::error!("accept failed: {}", error);
                    continue;
                }
            };
            if self.shutdown_flag.load(Ordering::SeqCst) {
                // The wake-up connection from shutdown() lands here.
                break;
            }

            let router = self.router.clone();
            let config = self.config.clone();
            let job = move || handle_connection(stream, peer, router, &config);
            match &pool {
                Some(pool) => pool.execute(job),
                None => job(),
            }
        }

        if let Some(pool) = pool.as_mut() {
            pool.drain();
            pool.shutdown();
        }
        log::info!("server on port {} shut down", self.local_addr.port());
        Ok(())
    }
}

/// One connection, start to finish. The stream closes on every exit path
/// when it drops here.
fn handle_connection(stream: TcpStream, peer: SocketAddr, router: Arc<Router>, config: &ServerConfig) {
    let socket = stream.try_clone().ok().map(Arc::new);
    let mut connection = Connection::new(stream).with_limits(
        config.chunk_size,
        config.max_header_bytes,
        config.max_body_bytes,
    );
    connection.handle(&router, Some(ClientAddr::from(peer)), socket);
}
