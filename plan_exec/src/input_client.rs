//! # Input Client
//!
//! The InputClient receives the planner's inputs (lane, pose, velocity, vehicle status and
//! detected objects) from the upstream stack and stores them in the [`InputCache`].
//!
//! Inputs are published as JSON encoded [`PlanInput`]s, as often as the upstream nodes produce
//! them. A background thread owns the subscriber socket and writes each message into its slot as
//! soon as it arrives, the main loop only ever reads the cache.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};
use log::{debug, error, warn};

use crate::input_cache::InputCache;
use comms_if::{
    msg::PlanInput,
    net::{zmq, JsonMsgError, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Receive timeout of the background thread, bounds how long `stop` takes to be noticed.
const RECV_TIMEOUT_MS: i32 = 10;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct InputClient {
    bg_jh: Option<JoinHandle<()>>,
    bg_run: Arc<AtomicBool>,
    cache: InputCache,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum InputClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl InputClient {
    /// Connect to the input endpoint and start the background thread.
    ///
    /// Does not block waiting for the publishers.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, InputClientError> {
        let socket = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            SocketOptions::subscriber(RECV_TIMEOUT_MS),
            &params.input_endpoint,
        )
        .map_err(InputClientError::SocketError)?;

        let bg_run = Arc::new(AtomicBool::new(true));
        let cache = InputCache::new();

        let bg_run_clone = bg_run.clone();
        let cache_clone = cache.clone();

        let bg_jh = Some(thread::spawn(move || {
            bg_thread(socket, bg_run_clone, cache_clone)
        }));

        Ok(Self {
            bg_jh,
            bg_run,
            cache,
        })
    }

    /// The cache the client writes into.
    pub fn cache(&self) -> &InputCache {
        &self.cache
    }

    /// Stop the background thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.bg_jh.take() {
            if jh.join().is_err() {
                error!("InputClient background thread panicked");
            }
        }
    }
}

impl Drop for InputClient {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Background thread, stores every received input in the cache.
fn bg_thread(socket: MonitoredSocket, run: Arc<AtomicBool>, cache: InputCache) {
    let mut was_connected = false;

    while run.load(Ordering::Relaxed) {
        if socket.connected() != was_connected {
            was_connected = socket.connected();
            debug!("InputClient connected: {}", was_connected);
        }

        match socket.recv_json::<PlanInput>() {
            Ok(Some(input)) => cache.handle(input),
            Ok(None) => continue,
            Err(e @ JsonMsgError::NonUtf8) | Err(e @ JsonMsgError::DeserializeError(_)) => {
                warn!("Discarding invalid input message: {}", e);
            }
            Err(e) => {
                error!("Error receiving input message: {}", e);
                break;
            }
        }
    }
}
