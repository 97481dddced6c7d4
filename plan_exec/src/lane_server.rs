//! # Lane Server
//!
//! Publishes the speed annotated lane produced by each planning cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{
    msg::PlanOutput,
    net::{zmq, JsonMsgError, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Output lane server
pub struct LaneServer {
    socket: MonitoredSocket,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LaneServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the lane: {0}")]
    SendError(JsonMsgError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LaneServer {
    /// Bind the output endpoint.
    ///
    /// This function will not block until a subscriber connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, LaneServerError> {
        let socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            SocketOptions::publisher(),
            &params.output_endpoint,
        )
        .map_err(LaneServerError::SocketError)?;

        Ok(Self { socket })
    }

    /// Publish an output.
    pub fn send(&mut self, output: &PlanOutput) -> Result<(), LaneServerError> {
        self.socket
            .send_json(output)
            .map_err(LaneServerError::SendError)
    }
}
