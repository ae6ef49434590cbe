//! # Vision Client
//!
//! Receives frames from the vision coprocessor. Frames are published as JSON on a PUB socket as
//! fast as the coprocessor produces them. A background thread subscribes to them and posts the
//! latest one into a [`Mailbox`] which the main loop reads once per cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{atomic::{AtomicBool, Ordering}, Arc},
    thread::{self, JoinHandle},
};
use log::{error, info, warn};

use comms_if::{
    eqpt::vision::VisionFrame,
    net::{zmq, JsonMsgError, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};
use super::Mailbox;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct VisionClient {
    bg_jh: Option<JoinHandle<()>>,
    bg_run: Arc<AtomicBool>,
    latest: Mailbox<VisionFrame>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum VisionClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not subscribe to vision frames: {0}")]
    SubscribeError(zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VisionClient {
    /// Connect to the vision publisher and start receiving frames.
    ///
    /// This function will not block until the publisher is up.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, VisionClientError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 100,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            socket_options,
            &params.vision_endpoint
        ).map_err(VisionClientError::SocketError)?;

        socket.set_subscribe(b"")
            .map_err(VisionClientError::SubscribeError)?;

        let bg_run = Arc::new(AtomicBool::new(true));
        let latest = Mailbox::new();

        let bg_run_clone = bg_run.clone();
        let latest_clone = latest.clone();

        let bg_jh = Some(thread::spawn(move || {
            bg_thread(socket, bg_run_clone, latest_clone)
        }));

        info!("VisionClient subscribed to {}", params.vision_endpoint);

        Ok(Self {
            bg_jh,
            bg_run,
            latest,
        })
    }

    /// Get the latest frame received, if any.
    pub fn latest_frame(&self) -> Option<VisionFrame> {
        self.latest.peek()
    }
}

impl Drop for VisionClient {
    fn drop(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.bg_jh.take() {
            jh.join().ok();
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Background thread, posts each frame the publisher sends into the mailbox.
fn bg_thread(
    socket: MonitoredSocket,
    run: Arc<AtomicBool>,
    latest: Mailbox<VisionFrame>
) {
    while run.load(Ordering::Relaxed) {
        let frame: VisionFrame = match socket.recv_json(0) {
            Ok(f) => f,
            Err(JsonMsgError::NoMessage) => continue,
            Err(JsonMsgError::SocketError(e)) => {
                error!("Error receiving frame from the vision publisher: {:?}", e);
                break
            },
            Err(e) => {
                warn!("Invalid frame from the vision publisher: {}", e);
                continue
            }
        };

        latest.post(frame);
    }
}
