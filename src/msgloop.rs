//! Blocking message retrieval and dispatch.
//!
//! Single-threaded: each retrieval blocks until the queue yields a message
//! addressed to the owning window, and every message is dispatched to the
//! bound handler before the next retrieval. Messages are neither buffered nor
//! reordered. The loop ends when the queue signals quit, and the exit code
//! carried by the quit request becomes the loop's return value.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::Result;
use crate::native::{NativeApi, Retrieved, WindowHandle};

pub struct MessageLoop {
    api: Arc<dyn NativeApi>,
    window: WindowHandle,
}

impl MessageLoop {
    pub fn new(api: Arc<dyn NativeApi>, window: WindowHandle) -> Self {
        Self { api, window }
    }

    /// Run until the quit condition, returning its exit code.
    pub fn run(&self) -> Result<i32> {
        loop {
            match self.api.next_message(self.window)? {
                Retrieved::Message(message) => {
                    trace!(message = message.message, "dispatching");
                    self.api.dispatch_message(&message);
                }
                Retrieved::Quit(exit_code) => {
                    debug!(exit_code, "message loop quit");
                    return Ok(exit_code);
                }
            }
        }
    }
}
