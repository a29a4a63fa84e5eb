//! Protocol message handlers.
//!
//! Receive-side dispatch mutates coordinator state and queues wire
//! replies; send-side dispatch turns typed user commands into wire
//! messages. Handlers report failure by writing a `-!!-` line and
//! returning `Err`, leaving the connection up.

pub(crate) mod cap;
pub(crate) mod ctcp;
pub(crate) mod recv;
pub(crate) mod send;

use crate::state::Client;

impl Client {
    /// Report a handler failure to the server buffer.
    pub(crate) fn failf(&mut self, sid: usize, text: &str) -> Result<(), ()> {
        self.server_error(sid, text);
        Err(())
    }
}
