//! # slirc
//!
//! The core of a terminal IRC client: a protocol engine and I/O
//! coordinator that maintains multiple concurrent server connections,
//! implements RFC 2812 with IRCv3 extensions, and manages per-channel
//! conversational state with wrap-aware scrollback buffers and a
//! line-editable input.
//!
//! ## Architecture
//!
//! One single-threaded coordinator ([`state::Client`]) owns all
//! protocol and UI state; one worker thread per server connection
//! ([`io::Connection`]) owns its socket and TLS session. Workers report
//! back through [`io::IoCallbacks`] under a shared mutex, so every
//! state mutation happens in a total order. Rendering, CLI parsing and
//! configuration are left to the consuming front end, which drives the
//! client with raw terminal input and reads back channels, buffers and
//! draw flags.
//!
//! ## Quick start
//!
//! ```no_run
//! use slirc::state::{Client, ClientConfig};
//! use slirc::io::IoFlags;
//!
//! let client = Client::new_shared(ClientConfig::default());
//!
//! {
//!     let mut c = client.lock().unwrap();
//!     c.connect(
//!         "irc.libera.chat",
//!         6697,
//!         None,
//!         "user",
//!         "real name",
//!         "nick,nick_,nick__",
//!         Some("#rust"),
//!         IoFlags::default(),
//!     )
//!     .expect("connect");
//! }
//!
//! // feed terminal bytes: client.lock().unwrap().read_input(b"hello\n");
//! // and consume draw flags from the render loop.
//! ```

#![deny(clippy::all)]

pub mod buffer;
pub mod caps;
pub mod casemap;
pub mod channel;
pub mod ctcp;
pub mod error;
mod handlers;
pub mod input;
pub mod io;
pub mod message;
pub mod mode;
pub mod sasl;
pub mod server;
pub mod state;
pub mod user;
pub mod util;

pub use self::buffer::{Buffer, BufferLine, LineType};
pub use self::caps::{Cap, Caps};
pub use self::casemap::{irc_eq, Casemap};
pub use self::channel::{Activity, Channel, ChannelKind};
pub use self::ctcp::Ctcp;
pub use self::error::{Error, MessageParseError};
pub use self::input::Input;
pub use self::io::{Connection, IoCallbacks, IoConfig, IoFlags, TlsVerify};
pub use self::message::Message;
pub use self::mode::{Mode, ModeCfg, ModeSet};
pub use self::server::Server;
pub use self::state::{Client, ClientConfig, DrawFlags, Target};
pub use self::user::{User, UserList};
