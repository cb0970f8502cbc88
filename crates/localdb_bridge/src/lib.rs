//! # LocalDB Bridge
//!
//! Lets code in one execution context use a [`localdb_core::LocalDb`] or a
//! [`localdb_core::SimpleDb`] owned by another.
//!
//! - [`BackgroundHost`] runs in the owning process and dispatches calls to
//!   the agents registered under each namespace
//! - [`LocalDbProxy`] implements [`localdb_core::LocalDbApi`] and
//!   [`SimpleDbProxy`] implements [`localdb_core::SimpleDbApi`], forwarding
//!   every call through a [`BackgroundTransport`]
//! - [`FramedTransport`] carries CBOR frames over any [`FrameChannel`];
//!   [`LoopbackChannel`] and [`ThreadChannel`] are provided
//!
//! Callers written against `LocalDbApi` behave the same with the proxy as
//! with the database itself: same results, same error variants.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod host;
mod protocol;
mod proxy;
mod transport;

pub use error::{BridgeError, BridgeResult, RemoteError};
pub use host::BackgroundHost;
pub use protocol::{
    decode, encode, DbCall, DbReply, Request, Response, LOCAL_DB_NAMESPACE, SIMPLE_DB_NAMESPACE,
};
pub use proxy::{LocalDbProxy, SimpleDbProxy};
pub use transport::{
    BackgroundTransport, FrameChannel, FramedTransport, LoopbackChannel, LoopbackTransport,
    ThreadChannel, ThreadTransport,
};
