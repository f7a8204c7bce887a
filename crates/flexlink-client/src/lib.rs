//! Receiver session management for FlexLink.
//!
//! This is the "just works" layer. Register handlers for the logs you care
//! about, open a [`ConnectionManager`], queue requests, and decoded logs
//! arrive through your handlers on the connection's worker thread.

pub mod best_position;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod queue;
pub mod requests;
pub mod stats;

pub use best_position::{register_best_position, BestPosition, BestPositionHandler};
pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionState};
pub use dispatcher::Dispatcher;
pub use error::{ClientError, Result};
pub use handler::{factory, HandlerFactory, PacketHandler};
pub use queue::PacketQueue;
pub use requests::{best_position_on_time, stop_log, LogRequest, LogTrigger};
pub use stats::{ConnectionStats, StatsSnapshot};
