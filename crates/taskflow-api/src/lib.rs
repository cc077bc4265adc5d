// taskflow-api: HTTP gateway and realtime channel client for the task service

pub mod channel;
pub mod error;
pub mod gateway;
pub mod tasks;

pub use channel::{ChannelConfig, ChannelHandle, ChannelState, EventStream, Transport};
pub use error::Error;
pub use gateway::{CredentialPolicy, Gateway, GatewayConfig};
pub use tasks::{Ack, DeleteRecord, Envelope, TaskPayload, TaskRecord};
