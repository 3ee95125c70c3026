//! Realtime transport runtime: WebSocket sessions and the conversation
//! session manager.
//!
//! `client-core` holds the pure contract (types, merge buffer, queue, state
//! machine); this crate binds it to the network: one tokio-tungstenite
//! connection per open conversation, a REST history fetcher, and the
//! manager that wires history, live events and outbound sends into one
//! consumer-facing handle.

/// Connection seam and the tokio-tungstenite implementation.
pub mod connector;
/// Conversation session manager and consumer handle.
pub mod manager;
/// Credential and history collaborator traits with adapters.
pub mod provider;
/// Per-conversation transport session run loop.
pub mod session;

#[cfg(test)]
pub(crate) mod mock;

pub use connector::{Connector, WireConnection, WsConnector, endpoint_url};
pub use manager::{ConversationHandle, ConversationManager, ManagerConfig};
pub use provider::{
    CredentialProvider, EnvCredentialProvider, HistoryFetcher, RestHistoryFetcher,
    StaticCredentialProvider,
};
pub use session::TransportSession;
