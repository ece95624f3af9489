pub mod client;
pub mod transport;
pub mod types;

pub use {
    client::{McpClient, McpClientState},
    transport::HttpTransport,
    types::{McpToolDef, PROTOCOL_VERSION, ToolsCallResult},
};
