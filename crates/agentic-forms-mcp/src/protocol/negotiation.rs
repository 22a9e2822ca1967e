//! Handshake state.

use agentic_forms::SchedulerConfig;

use crate::types::{InitializeParams, InitializeResult, MCP_VERSION};

/// What the client told us at `initialize`.
#[derive(Debug, Clone, Default)]
pub struct NegotiatedCapabilities {
    pub client_name: Option<String>,
    pub client_version: Option<String>,
    pub requested_version: Option<String>,
    pub initialized: bool,
}

impl NegotiatedCapabilities {
    /// Record the client and answer with the server's own protocol
    /// version. A mismatched request is logged, not refused.
    pub fn negotiate(
        &mut self,
        params: InitializeParams,
        scheduler: &SchedulerConfig,
    ) -> InitializeResult {
        if params.protocol_version != MCP_VERSION {
            tracing::warn!(
                requested = %params.protocol_version,
                supported = MCP_VERSION,
                "Protocol version mismatch, answering with server version"
            );
        }
        if self.client_name.is_some() {
            tracing::warn!("Client sent initialize twice");
        }

        tracing::info!(
            client = %params.client_info.name,
            version = %params.client_info.version,
            "Client connected"
        );

        self.client_name = Some(params.client_info.name);
        self.client_version = Some(params.client_info.version);
        self.requested_version = Some(params.protocol_version);

        InitializeResult::for_scheduler(scheduler)
    }

    pub fn mark_initialized(&mut self) {
        self.initialized = true;
        tracing::info!("MCP handshake complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientInfo;

    #[test]
    fn test_records_client_and_answers_server_version() {
        let mut caps = NegotiatedCapabilities::default();
        let result = caps.negotiate(
            InitializeParams {
                protocol_version: "2099-01-01".to_string(),
                capabilities: serde_json::Value::Null,
                client_info: ClientInfo {
                    name: "autofill-agent".to_string(),
                    version: "0.3".to_string(),
                },
            },
            &SchedulerConfig::default(),
        );

        assert_eq!(result.protocol_version, MCP_VERSION);
        assert_eq!(caps.client_name.as_deref(), Some("autofill-agent"));
        assert_eq!(caps.requested_version.as_deref(), Some("2099-01-01"));
        assert!(!caps.initialized);

        caps.mark_initialized();
        assert!(caps.initialized);
    }
}
