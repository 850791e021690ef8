//! Clients for the central fleet registry.

use std::time::Duration;

use anyhow::{Context, Error};
use enumflags2::{bitflags, BitFlags};
use log::{debug, info};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;
use url::Url;

use provisioner_api::constants::RAID_ENABLED_TAG;

const REGISTRY_TIMEOUT: Duration = Duration::from_secs(30);

/// Canned operator notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum NotifyMessage {
    InsufficientMemory,
    InsufficientDisk,
}

/// Who receives a notification.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Principal investigators of the site.
    Pis = 1 << 0,
    /// Technical contacts of the site.
    Techs = 1 << 1,
    /// Fleet support staff.
    Support = 1 << 2,
}

pub type Audience = BitFlags<Recipient>;

/// An operator-set attribute of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTag {
    #[serde(rename = "tagname")]
    pub name: String,
    pub value: String,
}

/// Remote calls made by the engine.
pub trait Registry {
    /// Sends a notification, returning whether the registry reports it as sent.
    fn notify(&self, message: NotifyMessage, audience: Audience) -> Result<bool, Error>;

    /// Fetches the tags set on `node_id`.
    fn node_tags(&self, node_id: u64) -> Result<Vec<NodeTag>, Error>;
}

/// Whether the fleet asked for the node's disks to be combined into a RAID array.
pub fn raid_enabled(tags: &[NodeTag]) -> bool {
    tags.iter().any(|tag| tag.name == RAID_ENABLED_TAG && tag.value == "1")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotifyRequest {
    node_id: u64,
    message: NotifyMessage,
    include_pis: bool,
    include_techs: bool,
    include_support: bool,
}

#[derive(Debug, Deserialize)]
struct NotifyResponse {
    sent: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeTagsRequest {
    node_id: u64,
}

/// JSON-over-HTTP registry client.
pub struct HttpRegistry {
    base: Url,
    node_id: u64,
    client: reqwest::blocking::Client,
}

impl HttpRegistry {
    pub fn new(base: Url, node_id: u64) -> Result<Self, Error> {
        let client = reqwest::blocking::ClientBuilder::new()
            .timeout(REGISTRY_TIMEOUT)
            .build()
            .context("Failed to build registry HTTP client")?;
        Ok(Self {
            base,
            node_id,
            client,
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), name)
    }

    fn call<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        name: &str,
        request: &Req,
    ) -> Result<Resp, Error> {
        let url = self.endpoint(name);
        debug!("Calling registry at '{url}'");
        let body = serde_json::to_vec(request).context("Failed to serialize request")?;
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .context(format!("Failed to reach registry at '{url}'"))?
            .error_for_status()
            .context(format!("Registry call '{name}' was rejected"))?;
        let text = response
            .text()
            .context(format!("Failed to read response of '{name}'"))?;
        serde_json::from_str(&text).context(format!("Malformed response of '{name}': {text}"))
    }
}

impl Registry for HttpRegistry {
    fn notify(&self, message: NotifyMessage, audience: Audience) -> Result<bool, Error> {
        let response: NotifyResponse = self.call(
            "notify",
            &NotifyRequest {
                node_id: self.node_id,
                message,
                include_pis: audience.contains(Recipient::Pis),
                include_techs: audience.contains(Recipient::Techs),
                include_support: audience.contains(Recipient::Support),
            },
        )?;
        Ok(response.sent)
    }

    fn node_tags(&self, node_id: u64) -> Result<Vec<NodeTag>, Error> {
        self.call("node-tags", &NodeTagsRequest { node_id })
    }
}

/// Used when no registry is configured.
pub struct OfflineRegistry;

impl Registry for OfflineRegistry {
    fn notify(&self, message: NotifyMessage, _audience: Audience) -> Result<bool, Error> {
        info!(
            "No registry configured, not sending '{}' notification",
            <&str>::from(message)
        );
        Ok(false)
    }

    fn node_tags(&self, _node_id: u64) -> Result<Vec<NodeTag>, Error> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;

    fn tag(name: &str, value: &str) -> NodeTag {
        NodeTag {
            name: name.into(),
            value: value.into(),
        }
    }

    #[test]
    fn test_raid_enabled() {
        assert!(!raid_enabled(&[]));
        assert!(raid_enabled(&[tag("arch", "x86_64"), tag("raid_enabled", "1")]));
        assert!(!raid_enabled(&[tag("raid_enabled", "0")]));
        assert!(!raid_enabled(&[tag("raid_enabled", "true")]));
    }

    #[test]
    fn test_notify() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/notify")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "nodeId": 7,
                "message": "insufficient-disk",
                "includePis": false,
                "includeTechs": true,
                "includeSupport": false,
            })))
            .with_status(200)
            .with_body(r#"{"sent": true}"#)
            .expect(1)
            .create();

        let base = Url::parse(&format!("{}/api/", server.url())).unwrap();
        let registry = HttpRegistry::new(base, 7).unwrap();
        assert!(registry
            .notify(NotifyMessage::InsufficientDisk, Recipient::Techs.into())
            .unwrap());
        mock.assert();
    }

    #[test]
    fn test_notify_rejected() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("POST", "/notify").with_status(500).create();

        let registry = HttpRegistry::new(Url::parse(&server.url()).unwrap(), 7).unwrap();
        registry
            .notify(NotifyMessage::InsufficientMemory, Recipient::Techs.into())
            .unwrap_err();
    }

    #[test]
    fn test_node_tags() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/node-tags")
            .match_body(Matcher::Json(json!({ "nodeId": 12 })))
            .with_status(200)
            .with_body(r#"[{"tagname": "raid_enabled", "value": "1"}]"#)
            .create();

        let registry = HttpRegistry::new(Url::parse(&server.url()).unwrap(), 12).unwrap();
        let tags = registry.node_tags(12).unwrap();
        assert_eq!(tags, vec![tag("raid_enabled", "1")]);
        assert!(raid_enabled(&tags));
        mock.assert();
    }

    #[test]
    fn test_offline_registry() {
        assert!(!OfflineRegistry
            .notify(NotifyMessage::InsufficientDisk, Audience::all())
            .unwrap());
        assert!(OfflineRegistry.node_tags(1).unwrap().is_empty());
    }
}
