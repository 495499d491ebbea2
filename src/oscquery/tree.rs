//! OSCQuery parameter tree client
//!
//! Queries the discovered HTTP root for the nested node tree and filters
//! the avatar parameter leaves by access rights. The tree is loosely typed
//! JSON on the wire; shape mismatches surface as RemoteQuery errors instead
//! of panicking mid-walk.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::osc::ParamValue;

/// Remote-declared access rights for one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    None,
    Read,
    Write,
    ReadWrite,
}

impl AccessLevel {
    /// Map the wire code (0-3); unknown codes count as no access
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => AccessLevel::Read,
            2 => AccessLevel::Write,
            3 => AccessLevel::ReadWrite,
            _ => AccessLevel::None,
        }
    }
}

/// One node of the remote OSCQuery tree
///
/// The same shape is served back by the self-advertisement responder, so
/// this type both deserializes and serializes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OscQueryNode {
    #[serde(rename = "FULL_PATH", default, skip_serializing_if = "Option::is_none")]
    pub full_path: Option<String>,

    #[serde(rename = "ACCESS", default, skip_serializing_if = "Option::is_none")]
    pub access: Option<u8>,

    #[serde(rename = "TYPE", default, skip_serializing_if = "Option::is_none")]
    pub osc_type: Option<String>,

    #[serde(rename = "VALUE", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<serde_json::Value>>,

    /// Child nodes; IndexMap keeps document order, which is the order
    /// parameters were discovered in
    #[serde(rename = "CONTENTS", default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<IndexMap<String, OscQueryNode>>,
}

impl OscQueryNode {
    /// Declared access level, defaulting to no access
    pub fn access(&self) -> AccessLevel {
        AccessLevel::from_code(self.access.unwrap_or(0))
    }

    /// First element of VALUE, if any
    pub fn first_value(&self) -> Option<&serde_json::Value> {
        self.value.as_ref().and_then(|v| v.first())
    }

    /// Named child of this node
    pub fn child(&self, name: &str) -> Option<&OscQueryNode> {
        self.contents.as_ref().and_then(|c| c.get(name))
    }

    /// Walk an address path ("/avatar/change") from this node
    pub fn node_at(&self, path: &str) -> Option<&OscQueryNode> {
        let mut node = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            node = node.child(segment)?;
        }
        Some(node)
    }
}

/// One parameter leaf as declared by the remote tree (ephemeral, never persisted)
#[derive(Debug, Clone)]
pub struct RemoteParameter {
    pub name: String,
    pub access: AccessLevel,
    pub value: Option<ParamValue>,
}

/// Extract the replayable parameter leaves from a fetched tree
///
/// Only readwrite entries survive; read-only and write-only parameters
/// cannot be safely captured and replayed. Iteration order is the tree's
/// own mapping order.
pub fn readwrite_parameters(root: &OscQueryNode) -> Result<Vec<RemoteParameter>> {
    let parameters = root
        .child("avatar")
        .and_then(|n| n.child("parameters"))
        .ok_or_else(|| Error::RemoteQuery("tree has no avatar parameter branch".to_string()))?;

    let contents = parameters
        .contents
        .as_ref()
        .ok_or_else(|| Error::RemoteQuery("avatar parameter branch has no contents".to_string()))?;

    let mut out = Vec::new();
    for (name, node) in contents {
        let access = node.access();
        if access != AccessLevel::ReadWrite {
            continue;
        }
        out.push(RemoteParameter {
            name: name.clone(),
            access,
            value: node.first_value().and_then(ParamValue::from_json),
        });
    }
    Ok(out)
}

/// HTTP client for one discovered OSCQuery root
#[derive(Debug, Clone)]
pub struct OscQueryClient {
    root: String,
    http: reqwest::Client,
}

impl OscQueryClient {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            http: reqwest::Client::new(),
        }
    }

    /// The HTTP query root this client talks to
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Fetch a single node; None when the remote does not expose the path yet
    pub async fn query_node(&self, path: &str) -> Result<Option<OscQueryNode>> {
        let url = format!("{}{}", self.root, path);
        let response = self.http.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let node = response.error_for_status()?.json::<OscQueryNode>().await?;
        Ok(Some(node))
    }

    /// Poll a node until it resolves with a non-null value
    ///
    /// Transient failures are retried at the poll interval; only the overall
    /// deadline fails the wait.
    pub async fn wait_for_value(
        &self,
        path: &str,
        poll_interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<OscQueryNode> {
        let started = Instant::now();
        loop {
            match self.query_node(path).await {
                Ok(Some(node)) if node.first_value().is_some_and(|v| !v.is_null()) => {
                    return Ok(node);
                }
                Ok(_) => debug!("{path} not ready yet"),
                Err(e) => debug!("transient error polling {path}: {e}"),
            }

            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    return Err(Error::DiscoveryTimeout {
                        service: format!("{}{}", self.root, path),
                        waited: started.elapsed(),
                    });
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Fetch the full tree and keep only replayable parameter leaves
    pub async fn fetch_readwrite_parameters(&self) -> Result<Vec<RemoteParameter>> {
        let root = self
            .query_node("/")
            .await?
            .ok_or_else(|| Error::RemoteQuery("query root returned no tree".to_string()))?;
        readwrite_parameters(&root)
    }
}
