//! Self-advertisement as an OSCQuery peer
//!
//! Publishes this process's HTTP/UDP port pair over DNS-SD and runs a
//! minimal OSCQuery responder exposing a writable avatar-change endpoint,
//! so the remote recognizes the UDP listener as a write channel.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use indexmap::IndexMap;
use mdns_sd::{ServiceDaemon, ServiceInfo};
use serde::Serialize;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::osc::AVATAR_CHANGE_ADDRESS;
use crate::oscquery::discovery::{OSCQUERY_SERVICE, OSC_SERVICE};
use crate::oscquery::tree::OscQueryNode;

/// HOST_INFO document served to discovery probes
#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "OSC_IP")]
    pub osc_ip: String,
    #[serde(rename = "OSC_PORT")]
    pub osc_port: u16,
    #[serde(rename = "OSC_TRANSPORT")]
    pub osc_transport: String,
    #[serde(rename = "EXTENSIONS")]
    pub extensions: HashMap<String, bool>,
}

struct Responder {
    host_info: HostInfo,
    tree: OscQueryNode,
}

/// Start the responder and register both DNS-SD records
///
/// Binds an OS-assigned TCP port for the HTTP side; `osc_port` is the UDP
/// port the change listener already receives on. Returns the HTTP port.
pub async fn start(daemon: &ServiceDaemon, service_name: &str, osc_port: u16) -> Result<u16> {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await?;
    let http_port = listener.local_addr()?.port();

    let app = responder_router(service_name, osc_port);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("OSCQuery responder stopped: {e}");
        }
    });

    register(daemon, service_name, http_port, osc_port)?;
    info!("advertising {service_name} (http {http_port}, osc {osc_port})");
    Ok(http_port)
}

/// Router serving HOST_INFO probes and the advertised node tree
pub fn responder_router(service_name: &str, osc_port: u16) -> Router {
    let responder = Arc::new(Responder {
        host_info: HostInfo {
            name: service_name.to_string(),
            osc_ip: "127.0.0.1".to_string(),
            osc_port,
            osc_transport: "UDP".to_string(),
            extensions: HashMap::from([
                ("ACCESS".to_string(), true),
                ("VALUE".to_string(), true),
            ]),
        },
        tree: advertised_tree(),
    });

    Router::new().fallback(respond).with_state(responder)
}

async fn respond(
    State(responder): State<Arc<Responder>>,
    uri: Uri,
    RawQuery(query): RawQuery,
) -> Response {
    if query.is_some_and(|q| q.contains("HOST_INFO")) {
        return Json(&responder.host_info).into_response();
    }
    match responder.tree.node_at(uri.path()) {
        Some(node) => Json(node).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// The node tree this process advertises: a single writable change endpoint
fn advertised_tree() -> OscQueryNode {
    let change = OscQueryNode {
        full_path: Some(AVATAR_CHANGE_ADDRESS.to_string()),
        access: Some(2),
        osc_type: Some("s".to_string()),
        ..Default::default()
    };
    let avatar = OscQueryNode {
        full_path: Some("/avatar".to_string()),
        access: Some(0),
        contents: Some(IndexMap::from([("change".to_string(), change)])),
        ..Default::default()
    };
    OscQueryNode {
        full_path: Some("/".to_string()),
        access: Some(0),
        contents: Some(IndexMap::from([("avatar".to_string(), avatar)])),
        ..Default::default()
    }
}

/// Register `_oscjson._tcp` and `_osc._udp` records for this process
fn register(
    daemon: &ServiceDaemon,
    service_name: &str,
    http_port: u16,
    osc_port: u16,
) -> Result<()> {
    let hostname = format!("{}.local.", service_name.to_lowercase());
    let properties = HashMap::<String, String>::new();

    let query_record = ServiceInfo::new(
        OSCQUERY_SERVICE,
        service_name,
        &hostname,
        "127.0.0.1",
        http_port,
        properties.clone(),
    )
    .map_err(|e| Error::Discovery(e.to_string()))?;
    daemon
        .register(query_record)
        .map_err(|e| Error::Discovery(e.to_string()))?;

    let osc_record = ServiceInfo::new(
        OSC_SERVICE,
        service_name,
        &hostname,
        "127.0.0.1",
        osc_port,
        properties,
    )
    .map_err(|e| Error::Discovery(e.to_string()))?;
    daemon
        .register(osc_record)
        .map_err(|e| Error::Discovery(e.to_string()))?;

    Ok(())
}
