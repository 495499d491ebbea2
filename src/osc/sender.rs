//! Outbound OSC datagram sender
//!
//! One datagram per parameter, best-effort. The transport gives no
//! acknowledgment and no delivery-order guarantee.

use std::net::SocketAddr;

use rosc::{encoder, OscMessage, OscPacket};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::{Error, Result};
use crate::osc::{parameter_address, ParamValue};

/// UDP sender for parameter value-set messages
pub struct ParameterSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl ParameterSender {
    /// Bind an ephemeral local socket aimed at the remote OSC input
    pub async fn connect(target: SocketAddr) -> Result<Self> {
        let bind_addr = if target.is_ipv4() {
            SocketAddr::from((std::net::Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((std::net::Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(target).await?;
        Ok(Self { socket, target })
    }

    /// Destination address datagrams are sent to
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send one value-set message to an explicit address path
    pub async fn send(&self, address: &str, value: ParamValue) -> Result<()> {
        let packet = OscPacket::Message(OscMessage {
            addr: address.to_string(),
            args: vec![value.to_osc()],
        });
        let bytes = encoder::encode(&packet).map_err(|e| Error::Osc(e.to_string()))?;
        self.socket.send(&bytes).await?;
        debug!("sent {address} = {value}");
        Ok(())
    }

    /// Send one value-set message for a namespace-free parameter name
    pub async fn send_parameter(&self, name: &str, value: ParamValue) -> Result<()> {
        self.send(&parameter_address(name), value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{decoder, OscType};

    #[tokio::test]
    async fn sends_decodable_datagrams() {
        let capture = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = capture.local_addr().unwrap();

        let sender = ParameterSender::connect(target).await.unwrap();
        sender
            .send_parameter("Wings", ParamValue::Float(0.75))
            .await
            .unwrap();

        let mut buf = [0u8; 1536];
        let (len, _) = capture.recv_from(&mut buf).await.unwrap();
        let (_, packet) = decoder::decode_udp(&buf[..len]).unwrap();
        match packet {
            OscPacket::Message(msg) => {
                assert_eq!(msg.addr, "/avatar/parameters/Wings");
                assert_eq!(msg.args, vec![OscType::Float(0.75)]);
            }
            other => panic!("unexpected packet: {other:?}"),
        }
    }
}
