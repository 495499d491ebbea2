//! UDP listener for avatar change notifications
//!
//! Long-lived receive loop feeding the shared avatar state. Malformed
//! packets are logged and skipped; the loop itself never exits.

use std::net::SocketAddr;
use std::sync::Arc;

use rosc::{decoder, OscPacket, OscType};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::avatar::AvatarState;
use crate::error::Result;
use crate::osc::AVATAR_CHANGE_ADDRESS;

/// Inbound change-notification listener
pub struct ChangeListener {
    socket: UdpSocket,
    local_addr: SocketAddr,
    avatar: Arc<AvatarState>,
}

impl ChangeListener {
    /// Bind an OS-assigned local UDP port
    pub async fn bind(avatar: Arc<AvatarState>) -> Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let local_addr = socket.local_addr()?;
        Ok(Self {
            socket,
            local_addr,
            avatar,
        })
    }

    /// Port the listener receives on, for self-advertisement
    pub fn local_port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Receive loop; runs until the task is dropped
    pub async fn run(self) {
        let mut buf = vec![0u8; 4096];
        loop {
            let len = match self.socket.recv(&mut buf).await {
                Ok(len) => len,
                Err(e) => {
                    warn!("change listener recv error: {e}");
                    continue;
                }
            };

            match decoder::decode_udp(&buf[..len]) {
                Ok((_, packet)) => self.dispatch(packet).await,
                Err(e) => warn!("ignoring malformed OSC datagram: {e}"),
            }
        }
    }

    /// Handle one decoded packet, flattening any bundles
    async fn dispatch(&self, packet: OscPacket) {
        let mut pending = vec![packet];
        while let Some(packet) = pending.pop() {
            match packet {
                OscPacket::Message(msg) => {
                    if msg.addr != AVATAR_CHANGE_ADDRESS {
                        debug!("ignoring message for {}", msg.addr);
                        continue;
                    }
                    match msg.args.first() {
                        Some(OscType::String(identity)) => {
                            self.avatar.observe(identity).await;
                        }
                        other => {
                            warn!("change notification without identity argument: {other:?}")
                        }
                    }
                }
                OscPacket::Bundle(bundle) => pending.extend(bundle.content),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{encoder, OscMessage};
    use std::time::Duration;

    fn change_datagram(identity: &str) -> Vec<u8> {
        encoder::encode(&OscPacket::Message(OscMessage {
            addr: AVATAR_CHANGE_ADDRESS.to_string(),
            args: vec![OscType::String(identity.to_string())],
        }))
        .unwrap()
    }

    async fn wait_for_identity(avatar: &AvatarState, expected: &str) {
        for _ in 0..100 {
            if avatar.current().await.as_deref() == Some(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("avatar never became {expected}");
    }

    #[tokio::test]
    async fn updates_state_on_change_notification() {
        let avatar = Arc::new(AvatarState::new());
        let listener = ChangeListener::bind(avatar.clone()).await.unwrap();
        let port = listener.local_port();
        tokio::spawn(listener.run());

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(&change_datagram("avtr_new"), ("127.0.0.1", port))
            .await
            .unwrap();

        wait_for_identity(&avatar, "avtr_new").await;
        assert_eq!(avatar.transitions(), 1);
    }

    #[tokio::test]
    async fn survives_malformed_datagrams() {
        let avatar = Arc::new(AvatarState::new());
        let listener = ChangeListener::bind(avatar.clone()).await.unwrap();
        let port = listener.local_port();
        tokio::spawn(listener.run());

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(b"definitely not osc", ("127.0.0.1", port))
            .await
            .unwrap();
        sender
            .send_to(&change_datagram("avtr_after_garbage"), ("127.0.0.1", port))
            .await
            .unwrap();

        wait_for_identity(&avatar, "avtr_after_garbage").await;
    }

    #[tokio::test]
    async fn ignores_unrelated_addresses() {
        let avatar = Arc::new(AvatarState::new());
        let listener = ChangeListener::bind(avatar.clone()).await.unwrap();
        let port = listener.local_port();
        tokio::spawn(listener.run());

        let unrelated = encoder::encode(&OscPacket::Message(OscMessage {
            addr: "/avatar/parameters/Wings".to_string(),
            args: vec![OscType::Float(1.0)],
        }))
        .unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(&unrelated, ("127.0.0.1", port))
            .await
            .unwrap();
        sender
            .send_to(&change_datagram("avtr_only_change"), ("127.0.0.1", port))
            .await
            .unwrap();

        wait_for_identity(&avatar, "avtr_only_change").await;
        assert_eq!(avatar.transitions(), 1);
    }
}
