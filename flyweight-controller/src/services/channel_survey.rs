use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use flyweight_api::command::{NetCheck, NetCheckType, NetMgmtCommand};
use flyweight_api::{NetAddress, NetGuid, NetworkId, Packet};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::errors::ControllerError;
use crate::models::{ChannelInfo, MAX_CHANNELS};
use crate::services::listeners::{ChannelSelection, PacketSink};

/// Time allowed for net-check responses on each surveyed channel
pub const NETCHECK_DELAY: Duration = Duration::from_millis(250);

const NO_CHANNEL: u8 = u8::MAX;

pub struct ChannelSurveyor {
    network_id: NetworkId,
    server_address: NetAddress,
    preferred_channel: Option<u8>,
    channels: RwLock<[ChannelInfo; MAX_CHANNELS]>,
    current_channel: AtomicU8,
    selected: AtomicBool,
}

impl ChannelSurveyor {
    pub fn new(network_id: NetworkId, server_address: NetAddress) -> Self {
        Self {
            network_id,
            server_address,
            preferred_channel: None,
            channels: RwLock::new([ChannelInfo::default(); MAX_CHANNELS]),
            current_channel: AtomicU8::new(NO_CHANNEL),
            selected: AtomicBool::new(false),
        }
    }

    pub fn with_preferred_channel(mut self, channel: Option<u8>) -> Self {
        self.preferred_channel = channel;
        self
    }

    pub fn current_channel(&self) -> Option<u8> {
        match self.current_channel.load(Ordering::SeqCst) {
            NO_CHANNEL => None,
            channel => Some(channel),
        }
    }

    pub async fn channel_info(&self, channel: u8) -> Option<ChannelInfo> {
        self.channels.read().await.get(channel as usize).copied()
    }

    /// Answers net-check requests and tallies responses heard on the broadcast network.
    pub async fn handle_net_check(&self, check: &NetCheck) -> Option<Packet> {
        match check.check_type {
            NetCheckType::Request => self.respond_to_request(check),
            NetCheckType::Response => {
                self.record_response(check).await;
                None
            }
        }
    }

    fn respond_to_request(&self, check: &NetCheck) -> Option<Packet> {
        // Broadcast scope gets the private marker so the gateway can stamp its own identity
        let (network_id, guid) = if check.network_id.is_broadcast() {
            (NetworkId::BROADCAST, NetGuid::PRIVATE_TEXT.into())
        } else if check.network_id == self.network_id {
            (self.network_id, check.guid.clone())
        } else {
            return None;
        };

        let response = NetMgmtCommand::Check(NetCheck {
            check_type: NetCheckType::Response,
            network_id,
            guid,
            channel: check.channel,
            channel_energy: 0,
            link_quality: 0,
        });
        Some(Packet::new(
            response,
            network_id,
            self.server_address,
            NetAddress::BROADCAST,
        ))
    }

    async fn record_response(&self, check: &NetCheck) {
        if !check.network_id.is_broadcast() {
            return;
        }

        let mut channels = self.channels.write().await;
        let Some(info) = channels.get_mut(check.channel as usize) else {
            warn!("Net-check response for invalid channel {}", check.channel);
            return;
        };

        match NetGuid::parse(&check.guid) {
            Ok(guid) if guid == NetGuid::PRIVATE => {
                info.record_energy(check.channel_energy);
                debug!(
                    "Channel {} energy {}",
                    check.channel, check.channel_energy
                );
            }
            Ok(guid) => {
                info.increment_controller_count();
                debug!(
                    "Controller {} heard on channel {} ({} total)",
                    guid,
                    check.channel,
                    info.peers()
                );
            }
            Err(e) => warn!("Dropping net-check response: {}", e),
        }
    }

    /// Picks the operating channel, surveying every channel unless one is preferred.
    ///
    /// Fewest peer controllers wins, then lowest energy, then lowest channel.
    pub async fn select_channel(&self, sink: &dyn PacketSink) -> Result<u8, ControllerError> {
        if let Some(channel) = self.preferred_channel {
            self.set_radio_channel(channel, sink)?;
            return Ok(channel);
        }

        for channel in 0..MAX_CHANNELS as u8 {
            self.channels.write().await[channel as usize].reset();

            let probe = Packet::new(
                NetMgmtCommand::Check(NetCheck {
                    check_type: NetCheckType::Request,
                    network_id: NetworkId::BROADCAST,
                    guid: NetGuid::PRIVATE_TEXT.into(),
                    channel,
                    channel_energy: 0,
                    link_quality: 0,
                }),
                NetworkId::BROADCAST,
                self.server_address,
                NetAddress::BROADCAST,
            );
            sink.send(probe.encode()?)?;
            tokio::time::sleep(NETCHECK_DELAY).await;
        }

        let channels = *self.channels.read().await;
        let best = (0..MAX_CHANNELS)
            .min_by_key(|&i| (channels[i].peers(), channels[i].energy, i))
            .unwrap_or(0) as u8;

        self.set_radio_channel(best, sink)?;
        Ok(best)
    }

    /// Tunes the gateway to `channel` and opens the controller for association traffic.
    pub fn set_radio_channel(&self, channel: u8, sink: &dyn PacketSink) -> Result<(), ControllerError> {
        if channel as usize >= MAX_CHANNELS {
            return Err(ControllerError::InvalidConfig(format!(
                "channel {} out of range",
                channel
            )));
        }

        let setup = Packet::new(
            NetMgmtCommand::Setup {
                network_id: self.network_id,
                channel,
            },
            self.network_id,
            self.server_address,
            NetAddress::GATEWAY,
        );
        sink.send(setup.encode()?)?;

        self.current_channel.store(channel, Ordering::SeqCst);
        self.selected.store(true, Ordering::SeqCst);
        info!("Radio channel {} selected on network {}", channel, self.network_id);
        Ok(())
    }
}

impl ChannelSelection for ChannelSurveyor {
    fn is_channel_selected(&self) -> bool {
        self.selected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use flyweight_api::command::Command;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<Packet>>,
    }

    impl PacketSink for RecordingSink {
        fn send(&self, packet: Vec<u8>) -> Result<(), ControllerError> {
            self.sent.lock().unwrap().push(Packet::decode(&packet)?);
            Ok(())
        }
    }

    fn check(check_type: NetCheckType, network_id: NetworkId, guid: &str, channel: u8) -> NetCheck {
        NetCheck {
            check_type,
            network_id,
            guid: guid.into(),
            channel,
            channel_energy: 0,
            link_quality: 0,
        }
    }

    fn surveyor() -> ChannelSurveyor {
        ChannelSurveyor::new(NetworkId::new(3).unwrap(), NetAddress::GATEWAY)
    }

    #[tokio::test]
    async fn test_broadcast_request_gets_private_marker() {
        let request = check(NetCheckType::Request, NetworkId::BROADCAST, "0000ABCD", 5);
        let reply = surveyor().handle_net_check(&request).await.unwrap();

        assert_eq!(reply.network_id, NetworkId::BROADCAST);
        let Some(Command::NetMgmt(NetMgmtCommand::Check(response))) = reply.command() else {
            panic!("expected net-check response");
        };
        assert_eq!(response.check_type, NetCheckType::Response);
        assert_eq!(response.guid, NetGuid::PRIVATE_TEXT);
        assert_eq!(response.channel, 5);
    }

    #[tokio::test]
    async fn test_own_network_request_echoes_guid() {
        let request = check(NetCheckType::Request, NetworkId::new(3).unwrap(), "0000ABCD", 5);
        let reply = surveyor().handle_net_check(&request).await.unwrap();
        let Some(Command::NetMgmt(NetMgmtCommand::Check(response))) = reply.command() else {
            panic!("expected net-check response");
        };
        assert_eq!(response.guid, "0000ABCD");
        assert_eq!(response.network_id, NetworkId::new(3).unwrap());

        let foreign = check(NetCheckType::Request, NetworkId::new(4).unwrap(), "0000ABCD", 5);
        assert!(surveyor().handle_net_check(&foreign).await.is_none());
    }

    #[tokio::test]
    async fn test_responses_update_channel_info() {
        let surveyor = surveyor();

        let mut energy = check(NetCheckType::Response, NetworkId::BROADCAST, "00000000", 2);
        energy.channel_energy = 42;
        assert!(surveyor.handle_net_check(&energy).await.is_none());

        let peer = check(NetCheckType::Response, NetworkId::BROADCAST, "0000BEEF", 2);
        surveyor.handle_net_check(&peer).await;
        surveyor.handle_net_check(&peer).await;

        // Unicast-scoped responses are for devices
        let unicast = check(NetCheckType::Response, NetworkId::new(3).unwrap(), "0000BEEF", 2);
        surveyor.handle_net_check(&unicast).await;

        let info = surveyor.channel_info(2).await.unwrap();
        assert_eq!(info.energy, 42);
        assert_eq!(info.peers(), 2);

        let bad = check(NetCheckType::Response, NetworkId::BROADCAST, "0000BEEF", 40);
        surveyor.handle_net_check(&bad).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_survey_picks_quietest_channel() {
        let surveyor = std::sync::Arc::new(surveyor());
        let sink = std::sync::Arc::new(RecordingSink::default());

        let task = {
            let surveyor = surveyor.clone();
            let sink = sink.clone();
            tokio::spawn(async move { surveyor.select_channel(sink.as_ref()).await })
        };

        // Let the survey reset channel 0 before feeding samples, then fill every channel
        tokio::time::sleep(Duration::from_millis(10)).await;
        for channel in 0..MAX_CHANNELS as u8 {
            let mut energy = check(NetCheckType::Response, NetworkId::BROADCAST, "00000000", channel);
            energy.channel_energy = if channel == 9 || channel == 12 { 10 } else { 80 };
            surveyor.handle_net_check(&energy).await;
            if channel == 9 {
                let peer = check(NetCheckType::Response, NetworkId::BROADCAST, "0000BEEF", channel);
                surveyor.handle_net_check(&peer).await;
            }
            tokio::time::sleep(NETCHECK_DELAY).await;
        }

        assert_eq!(task.await.unwrap().unwrap(), 12);
        assert!(surveyor.is_channel_selected());
        assert_eq!(surveyor.current_channel(), Some(12));

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), MAX_CHANNELS + 1);
        assert!(sent[..MAX_CHANNELS].iter().all(|p| p.network_id.is_broadcast()));
        assert_eq!(
            sent[MAX_CHANNELS].command(),
            Some(&Command::NetMgmt(NetMgmtCommand::Setup {
                network_id: NetworkId::new(3).unwrap(),
                channel: 12
            }))
        );
    }

    #[tokio::test]
    async fn test_preferred_channel_skips_survey() {
        let surveyor = surveyor().with_preferred_channel(Some(7));
        let sink = RecordingSink::default();

        assert!(!surveyor.is_channel_selected());
        assert_eq!(surveyor.select_channel(&sink).await.unwrap(), 7);
        assert!(surveyor.is_channel_selected());
        assert_eq!(sink.sent.lock().unwrap().len(), 1);

        assert!(matches!(
            surveyor.set_radio_channel(16, &sink),
            Err(ControllerError::InvalidConfig(_))
        ));
    }
}
