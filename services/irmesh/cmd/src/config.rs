//! Configuration handling for the irmesh node.
//!
//! Values come from a YAML file, then environment variables, then command
//! line flags. [`IrMeshConfig::validate`] turns the raw text into typed
//! settings and is where bad values stop startup.

use anyhow::{bail, Context, Result};
use irmesh_pulse::{Carrier, PlaybackConfig, DEFAULT_IDLE_THRESHOLD};
use irmesh_session::{
    DiscoveryConfig, MeshConfig, RelayConfig, UdpTransportConfig, DEFAULT_INBOUND_DEPTH,
    DEFAULT_POLL_INTERVAL, MAX_PEERS,
};
use irmesh_wire::{GroupCode, PeerAddress, PeerCapabilities, TargetId, BROADCAST_TARGET};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Default UDP port for mesh traffic
pub const DEFAULT_PORT: u16 = 4210;

/// Root configuration (matches the YAML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IrMeshConfig {
    /// Node identity
    pub node: NodeSection,
    /// Mesh membership and transport
    pub mesh: MeshSection,
    /// Capture and playback
    pub infrared: InfraredSection,
}

/// `node:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Identifier matched against IR targets
    pub id: String,
    /// Link-layer address, `AA:BB:CC:DD:EE:FF`
    pub address: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            id: "1".to_string(),
            address: "02:00:00:00:00:01".to_string(),
        }
    }
}

/// `mesh:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSection {
    /// Shared group code
    pub group_code: String,
    /// UDP port used for both bind and broadcast
    pub port: u16,
    /// Local interface to bind
    pub bind: String,
    /// Broadcast destination address
    pub broadcast: String,
    /// HELLO broadcasts after startup
    pub hello_count: u32,
    /// Spacing between HELLO broadcasts (humantime, e.g. `3s`)
    pub hello_interval: String,
    /// Peer registry capacity
    pub max_peers: usize,
    /// Period of DATA heartbeats to known peers; `0s` disables them
    pub announce_interval: String,
}

impl Default for MeshSection {
    fn default() -> Self {
        Self {
            group_code: "GRUPO_X".to_string(),
            port: DEFAULT_PORT,
            bind: "0.0.0.0".to_string(),
            broadcast: "255.255.255.255".to_string(),
            hello_count: 10,
            hello_interval: "3s".to_string(),
            max_peers: MAX_PEERS,
            announce_interval: "0s".to_string(),
        }
    }
}

/// `infrared:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfraredSection {
    /// Transmit queue depth
    pub queue_depth: usize,
    /// Segments between cooperative yields during playback
    pub yield_every: usize,
    /// Carrier frequency in Hz
    pub carrier_hz: u32,
    /// Carrier duty cycle in percent
    pub duty_percent: u8,
    /// Silence that ends a captured burst (humantime)
    pub idle_threshold: String,
    /// Capture poll period (humantime)
    pub poll_interval: String,
    /// Target id stamped on relayed captures
    pub relay_target: String,
    /// Replay captures on this node too (default on)
    pub local_echo: bool,
}

impl Default for InfraredSection {
    fn default() -> Self {
        let playback = PlaybackConfig::default();
        Self {
            queue_depth: playback.queue_depth,
            yield_every: playback.yield_every,
            carrier_hz: playback.carrier.frequency_hz,
            duty_percent: playback.carrier.duty_percent,
            idle_threshold: humantime::format_duration(DEFAULT_IDLE_THRESHOLD).to_string(),
            poll_interval: humantime::format_duration(DEFAULT_POLL_INTERVAL).to_string(),
            relay_target: BROADCAST_TARGET.to_string(),
            local_echo: true,
        }
    }
}

/// Typed settings ready for startup
#[derive(Debug, Clone)]
pub struct NodeSettings {
    /// Identity and membership
    pub mesh: MeshConfig,
    /// Transport binding
    pub transport: UdpTransportConfig,
    /// HELLO schedule
    pub discovery: DiscoveryConfig,
    /// DATA heartbeat period, if enabled
    pub announce_interval: Option<Duration>,
    /// Playback queue and carrier
    pub playback: PlaybackConfig,
    /// Capture burst separator
    pub idle_threshold: Duration,
    /// Capture relay behaviour
    pub relay: RelayConfig,
}

impl IrMeshConfig {
    /// Load configuration from file and environment variables.
    ///
    /// A missing or unparsable file falls back to defaults with a warning.
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Self {
        let path = config_path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<Self>(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?}: {}, using defaults", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                warn!("Config file {:?} not found, using defaults", path);
                Self::default()
            }
        };

        config.apply_environment_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply `IRMESH_*` overrides read through `lookup`
    pub fn apply_environment_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("IRMESH_NODE_ID") {
            info!("Node ID overridden by environment: {}", id);
            self.node.id = id;
        }

        if let Some(group) = lookup("IRMESH_GROUP_CODE") {
            info!("Group code overridden by environment: {}", group);
            self.mesh.group_code = group;
        }

        if let Some(address) = lookup("IRMESH_ADDRESS") {
            info!("Address overridden by environment: {}", address);
            self.node.address = address;
        }

        if let Some(port) = lookup("IRMESH_PORT") {
            match port.parse::<u16>() {
                Ok(port) => {
                    self.mesh.port = port;
                    info!("Port overridden by environment: {}", port);
                }
                Err(_) => warn!("Ignoring invalid IRMESH_PORT {:?}", port),
            }
        }
    }

    /// Check every value and build typed settings
    pub fn validate(&self) -> Result<NodeSettings> {
        let node_id = TargetId::new(self.node.id.as_str())
            .with_context(|| format!("invalid node id {:?}", self.node.id))?;
        if node_id.is_broadcast() {
            bail!("node id must not be the broadcast target {:?}", BROADCAST_TARGET);
        }

        let group = GroupCode::new(self.mesh.group_code.as_str())
            .with_context(|| format!("invalid group code {:?}", self.mesh.group_code))?;

        let address: PeerAddress = self
            .node
            .address
            .parse()
            .with_context(|| format!("invalid node address {:?}", self.node.address))?;
        if address.is_broadcast() {
            bail!("node address must not be the broadcast address");
        }

        let bind_ip: IpAddr = self
            .mesh
            .bind
            .parse()
            .with_context(|| format!("invalid bind address {:?}", self.mesh.bind))?;
        let broadcast_ip: IpAddr = self
            .mesh
            .broadcast
            .parse()
            .with_context(|| format!("invalid broadcast address {:?}", self.mesh.broadcast))?;

        if self.mesh.max_peers == 0 {
            bail!("max_peers must be at least 1");
        }
        if self.infrared.queue_depth == 0 {
            bail!("queue_depth must be at least 1");
        }
        if self.infrared.duty_percent == 0 || self.infrared.duty_percent >= 100 {
            bail!("duty_percent must be between 1 and 99");
        }

        let hello_interval = parse_duration("hello_interval", &self.mesh.hello_interval)?;
        if hello_interval.is_zero() {
            bail!("hello_interval must be greater than zero");
        }
        let poll_interval = parse_duration("poll_interval", &self.infrared.poll_interval)?;
        if poll_interval.is_zero() {
            bail!("poll_interval must be greater than zero");
        }

        let relay_target = TargetId::new(self.infrared.relay_target.as_str())
            .with_context(|| format!("invalid relay target {:?}", self.infrared.relay_target))?;

        Ok(NodeSettings {
            mesh: MeshConfig {
                node_id,
                group,
                capabilities: PeerCapabilities::IR_EMITTER | PeerCapabilities::IR_RECEIVER,
                max_peers: self.mesh.max_peers,
            },
            transport: UdpTransportConfig {
                address,
                bind: SocketAddr::new(bind_ip, self.mesh.port),
                broadcast: SocketAddr::new(broadcast_ip, self.mesh.port),
                inbound_depth: DEFAULT_INBOUND_DEPTH,
            },
            discovery: DiscoveryConfig {
                hello_count: self.mesh.hello_count,
                hello_interval,
            },
            announce_interval: Some(parse_duration(
                "announce_interval",
                &self.mesh.announce_interval,
            )?)
            .filter(|period| !period.is_zero()),
            playback: PlaybackConfig {
                queue_depth: self.infrared.queue_depth,
                yield_every: self.infrared.yield_every.max(1),
                carrier: Carrier {
                    frequency_hz: self.infrared.carrier_hz,
                    duty_percent: self.infrared.duty_percent,
                },
            },
            idle_threshold: parse_duration("idle_threshold", &self.infrared.idle_threshold)?,
            relay: RelayConfig {
                target: relay_target,
                poll_interval,
                local_echo: self.infrared.local_echo,
            },
        })
    }
}

fn parse_duration(name: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value).with_context(|| format!("invalid {} {:?}", name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let settings = IrMeshConfig::default().validate().unwrap();
        assert_eq!(settings.mesh.node_id.as_str(), "1");
        assert_eq!(settings.mesh.group.as_str(), "GRUPO_X");
        assert_eq!(settings.mesh.max_peers, 20);
        assert_eq!(settings.transport.bind.port(), DEFAULT_PORT);
        assert_eq!(settings.discovery.hello_count, 10);
        assert_eq!(settings.discovery.hello_interval, Duration::from_secs(3));
        assert_eq!(settings.announce_interval, None);
        assert_eq!(settings.playback.queue_depth, 4);
        assert_eq!(settings.playback.carrier, Carrier::IR_38KHZ);
        assert_eq!(settings.idle_threshold, Duration::from_millis(50));
        assert_eq!(settings.relay.poll_interval, Duration::from_millis(10));
        assert!(settings.relay.target.is_broadcast());
        assert!(settings.relay.local_echo);
    }

    #[test]
    fn test_load_from_file() {
        let yaml_content = r#"
node:
  id: "kitchen"
  address: "24:0a:c4:12:34:56"
mesh:
  group_code: CASA
  port: 5000
  hello_interval: 500ms
  announce_interval: 1s
infrared:
  queue_depth: 8
  local_echo: false
  relay_target: "2"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = IrMeshConfig::load_from_file(temp_file.path());
        let settings = config.validate().unwrap();

        assert_eq!(settings.mesh.node_id.as_str(), "kitchen");
        assert_eq!(settings.mesh.group.as_str(), "CASA");
        assert_eq!(settings.transport.address.to_string(), "24:0A:C4:12:34:56");
        assert_eq!(settings.transport.broadcast.port(), 5000);
        assert_eq!(settings.discovery.hello_interval, Duration::from_millis(500));
        assert_eq!(settings.announce_interval, Some(Duration::from_secs(1)));
        // Untouched keys keep defaults
        assert_eq!(settings.discovery.hello_count, 10);
        assert_eq!(settings.playback.queue_depth, 8);
        assert_eq!(settings.relay.target.as_str(), "2");
        assert!(!settings.relay.local_echo);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = IrMeshConfig::load_from_file(dir.path().join("absent.yaml"));
        assert_eq!(config.mesh.port, DEFAULT_PORT);
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("IRMESH_NODE_ID", "7"),
            ("IRMESH_GROUP_CODE", "OTHER"),
            ("IRMESH_ADDRESS", "02:00:00:00:00:07"),
            ("IRMESH_PORT", "not-a-port"),
        ]
        .into_iter()
        .collect();

        let mut config = IrMeshConfig::default();
        config.apply_environment_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.node.id, "7");
        assert_eq!(config.mesh.group_code, "OTHER");
        assert_eq!(config.node.address, "02:00:00:00:00:07");
        assert_eq!(config.mesh.port, DEFAULT_PORT);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = IrMeshConfig::default();
        config.mesh.group_code = "THIS-GROUP-IS-TOO-LONG".to_string();
        assert!(config.validate().is_err());

        let mut config = IrMeshConfig::default();
        config.node.id = BROADCAST_TARGET.to_string();
        assert!(config.validate().is_err());

        let mut config = IrMeshConfig::default();
        config.node.address = "FF:FF:FF:FF:FF:FF".to_string();
        assert!(config.validate().is_err());

        let mut config = IrMeshConfig::default();
        config.mesh.hello_interval = "soon".to_string();
        assert!(config.validate().is_err());

        let mut config = IrMeshConfig::default();
        config.infrared.queue_depth = 0;
        assert!(config.validate().is_err());

        let mut config = IrMeshConfig::default();
        config.mesh.hello_interval = "0s".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("hello_interval"));

        let mut config = IrMeshConfig::default();
        config.infrared.poll_interval = "0ms".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval"));
    }
}
