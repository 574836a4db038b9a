//! Negotiation parameter types shared between the signaling core and the
//! engine adapter.
//!
//! Field names serialize in camelCase because these structs travel verbatim
//! inside signaling replies and must match what existing clients parse
//! (`mimeType`, `clockRate`, `iceParameters`, ...).

use serde::{Deserialize, Serialize};

/// Media kind of a codec, producer, or consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio flow.
    Audio,
    /// Video flow.
    Video,
}

impl MediaKind {
    /// Returns the kind as a wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// A codec the router is able to route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecCapability {
    /// Media kind this codec applies to.
    pub kind: MediaKind,
    /// MIME type, e.g. `audio/opus`.
    pub mime_type: String,
    /// Clock rate in Hz.
    pub clock_rate: u32,
    /// Channel count (audio only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    /// Codec-specific parameters, e.g. start-bitrate hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Map<String, serde_json::Value>>,
}

/// The codec capability set a router advertises to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCapabilities {
    /// Codecs the router can route.
    pub codecs: Vec<RtpCodecCapability>,
}

/// The fixed codec set every router is created with.
///
/// Must stay bit-for-bit identical for interoperability with deployed
/// clients: opus at 48 kHz stereo, VP8 at 90 kHz with a 1000 kbps
/// start-bitrate hint.
#[must_use]
pub fn default_media_codecs() -> Vec<RtpCodecCapability> {
    let mut vp8_parameters = serde_json::Map::new();
    vp8_parameters.insert(
        "x-google-start-bitrate".to_string(),
        serde_json::Value::from(1000),
    );

    vec![
        RtpCodecCapability {
            kind: MediaKind::Audio,
            mime_type: "audio/opus".to_string(),
            clock_rate: 48_000,
            channels: Some(2),
            parameters: None,
        },
        RtpCodecCapability {
            kind: MediaKind::Video,
            mime_type: "video/VP8".to_string(),
            clock_rate: 90_000,
            channels: None,
            parameters: Some(vp8_parameters),
        },
    ]
}

/// Client-supplied RTP parameters for a producer.
///
/// The signaling core forwards these to the engine without interpreting
/// them, so they stay an opaque JSON value rather than a typed tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RtpParameters(pub serde_json::Value);

/// ICE negotiation parameters of a server-side transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceParameters {
    /// ICE username fragment.
    pub username_fragment: String,
    /// ICE password.
    pub password: String,
    /// Whether the server runs in ICE-lite mode.
    pub ice_lite: bool,
}

/// A single ICE candidate advertised to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    /// Candidate foundation.
    pub foundation: String,
    /// Candidate priority; higher is preferred.
    pub priority: u32,
    /// Advertised (announced) address.
    pub ip: String,
    /// Transport protocol, `udp` or `tcp`.
    pub protocol: String,
    /// Advertised port.
    pub port: u16,
    /// Candidate type; always `host` for an SFU.
    #[serde(rename = "type")]
    pub candidate_type: String,
    /// TCP candidate role, present for TCP candidates only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp_type: Option<String>,
}

/// DTLS role of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtlsRole {
    /// Role decided during the handshake.
    Auto,
    /// Endpoint acts as DTLS client.
    Client,
    /// Endpoint acts as DTLS server.
    Server,
}

/// A DTLS certificate fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DtlsFingerprint {
    /// Hash algorithm, e.g. `sha-256`.
    pub algorithm: String,
    /// Colon-separated uppercase hex digest.
    pub value: String,
}

/// DTLS negotiation parameters (server-advertised or client-supplied).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DtlsParameters {
    /// DTLS role.
    pub role: DtlsRole,
    /// Certificate fingerprints.
    pub fingerprints: Vec<DtlsFingerprint>,
}

/// DTLS handshake state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtlsState {
    /// Handshake not started.
    New,
    /// Handshake in progress.
    Connecting,
    /// Handshake completed.
    Connected,
    /// Handshake failed.
    Failed,
    /// Transport closed.
    Closed,
}

/// Settings for a forwarding worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Lowest RTC port the worker may bind.
    pub rtc_min_port: u16,
    /// Highest RTC port the worker may bind.
    pub rtc_max_port: u16,
    /// Engine log level.
    pub log_level: String,
    /// Engine log tags.
    pub log_tags: Vec<String>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            rtc_min_port: 2000,
            rtc_max_port: 2020,
            log_level: "debug".to_string(),
            log_tags: vec!["info".to_string(), "simulcast".to_string()],
        }
    }
}

/// Options for creating a WebRTC transport on a router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebRtcTransportOptions {
    /// Local address the transport listens on.
    pub listen_ip: String,
    /// Address advertised to clients in ICE candidates.
    pub announced_ip: String,
    /// Whether UDP candidates are offered.
    pub enable_udp: bool,
    /// Whether TCP candidates are offered.
    pub enable_tcp: bool,
    /// Whether UDP candidates get a higher priority than TCP ones.
    pub prefer_udp: bool,
}

impl Default for WebRtcTransportOptions {
    fn default() -> Self {
        Self {
            listen_ip: "0.0.0.0".to_string(),
            announced_ip: "127.0.0.1".to_string(),
            enable_udp: true,
            enable_tcp: true,
            prefer_udp: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_codecs_match_deployed_clients() {
        let codecs = default_media_codecs();
        assert_eq!(codecs.len(), 2);

        let opus = codecs.first().unwrap();
        assert_eq!(opus.kind, MediaKind::Audio);
        assert_eq!(opus.mime_type, "audio/opus");
        assert_eq!(opus.clock_rate, 48_000);
        assert_eq!(opus.channels, Some(2));
        assert!(opus.parameters.is_none());

        let vp8 = codecs.get(1).unwrap();
        assert_eq!(vp8.kind, MediaKind::Video);
        assert_eq!(vp8.mime_type, "video/VP8");
        assert_eq!(vp8.clock_rate, 90_000);
        assert_eq!(vp8.channels, None);
        let params = vp8.parameters.as_ref().unwrap();
        assert_eq!(
            params.get("x-google-start-bitrate"),
            Some(&serde_json::Value::from(1000))
        );
    }

    #[test]
    fn test_codec_wire_format_is_camel_case() {
        let codecs = default_media_codecs();
        let json = serde_json::to_value(&codecs).unwrap();

        let opus = json.get(0).unwrap();
        assert_eq!(opus.get("kind").unwrap(), "audio");
        assert_eq!(opus.get("mimeType").unwrap(), "audio/opus");
        assert_eq!(opus.get("clockRate").unwrap(), 48_000);
        assert_eq!(opus.get("channels").unwrap(), 2);
        // Absent parameters must be omitted, not null
        assert!(opus.get("parameters").is_none());
    }

    #[test]
    fn test_ice_candidate_type_field_rename() {
        let candidate = IceCandidate {
            foundation: "udpcandidate".to_string(),
            priority: 1,
            ip: "127.0.0.1".to_string(),
            protocol: "udp".to_string(),
            port: 2000,
            candidate_type: "host".to_string(),
            tcp_type: None,
        };

        let json = serde_json::to_value(&candidate).unwrap();
        assert_eq!(json.get("type").unwrap(), "host");
        assert!(json.get("tcpType").is_none());
        assert!(json.get("candidate_type").is_none());
    }

    #[test]
    fn test_dtls_parameters_round_trip() {
        let raw = serde_json::json!({
            "role": "client",
            "fingerprints": [
                { "algorithm": "sha-256", "value": "AB:CD:EF" }
            ]
        });

        let parsed: DtlsParameters = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.role, DtlsRole::Client);
        assert_eq!(parsed.fingerprints.len(), 1);

        let back = serde_json::to_value(&parsed).unwrap();
        assert_eq!(back.get("role").unwrap(), "client");
    }

    #[test]
    fn test_worker_settings_defaults() {
        let settings = WorkerSettings::default();
        assert_eq!(settings.rtc_min_port, 2000);
        assert_eq!(settings.rtc_max_port, 2020);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_transport_options_defaults() {
        let options = WebRtcTransportOptions::default();
        assert_eq!(options.listen_ip, "0.0.0.0");
        assert_eq!(options.announced_ip, "127.0.0.1");
        assert!(options.enable_udp);
        assert!(options.enable_tcp);
        assert!(options.prefer_udp);
    }

    #[test]
    fn test_media_kind_as_str() {
        assert_eq!(MediaKind::Audio.as_str(), "audio");
        assert_eq!(MediaKind::Video.as_str(), "video");
    }
}
