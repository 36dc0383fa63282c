//! Channel id conventions.
//!
//! Channel 0 carries connection-level control traffic and is always open.
//! Channels 1-65535 are logical channels negotiated with the broker.

/// Connection-level control channel.
pub const CONNECTION_CHANNEL: u16 = 0;

/// Highest channel id the 16-bit protocol field can carry.
pub const MAX_CHANNEL_ID: u16 = u16::MAX;

/// Returns a human-readable name for a channel ID.
pub fn channel_name(id: u16) -> &'static str {
    match id {
        CONNECTION_CHANNEL => "CONNECTION",
        _ => "CHANNEL",
    }
}

/// Resolve a broker-advertised channel-max into a usable bound.
///
/// The broker advertises 0 when it imposes no limit of its own.
pub fn effective_channel_max(advertised: u16) -> u16 {
    if advertised == 0 {
        MAX_CHANNEL_ID
    } else {
        advertised
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_means_protocol_limit() {
        assert_eq!(effective_channel_max(0), 65535);
        assert_eq!(effective_channel_max(2047), 2047);
    }

    #[test]
    fn names() {
        assert_eq!(channel_name(0), "CONNECTION");
        assert_eq!(channel_name(7), "CHANNEL");
    }
}
