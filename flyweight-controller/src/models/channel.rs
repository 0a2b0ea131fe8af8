/// Channels the radio can be tuned to
pub const MAX_CHANNELS: usize = 16;
/// Sentinel for "no sample yet" in both energy and controller count
pub const MAX_CHANNEL_VALUE: u8 = 255;

/// Latest survey sample for one radio channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    pub energy: u8,
    /// Other controllers heard broadcasting on this channel
    pub controller_count: u8,
}

impl ChannelInfo {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_energy(&mut self, energy: u8) {
        self.energy = energy;
    }

    pub fn increment_controller_count(&mut self) {
        // First peer replaces the "no sample" sentinel
        self.controller_count = match self.controller_count {
            MAX_CHANNEL_VALUE => 1,
            count => count.saturating_add(1).min(MAX_CHANNEL_VALUE - 1),
        };
    }

    /// Peers heard, treating the sentinel as none.
    pub fn peers(&self) -> u8 {
        match self.controller_count {
            MAX_CHANNEL_VALUE => 0,
            count => count,
        }
    }
}

impl Default for ChannelInfo {
    fn default() -> Self {
        Self {
            energy: MAX_CHANNEL_VALUE,
            controller_count: MAX_CHANNEL_VALUE,
        }
    }
}
