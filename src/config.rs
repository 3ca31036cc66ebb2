//! Engine configuration
//!
//! Three behaviours are not settled by available hardware documentation;
//! each is a policy here instead of a hard-coded choice.

use serde::{Deserialize, Serialize};

/// Value written to the mode register during reset
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeResetValue {
    /// 0x00: timers stopped, nothing loaded
    #[default]
    Zero,
    /// 0x30: also clears both timer flags, as older cores do
    Legacy,
}

impl ModeResetValue {
    /// Raw register byte
    pub fn value(self) -> u8 {
        match self {
            Self::Zero => 0x00,
            Self::Legacy => 0x30,
        }
    }
}

/// Status bits cleared by a mode write that requests an IRQ reset
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrqResetPolicy {
    /// Clear the timer and IRQ bits (0x78)
    #[default]
    AllStatus,
    /// Clear only the family IRQ bit
    IrqOnly,
}

/// Whether LFO amplitude modulation reaches the noise channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseAmPolicy {
    /// Noise envelope is offset by LFO AM like any operator
    #[default]
    Apply,
    /// Noise envelope ignores LFO AM
    Ignore,
}

/// Engine settings fixed at construction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Channels included in the output mix
    pub channel_mask: u32,
    /// Channels whose key events are logged
    pub log_channel_mask: u32,
    /// Mode register value written by reset
    pub mode_reset_value: ModeResetValue,
    /// Status bits cleared on IRQ reset
    pub irq_reset: IrqResetPolicy,
    /// LFO AM on the noise channel
    pub noise_am: NoiseAmPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_mask: u32::MAX,
            log_channel_mask: u32::MAX,
            mode_reset_value: ModeResetValue::default(),
            irq_reset: IrqResetPolicy::default(),
            noise_am: NoiseAmPolicy::default(),
        }
    }
}
