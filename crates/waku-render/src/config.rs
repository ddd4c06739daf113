// SPDX-License-Identifier: CEPL-1.0
use serde::Deserialize;

/// Present mode preference. Mailbox falls back to FIFO when the surface
/// does not offer it; FIFO is always available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePref {
    Fifo,
    #[default]
    Mailbox,
}

/// Resolved once at startup and handed to the renderer by reference.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub frames_in_flight: usize,
    pub validation: bool,
    pub clear_color: [f32; 4],
    pub present_mode: PresentModePref,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            validation: cfg!(debug_assertions),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            present_mode: PresentModePref::Mailbox,
        }
    }
}

impl RenderConfig {
    /// At least one slot.
    pub fn slot_count(&self) -> usize {
        self.frames_in_flight.max(1)
    }
}
