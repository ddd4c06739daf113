// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;

bitflags! {
    /// Movement keys currently held.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MoveKeys: u32 {
        const FORWARD  = 1 << 0; // W
        const BACKWARD = 1 << 1; // S
        const LEFT     = 1 << 2; // A
        const RIGHT    = 1 << 3; // D
    }
}

/// Input snapshot handed to the per-tick update. Owned by the app loop and
/// fed from window events; nothing else writes it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputState {
    held: MoveKeys,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: MoveKeys, pressed: bool) {
        self.held.set(key, pressed);
    }

    /// Key-up events are not delivered to an unfocused window, so drop
    /// everything held when focus goes away.
    pub fn clear(&mut self) {
        self.held = MoveKeys::empty();
    }

    pub fn held(&self) -> MoveKeys {
        self.held
    }

    pub fn is_held(&self, key: MoveKeys) -> bool {
        self.held.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release_track_each_key() {
        let mut input = InputState::new();
        input.set(MoveKeys::FORWARD, true);
        input.set(MoveKeys::LEFT, true);
        assert_eq!(input.held(), MoveKeys::FORWARD | MoveKeys::LEFT);

        input.set(MoveKeys::FORWARD, false);
        assert!(!input.is_held(MoveKeys::FORWARD));
        assert!(input.is_held(MoveKeys::LEFT));
    }

    #[test]
    fn clear_releases_everything() {
        let mut input = InputState::new();
        input.set(MoveKeys::all(), true);
        input.clear();
        assert!(input.held().is_empty());
    }
}
