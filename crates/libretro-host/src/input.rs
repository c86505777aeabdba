use crate::raw;
use bitflags::bitflags;

bitflags! {
    /// Joypad button bitmask fed to [`LibretroHost::set_input`](crate::LibretroHost::set_input).
    ///
    /// Bit layout, MSB to LSB: Right, Left, Down, Up, Start, Select, B, A.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Joypad: u8 {
        const A = 0x01;
        const B = 0x02;
        const SELECT = 0x04;
        const START = 0x08;
        const UP = 0x10;
        const DOWN = 0x20;
        const LEFT = 0x40;
        const RIGHT = 0x80;
    }
}

impl Joypad {
    fn from_device_id(id: u32) -> Option<Joypad> {
        match id {
            raw::RETRO_DEVICE_ID_JOYPAD_A => Some(Joypad::A),
            raw::RETRO_DEVICE_ID_JOYPAD_B => Some(Joypad::B),
            raw::RETRO_DEVICE_ID_JOYPAD_SELECT => Some(Joypad::SELECT),
            raw::RETRO_DEVICE_ID_JOYPAD_START => Some(Joypad::START),
            raw::RETRO_DEVICE_ID_JOYPAD_UP => Some(Joypad::UP),
            raw::RETRO_DEVICE_ID_JOYPAD_DOWN => Some(Joypad::DOWN),
            raw::RETRO_DEVICE_ID_JOYPAD_LEFT => Some(Joypad::LEFT),
            raw::RETRO_DEVICE_ID_JOYPAD_RIGHT => Some(Joypad::RIGHT),
            _ => None,
        }
    }
}

/// Answers a `retro_input_state_t` query for a single button id against the
/// cached port bitmask.
pub(crate) fn button_state(mask: u8, id: u32) -> i16 {
    match Joypad::from_device_id(id) {
        Some(button) => i16::from(Joypad::from_bits_truncate(mask).contains(button)),
        None => 0,
    }
}

/// Answers the aggregate `JOYPAD_MASK` query: one result bit per libretro
/// device id for every pressed button.
pub(crate) fn aggregate_state(mask: u8) -> i16 {
    let held = Joypad::from_bits_truncate(mask);
    let mut out = 0i16;
    for (button, id) in [
        (Joypad::B, raw::RETRO_DEVICE_ID_JOYPAD_B),
        (Joypad::A, raw::RETRO_DEVICE_ID_JOYPAD_A),
        (Joypad::SELECT, raw::RETRO_DEVICE_ID_JOYPAD_SELECT),
        (Joypad::START, raw::RETRO_DEVICE_ID_JOYPAD_START),
        (Joypad::UP, raw::RETRO_DEVICE_ID_JOYPAD_UP),
        (Joypad::DOWN, raw::RETRO_DEVICE_ID_JOYPAD_DOWN),
        (Joypad::LEFT, raw::RETRO_DEVICE_ID_JOYPAD_LEFT),
        (Joypad::RIGHT, raw::RETRO_DEVICE_ID_JOYPAD_RIGHT),
    ] {
        if held.contains(button) {
            out |= 1 << id;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_button_queries_follow_the_bitmask() {
        let mask = (Joypad::A | Joypad::RIGHT).bits();
        assert_eq!(button_state(mask, raw::RETRO_DEVICE_ID_JOYPAD_A), 1);
        assert_eq!(button_state(mask, raw::RETRO_DEVICE_ID_JOYPAD_RIGHT), 1);
        assert_eq!(button_state(mask, raw::RETRO_DEVICE_ID_JOYPAD_B), 0);
        assert_eq!(button_state(mask, raw::RETRO_DEVICE_ID_JOYPAD_UP), 0);
        // Ids outside the joypad face buttons read as released.
        assert_eq!(button_state(mask, raw::RETRO_DEVICE_ID_JOYPAD_X), 0);
    }

    #[test]
    fn aggregate_query_sets_one_bit_per_device_id() {
        let mask = (Joypad::B | Joypad::START | Joypad::LEFT).bits();
        let agg = aggregate_state(mask);
        assert_eq!(
            agg,
            (1 << raw::RETRO_DEVICE_ID_JOYPAD_B)
                | (1 << raw::RETRO_DEVICE_ID_JOYPAD_START)
                | (1 << raw::RETRO_DEVICE_ID_JOYPAD_LEFT)
        );
        assert_eq!(aggregate_state(0), 0);
        assert_eq!(aggregate_state(0xFF).count_ones(), 8);
    }
}
