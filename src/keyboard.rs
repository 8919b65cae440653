use minifb::Key;

/// Host input as seen by the execution engine. The E-class skip
/// instructions sample `pressed_keys` synchronously; the blocking key wait
/// consumes the discrete down/up event sets; `quit_requested` is checked
/// every driver iteration, including mid-wait.
pub trait Input {
    /// Keypad codes currently held, possibly several at once.
    fn pressed_keys(&self) -> Vec<u8>;
    /// Keypad codes that went down since the last poll.
    fn keys_down(&self) -> Vec<u8>;
    /// Keypad codes that went up since the last poll.
    fn keys_up(&self) -> Vec<u8>;
    fn quit_requested(&self) -> bool;
}

/// The classic QWERTY layout for the 4x4 keypad:
///
/// ```text
/// 1 2 3 C        1 2 3 4
/// 4 5 6 D   <-   Q W E R
/// 7 8 9 E        A S D F
/// A 0 B F        Z X C V
/// ```
pub fn keypad_code(key: Key) -> Option<u8> {
    match key {
        Key::X => Some(0x0),
        Key::Key1 => Some(0x1),
        Key::Key2 => Some(0x2),
        Key::Key3 => Some(0x3),
        Key::Q => Some(0x4),
        Key::W => Some(0x5),
        Key::E => Some(0x6),
        Key::A => Some(0x7),
        Key::S => Some(0x8),
        Key::D => Some(0x9),
        Key::Z => Some(0xA),
        Key::C => Some(0xB),
        Key::Key4 => Some(0xC),
        Key::R => Some(0xD),
        Key::F => Some(0xE),
        Key::V => Some(0xF),
        _ => None,
    }
}

/// Maps a batch of host keys, dropping anything outside the keypad.
pub fn keypad_codes(keys: &[Key]) -> Vec<u8> {
    keys.iter().copied().filter_map(keypad_code).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYPAD: [Key; 16] = [
        Key::X,
        Key::Key1,
        Key::Key2,
        Key::Key3,
        Key::Q,
        Key::W,
        Key::E,
        Key::A,
        Key::S,
        Key::D,
        Key::Z,
        Key::C,
        Key::Key4,
        Key::R,
        Key::F,
        Key::V,
    ];

    #[test]
    fn mapping_covers_all_sixteen_codes_once() {
        let mut codes: Vec<u8> = KEYPAD.iter().filter_map(|&k| keypad_code(k)).collect();
        codes.sort_unstable();
        assert_eq!(codes, (0x0..=0xF).collect::<Vec<u8>>());
    }

    #[test]
    fn unmapped_keys_are_dropped() {
        assert_eq!(keypad_code(Key::Space), None);
        assert_eq!(keypad_codes(&[Key::Key1, Key::Space, Key::V]), vec![0x1, 0xF]);
    }
}
