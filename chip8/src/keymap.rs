use sdl2::keyboard::Keycode;

/// # Keymap
/// Chip-8 input is generated with a hexadecimal keypad.
///
/// This original layout is mapped to the left 4 alphanumeric columns.
/// ```text
/// |1|2|3|C|      |1|2|3|4|
/// |4|5|6|D|  ->  |Q|W|E|R|
/// |7|8|9|E|  ->  |A|S|D|F|
/// |A|0|B|F|      |Z|X|C|V|
/// ```
const KEYPAD: [(Keycode, u8); 16] = [
    (Keycode::X, 0x0),
    (Keycode::Num1, 0x1),
    (Keycode::Num2, 0x2),
    (Keycode::Num3, 0x3),
    (Keycode::Q, 0x4),
    (Keycode::W, 0x5),
    (Keycode::E, 0x6),
    (Keycode::A, 0x7),
    (Keycode::S, 0x8),
    (Keycode::D, 0x9),
    (Keycode::Z, 0xA),
    (Keycode::C, 0xB),
    (Keycode::Num4, 0xC),
    (Keycode::R, 0xD),
    (Keycode::F, 0xE),
    (Keycode::V, 0xF),
];

/// The keypad code for a physical key, if it's part of the keypad
pub fn keymap(key: Keycode) -> Option<u8> {
    KEYPAD
        .iter()
        .find(|(keycode, _)| *keycode == key)
        .map(|&(_, code)| code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_keypad_code_is_mapped_once() {
        let mut codes: Vec<u8> = KEYPAD.iter().map(|&(_, code)| code).collect();
        codes.sort_unstable();
        assert_eq!(codes, (0x0..=0xF).collect::<Vec<u8>>());
    }

    #[test]
    fn test_corners() {
        assert_eq!(keymap(Keycode::Num1), Some(0x1));
        assert_eq!(keymap(Keycode::Num4), Some(0xC));
        assert_eq!(keymap(Keycode::Z), Some(0xA));
        assert_eq!(keymap(Keycode::V), Some(0xF));
    }

    #[test]
    fn test_unmapped_keys() {
        assert_eq!(keymap(Keycode::Space), None);
        assert_eq!(keymap(Keycode::Num0), None);
    }
}
