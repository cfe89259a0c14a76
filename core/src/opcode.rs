/// # Opcodes
///
/// Chip-8 instruction words are 16 bits, stored big-endian. The top nibble is the
/// instruction's family; families 0x0, 0x8, 0xE and 0xF are further split on their
/// low nibble or low byte.
///
/// The remaining nibbles carry operands:
/// - `[_nnn]` a 12-bit address
/// - `[__kk]` an immediate byte
/// - `[_x__]` the register Vx, or the range V0..=Vx
/// - `[__y_]` the register Vy
/// - `[___n]` a sprite height
pub trait Opcode {
    /// All four nibbles, most significant first.
    fn nibbles(&self) -> (u8, u8, u8, u8);

    /// `[f___]`
    fn family(&self) -> u8;

    /// `[_x__]`
    fn x(&self) -> usize;

    /// `[__y_]`
    fn y(&self) -> usize;

    /// `[___n]`
    fn n(&self) -> u8;

    /// `[__kk]`
    fn kk(&self) -> u8;

    /// `[_nnn]`; anything above the low 12 bits is dropped.
    fn addr(&self) -> u16;
}

impl Opcode for u16 {
    fn nibbles(&self) -> (u8, u8, u8, u8) {
        (self.family(), self.x() as u8, self.y() as u8, self.n())
    }

    fn family(&self) -> u8 {
        (self >> 12) as u8
    }

    fn x(&self) -> usize {
        usize::from((self >> 8) & 0xF)
    }

    fn y(&self) -> usize {
        usize::from((self >> 4) & 0xF)
    }

    fn n(&self) -> u8 {
        (self & 0x000F) as u8
    }

    fn kk(&self) -> u8 {
        (self & 0x00FF) as u8
    }

    fn addr(&self) -> u16 {
        self & 0x0FFF
    }
}

#[cfg(test)]
mod test_opcode {
    use super::*;

    const OP: u16 = 0xABCD;

    #[test]
    fn test_nibbles() {
        assert_eq!(OP.nibbles(), (0xA, 0xB, 0xC, 0xD));
    }

    #[test]
    fn test_operands() {
        assert_eq!(OP.family(), 0xA);
        assert_eq!(OP.x(), 0xB);
        assert_eq!(OP.y(), 0xC);
        assert_eq!(OP.n(), 0xD);
        assert_eq!(OP.kk(), 0xCD);
    }

    #[test]
    fn test_addr_ignores_family() {
        assert_eq!(OP.addr(), 0x0BCD);
        assert_eq!(0x1FFFu16.addr(), 0x0FFF);
    }
}
