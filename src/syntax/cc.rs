/// Character classes of the PDF syntax.
#[derive(Debug, PartialEq)]
pub enum CharClass {
    Space,
    Delim,
    Reg
}

impl CharClass {
    pub fn of(ch: u8) -> CharClass {
        match ch {
            b'\x00' | b'\x09' | b'\x0A' | b'\x0C' | b'\x0D' | b'\x20' => CharClass::Space,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' => CharClass::Delim,
            _ => CharClass::Reg
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        for c in [b'\0', b'\t', b'\n', b'\x0C', b'\r', b' '] {
            assert_eq!(CharClass::of(c), CharClass::Space);
        }
        for c in [b'(', b')', b'<', b'>', b'[', b']', b'{', b'}', b'/', b'%'] {
            assert_eq!(CharClass::of(c), CharClass::Delim);
        }
        for c in [b'a', b'\\', b'\'', b'"', b'\x08'] {
            assert_eq!(CharClass::of(c), CharClass::Reg);
        }
    }
}
