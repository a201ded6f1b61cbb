//! RGBA colour value used by pixel operations, lights and declarations.

use std::fmt;
use std::str::FromStr;

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// An RGBA colour value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "ColourRepr", into = "String")]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Declarations may write colours as hex strings or `[r, g, b(, a)]` lists.
#[derive(Deserialize)]
#[serde(untagged)]
enum ColourRepr {
    Hex(String),
    List(Vec<u8>),
}

impl TryFrom<ColourRepr> for Colour {
    type Error = DataError;

    fn try_from(repr: ColourRepr) -> Result<Self> {
        match repr {
            ColourRepr::Hex(s) => Colour::from_hex(&s),
            ColourRepr::List(v) => match v.as_slice() {
                [r, g, b] => Ok(Colour::rgb(*r, *g, *b)),
                [r, g, b, a] => Ok(Colour::new(*r, *g, *b, *a)),
                _ => Err(DataError::Parse {
                    message: format!("colour list must have 3 or 4 entries, got {}", v.len()),
                    help: None,
                }),
            },
        }
    }
}

impl From<Colour> for String {
    fn from(c: Colour) -> String {
        c.to_string()
    }
}

impl Colour {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Parse `#RGB`, `#RGBA`, `#RRGGBB` or `#RRGGBBAA` (leading `#` optional).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        let hex = s.strip_prefix('#').unwrap_or(s);
        let digits: Vec<u8> = hex
            .chars()
            .map(parse_hex_digit)
            .collect::<Result<Vec<u8>>>()?;

        match digits.as_slice() {
            [r, g, b] => Ok(Self::rgb(r << 4 | r, g << 4 | g, b << 4 | b)),
            [r, g, b, a] => Ok(Self::new(r << 4 | r, g << 4 | g, b << 4 | b, a << 4 | a)),
            [r1, r0, g1, g0, b1, b0] => Ok(Self::rgb(r1 << 4 | r0, g1 << 4 | g0, b1 << 4 | b0)),
            [r1, r0, g1, g0, b1, b0, a1, a0] => Ok(Self::new(
                r1 << 4 | r0,
                g1 << 4 | g0,
                b1 << 4 | b0,
                a1 << 4 | a0,
            )),
            _ => Err(DataError::Parse {
                message: format!("Invalid hex colour: {}", s),
                help: Some("Use #RGB, #RGBA, #RRGGBB, or #RRGGBBAA format".to_string()),
            }),
        }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn to_pixel(self) -> Rgba<u8> {
        Rgba(self.to_rgba())
    }

    pub fn from_pixel(p: &Rgba<u8>) -> Self {
        Self::new(p[0], p[1], p[2], p[3])
    }

    pub fn is_transparent(self) -> bool {
        self.a == 0
    }
}

impl FromStr for Colour {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }
}

fn parse_hex_digit(c: char) -> Result<u8> {
    c.to_digit(16).map(|d| d as u8).ok_or_else(|| DataError::Parse {
        message: format!("Invalid hex digit: {}", c),
        help: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex_forms() {
        assert_eq!(Colour::from_hex("#FF0000").unwrap(), Colour::rgb(255, 0, 0));
        assert_eq!(Colour::from_hex("#ABC").unwrap(), Colour::rgb(0xAA, 0xBB, 0xCC));
        assert_eq!(Colour::from_hex("#F008").unwrap(), Colour::new(255, 0, 0, 0x88));
        assert_eq!(Colour::from_hex("80808080").unwrap(), Colour::new(128, 128, 128, 128));
    }

    #[test]
    fn test_from_hex_invalid() {
        assert!(Colour::from_hex("#GGG").is_err());
        assert!(Colour::from_hex("#12345").is_err());
        assert!(Colour::from_hex("").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        let c = Colour::new(1, 2, 3, 4);
        assert_eq!(c.to_string(), "#01020304");
        assert_eq!(c.to_string().parse::<Colour>().unwrap(), c);
    }

    #[test]
    fn test_deserialize_hex_and_list() {
        let a: Colour = serde_yaml::from_str("'#808080'").unwrap();
        let b: Colour = serde_yaml::from_str("[128, 128, 128]").unwrap();
        assert_eq!(a, b);
        let c: Colour = serde_yaml::from_str("[1, 2, 3, 4]").unwrap();
        assert_eq!(c, Colour::new(1, 2, 3, 4));
        assert!(serde_yaml::from_str::<Colour>("[1, 2]").is_err());
    }
}
