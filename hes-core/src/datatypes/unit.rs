//! Physical unit enumeration used in scaler/unit structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// DLMS unit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unit(pub u8);

impl Unit {
    pub const YEAR: Unit = Unit(1);
    pub const MONTH: Unit = Unit(2);
    pub const WEEK: Unit = Unit(3);
    pub const DAY: Unit = Unit(4);
    pub const HOUR: Unit = Unit(5);
    pub const MINUTE: Unit = Unit(6);
    pub const SECOND: Unit = Unit(7);
    pub const WATT: Unit = Unit(27);
    pub const VOLT_AMPERE: Unit = Unit(28);
    pub const VAR: Unit = Unit(29);
    pub const WATT_HOUR: Unit = Unit(30);
    pub const VOLT_AMPERE_HOUR: Unit = Unit(31);
    pub const VAR_HOUR: Unit = Unit(32);
    pub const AMPERE: Unit = Unit(33);
    pub const COULOMB: Unit = Unit(34);
    pub const VOLT: Unit = Unit(35);
    pub const HERTZ: Unit = Unit(44);
    pub const KELVIN: Unit = Unit(46);
    pub const CELSIUS: Unit = Unit(47);
    pub const COUNT: Unit = Unit(255);

    pub fn code(self) -> u8 {
        self.0
    }

    /// Printable symbol, `None` for codes without one
    pub fn symbol(self) -> Option<&'static str> {
        let symbol = match self.0 {
            1 => "a",
            2 => "mo",
            3 => "wk",
            4 => "d",
            5 => "h",
            6 => "min",
            7 => "s",
            8 => "°",
            9 => "°C",
            10 => "currency",
            11 => "m",
            12 => "m/s",
            13 | 14 => "m³",
            15 | 16 => "m³/h",
            17 | 18 => "m³/d",
            19 => "l",
            20 => "kg",
            21 => "N",
            22 => "Nm",
            23 => "Pa",
            24 => "bar",
            25 => "J",
            26 => "J/h",
            27 => "W",
            28 => "VA",
            29 => "var",
            30 => "Wh",
            31 => "VAh",
            32 => "varh",
            33 => "A",
            34 => "C",
            35 => "V",
            36 => "V/m",
            37 => "F",
            38 => "Ω",
            39 => "Ωm²/m",
            40 => "Wb",
            41 => "T",
            42 => "A/m",
            43 => "H",
            44 => "Hz",
            46 => "K",
            47 => "°C",
            56 => "%",
            57 => "Ah",
            255 => "",
            _ => return None,
        };
        Some(symbol)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.symbol() {
            Some(symbol) => f.write_str(symbol),
            None => write!(f, "unit({})", self.0),
        }
    }
}
