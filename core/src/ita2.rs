//! ITA2 / МТК-2 symbol table
//!
//! Maps characters and shift markers to their 5-bit telegraph code. The table
//! has three pages (Latin letters, figures, Cyrillic letters); which page a
//! character lives on decides the shift marker the encoder must send first.

use std::fmt;

/// Five data bits, most significant (first transmitted) bit first
pub type Code = [u8; 5];

pub const CR: char = '\r';
pub const LF: char = '\n';

/// Cyrillic letters whose codes sit on the figures page
pub const FIGS_CYRILLIC: [char; 5] = ['Ш', 'Щ', 'Э', 'Ю', 'Ч'];

/// Shift state of the teleprinter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Lat,
    Figs,
    Rus,
}

impl Mode {
    pub fn marker(self) -> &'static str {
        match self {
            Mode::Lat => "LAT",
            Mode::Figs => "FIGS",
            Mode::Rus => "RUS",
        }
    }

    fn code(self) -> Code {
        match self {
            Mode::Lat => [1, 1, 1, 1, 1],
            Mode::Figs => [1, 1, 0, 1, 1],
            Mode::Rus => [0, 0, 0, 0, 0],
        }
    }
}

/// Page a character requires before it can be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    /// Valid on every page (space)
    Neutral,
    Page(Mode),
}

/// Key into the symbol table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKey {
    Char(char),
    Mode(Mode),
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKey::Char(CR) => f.write_str("CR"),
            SymbolKey::Char(LF) => f.write_str("LF"),
            SymbolKey::Char(c) => write!(f, "{}", c),
            SymbolKey::Mode(mode) => f.write_str(mode.marker()),
        }
    }
}

/// Look up the code for a character or shift marker.
///
/// Letters must already be uppercase; lookup is exact.
pub fn lookup(key: SymbolKey) -> Option<Code> {
    match key {
        SymbolKey::Mode(mode) => Some(mode.code()),
        SymbolKey::Char(c) => char_code(c),
    }
}

/// Page required to send `c`, or `None` if `c` is not in the table
pub fn classify(c: char) -> Option<CharClass> {
    char_code(c)?;
    let class = match c {
        ' ' => CharClass::Neutral,
        'A'..='Z' => CharClass::Page(Mode::Lat),
        'А'..='Я' | 'Ё' if FIGS_CYRILLIC.contains(&c) => CharClass::Page(Mode::Figs),
        'А'..='Я' | 'Ё' => CharClass::Page(Mode::Rus),
        _ => CharClass::Page(Mode::Figs),
    };
    Some(class)
}

/// Render a code as its bit string, e.g. `"01110"`
pub fn format_code(code: &Code) -> String {
    code.iter().map(|bit| if *bit == 1 { '1' } else { '0' }).collect()
}

fn char_code(c: char) -> Option<Code> {
    let code = match c {
        // Latin page
        'A' => [1, 1, 0, 0, 0],
        'B' => [1, 0, 0, 1, 1],
        'C' => [0, 1, 1, 1, 0],
        'D' => [1, 0, 0, 1, 0],
        'E' => [1, 0, 0, 0, 0],
        'F' => [1, 0, 1, 1, 0],
        'G' => [0, 1, 0, 1, 1],
        'H' => [0, 0, 1, 0, 1],
        'I' => [0, 1, 1, 0, 0],
        'J' => [1, 1, 0, 1, 0],
        'K' => [1, 1, 1, 1, 0],
        'L' => [0, 1, 0, 0, 1],
        'M' => [0, 0, 1, 1, 1],
        'N' => [0, 0, 1, 1, 0],
        'O' => [0, 0, 0, 1, 1],
        'P' => [0, 1, 1, 0, 1],
        'Q' => [1, 1, 1, 0, 1],
        'R' => [0, 1, 0, 1, 0],
        'S' => [1, 0, 1, 0, 0],
        'T' => [0, 0, 0, 0, 1],
        'U' => [1, 1, 1, 0, 0],
        'V' => [0, 1, 1, 1, 1],
        'W' => [1, 1, 0, 0, 1],
        'X' => [1, 0, 1, 1, 1],
        'Y' => [1, 0, 1, 0, 1],
        'Z' => [1, 0, 0, 0, 1],

        // Figures page
        '0' => [0, 1, 1, 0, 1],
        '1' => [1, 1, 1, 0, 1],
        '2' => [1, 1, 0, 0, 1],
        '3' => [1, 0, 0, 0, 0],
        '4' => [0, 1, 0, 1, 0],
        '5' => [0, 0, 0, 0, 1],
        '6' => [1, 0, 1, 0, 1],
        '7' => [1, 1, 1, 0, 0],
        '8' => [0, 1, 1, 0, 0],
        '9' => [0, 0, 0, 1, 1],
        '-' => [1, 1, 0, 0, 0],
        '+' => [1, 0, 0, 0, 1],
        '?' => [1, 0, 0, 1, 1],
        ':' => [0, 1, 1, 1, 0],
        '(' => [1, 1, 1, 1, 0],
        ')' => [0, 1, 0, 0, 1],
        '.' => [0, 0, 1, 1, 1],
        ',' => [0, 0, 1, 1, 0],
        '/' => [0, 1, 1, 1, 1],
        'Ш' => [0, 1, 0, 1, 1],
        'Щ' => [0, 0, 1, 0, 1],
        'Э' => [1, 0, 1, 1, 0],
        'Ю' => [1, 1, 0, 1, 0],
        'Ч' => [0, 1, 0, 1, 0],

        // Cyrillic page
        'А' => [1, 1, 0, 0, 0],
        'Б' => [1, 0, 0, 1, 1],
        'В' => [1, 1, 0, 0, 1],
        'Г' => [0, 1, 0, 1, 1],
        'Д' => [1, 0, 0, 1, 0],
        'Е' | 'Ё' => [1, 0, 0, 0, 0],
        'Ж' => [0, 1, 1, 1, 1],
        'З' => [1, 0, 0, 0, 1],
        'И' => [0, 1, 1, 0, 0],
        'Й' => [1, 1, 0, 1, 0],
        'К' => [1, 1, 1, 1, 0],
        'Л' => [0, 1, 0, 0, 1],
        'М' => [0, 0, 1, 1, 1],
        'Н' => [0, 0, 1, 1, 0],
        'О' => [0, 0, 0, 1, 1],
        'П' => [0, 1, 1, 0, 1],
        'Р' => [0, 1, 0, 1, 0],
        'С' => [1, 0, 1, 0, 0],
        'Т' => [0, 0, 0, 0, 1],
        'У' => [1, 1, 1, 0, 0],
        'Ф' => [1, 0, 1, 1, 0],
        'Х' => [0, 0, 1, 0, 1],
        'Ц' => [0, 1, 1, 1, 0],
        'Ъ' | 'Ь' => [1, 0, 1, 1, 1],
        'Ы' => [1, 0, 1, 0, 1],
        'Я' => [1, 1, 1, 0, 1],

        // Page independent
        ' ' => [0, 0, 1, 0, 0],
        CR => [0, 0, 0, 1, 0],
        LF => [0, 1, 0, 0, 0],

        _ => return None,
    };
    Some(code)
}
