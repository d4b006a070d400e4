use crate::error::{Result, RttyError};
use crate::events::LogEvent;
use crate::ita2::{self, CharClass, Code, Mode, SymbolKey, CR, LF};
use std::fmt;

/// Number of bit units every encoded symbol occupies on the line
pub const UNITS_PER_SYMBOL: usize = 8;

/// One keying interval of the line signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitUnit {
    /// Data 0 or start bit, sent on the space tone
    Space,
    /// Data 1 or stop bit, sent on the mark tone
    Mark,
    /// Trailing half-length stop, sent on the mark tone
    HalfStop,
}

impl BitUnit {
    fn from_bit(bit: u8) -> Self {
        if bit == 0 {
            BitUnit::Space
        } else {
            BitUnit::Mark
        }
    }

    /// Numeric value as written in bit listings (0, 1 or 0.5)
    pub fn value(self) -> f64 {
        match self {
            BitUnit::Space => 0.0,
            BitUnit::Mark => 1.0,
            BitUnit::HalfStop => 0.5,
        }
    }

    pub fn is_mark(self) -> bool {
        !matches!(self, BitUnit::Space)
    }

    /// Length of this unit relative to one full bit period
    pub fn duration_factor(self) -> f64 {
        match self {
            BitUnit::HalfStop => 0.5,
            _ => 1.0,
        }
    }
}

impl fmt::Display for BitUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitUnit::Space => f.write_str("0"),
            BitUnit::Mark => f.write_str("1"),
            BitUnit::HalfStop => f.write_str("0.5"),
        }
    }
}

/// Frame a 5-bit code as start + data + stop + half-stop
pub fn frame(code: &Code) -> [BitUnit; UNITS_PER_SYMBOL] {
    let mut units = [BitUnit::Space; UNITS_PER_SYMBOL];
    for (unit, bit) in units[1..6].iter_mut().zip(code.iter()) {
        *unit = BitUnit::from_bit(*bit);
    }
    units[6] = BitUnit::Mark;
    units[7] = BitUnit::HalfStop;
    units
}

/// Comma separated listing of bit units, e.g. `0,1,1,0.5`
pub fn format_bits(bits: &[BitUnit]) -> String {
    bits.iter()
        .map(|bit| bit.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Result of encoding one message
#[derive(Debug, Clone, Default)]
pub struct Encoding {
    /// Line signal, `UNITS_PER_SYMBOL` units per entry of `symbols`
    pub bits: Vec<BitUnit>,
    /// Characters and shift markers in transmission order
    pub symbols: Vec<SymbolKey>,
    /// Input characters missing from the table
    pub skipped: Vec<char>,
    pub events: Vec<LogEvent>,
}

impl Encoding {
    fn push(&mut self, key: SymbolKey, verbose: bool) {
        let Some(code) = ita2::lookup(key) else {
            return;
        };
        if verbose {
            self.event(LogEvent::info(format!(
                "Symbol '{}' → 0+{}+1.5",
                key,
                ita2::format_code(&code)
            )));
        }
        self.symbols.push(key);
        self.bits.extend_from_slice(&frame(&code));
    }

    fn event(&mut self, event: LogEvent) {
        log::debug!("{}", event.message);
        self.events.push(event);
    }
}

/// Text to ITA2 / МТК-2 line code encoder
///
/// Every message is framed as `LAT CR LF <text> CR LF`. Shift markers are
/// inserted only when the next character lives on a different page than
/// the current one; spaces are valid on every page and never shift.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaudotEncoder {
    verbose: bool,
}

impl BaudotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every emitted symbol with its code
    pub fn with_verbose(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Encode `text` into bit units.
    ///
    /// Fails with `EmptyInput` for blank text. Unsupported characters are
    /// skipped and reported as warnings.
    pub fn encode(&self, text: &str) -> Result<Encoding> {
        if text.trim().is_empty() {
            return Err(RttyError::EmptyInput);
        }

        let normalized = text.to_uppercase();
        let mut out = Encoding::default();

        out.event(LogEvent::highlight(format!("Transmitting: '{}'", normalized)));
        out.event(LogEvent::info("Beginning Baudot encoding"));

        out.push(SymbolKey::Mode(Mode::Lat), self.verbose);
        out.push(SymbolKey::Char(CR), self.verbose);
        out.push(SymbolKey::Char(LF), self.verbose);

        let mut current = Mode::Lat;
        for c in normalized.chars() {
            let Some(class) = ita2::classify(c) else {
                log::warn!("skipping unsupported character {:?}", c);
                out.skipped.push(c);
                out.event(LogEvent::warning(format!(
                    "{}, skipping",
                    RttyError::UnsupportedCharacter(c)
                )));
                continue;
            };

            if let CharClass::Page(mode) = class {
                if mode != current {
                    out.push(SymbolKey::Mode(mode), self.verbose);
                    current = mode;
                }
            }
            out.push(SymbolKey::Char(c), self.verbose);
        }

        out.push(SymbolKey::Char(CR), self.verbose);
        out.push(SymbolKey::Char(LF), self.verbose);

        out.event(LogEvent::info("Encoding complete"));
        let total = out.bits.len();
        out.event(LogEvent::info(format!("Total bit units: {}", total)));

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogKind;

    fn units(key: SymbolKey) -> Vec<BitUnit> {
        frame(&ita2::lookup(key).unwrap()).to_vec()
    }

    fn chars(s: &str) -> Vec<SymbolKey> {
        s.chars().map(SymbolKey::Char).collect()
    }

    fn framed(symbols: &[SymbolKey]) -> Vec<SymbolKey> {
        let mut all = vec![
            SymbolKey::Mode(Mode::Lat),
            SymbolKey::Char(CR),
            SymbolKey::Char(LF),
        ];
        all.extend_from_slice(symbols);
        all.push(SymbolKey::Char(CR));
        all.push(SymbolKey::Char(LF));
        all
    }

    #[test]
    fn test_frame_layout() {
        let units = frame(&[0, 1, 1, 1, 0]);
        assert_eq!(
            units,
            [
                BitUnit::Space,
                BitUnit::Space,
                BitUnit::Mark,
                BitUnit::Mark,
                BitUnit::Mark,
                BitUnit::Space,
                BitUnit::Mark,
                BitUnit::HalfStop,
            ]
        );
    }

    #[test]
    fn test_cq_example() {
        let encoding = BaudotEncoder::new().encode("CQ").unwrap();
        assert_eq!(encoding.symbols, framed(&chars("CQ")));
        assert_eq!(encoding.bits.len(), 7 * UNITS_PER_SYMBOL);
    }

    #[test]
    fn test_every_symbol_is_eight_units() {
        let encoding = BaudotEncoder::new().encode("Привет 73, de R1ABC").unwrap();
        assert_eq!(encoding.bits.len(), encoding.symbols.len() * UNITS_PER_SYMBOL);

        for (symbol, chunk) in encoding
            .symbols
            .iter()
            .zip(encoding.bits.chunks(UNITS_PER_SYMBOL))
        {
            assert_eq!(chunk[0], BitUnit::Space, "start bit of {}", symbol);
            assert_eq!(chunk[6], BitUnit::Mark, "stop bit of {}", symbol);
            assert_eq!(chunk[7], BitUnit::HalfStop, "half stop of {}", symbol);
            assert_eq!(chunk, units(*symbol).as_slice());
        }
    }

    #[test]
    fn test_prologue_and_epilogue() {
        for text in ["A", "ЖЖЖ", "123", "€€"] {
            let bits = BaudotEncoder::new().encode(text).unwrap().bits;
            let head: Vec<BitUnit> = [
                SymbolKey::Mode(Mode::Lat),
                SymbolKey::Char(CR),
                SymbolKey::Char(LF),
            ]
            .into_iter()
            .flat_map(units)
            .collect();
            let tail: Vec<BitUnit> = [SymbolKey::Char(CR), SymbolKey::Char(LF)]
                .into_iter()
                .flat_map(units)
                .collect();

            assert_eq!(&bits[..head.len()], head.as_slice(), "{}", text);
            assert_eq!(&bits[bits.len() - tail.len()..], tail.as_slice(), "{}", text);
        }
    }

    #[test]
    fn test_shift_only_on_page_change() {
        let encoding = BaudotEncoder::new().encode("AB12CD").unwrap();
        let expected = framed(&[
            SymbolKey::Char('A'),
            SymbolKey::Char('B'),
            SymbolKey::Mode(Mode::Figs),
            SymbolKey::Char('1'),
            SymbolKey::Char('2'),
            SymbolKey::Mode(Mode::Lat),
            SymbolKey::Char('C'),
            SymbolKey::Char('D'),
        ]);
        assert_eq!(encoding.symbols, expected);
    }

    #[test]
    fn test_cyrillic_pages() {
        // Ш lives on the figures page, Д and А on the Cyrillic page
        let encoding = BaudotEncoder::new().encode("дша").unwrap();
        let expected = framed(&[
            SymbolKey::Mode(Mode::Rus),
            SymbolKey::Char('Д'),
            SymbolKey::Mode(Mode::Figs),
            SymbolKey::Char('Ш'),
            SymbolKey::Mode(Mode::Rus),
            SymbolKey::Char('А'),
        ]);
        assert_eq!(encoding.symbols, expected);
    }

    #[test]
    fn test_space_is_neutral() {
        let encoding = BaudotEncoder::new().encode("A B").unwrap();
        assert_eq!(encoding.symbols, framed(&chars("A B")));

        // Mode after the space is still figures, so no marker before '2'
        let encoding = BaudotEncoder::new().encode("1 2").unwrap();
        let expected = framed(&[
            SymbolKey::Mode(Mode::Figs),
            SymbolKey::Char('1'),
            SymbolKey::Char(' '),
            SymbolKey::Char('2'),
        ]);
        assert_eq!(encoding.symbols, expected);
    }

    #[test]
    fn test_unsupported_character_skipped() {
        let encoder = BaudotEncoder::new();
        let with_euro = encoder.encode("A€B").unwrap();
        let plain = encoder.encode("AB").unwrap();

        assert_eq!(with_euro.bits, plain.bits);
        assert_eq!(with_euro.skipped, vec!['€']);

        let warnings: Vec<_> = with_euro
            .events
            .iter()
            .filter(|e| e.kind == LogKind::Warning)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains('€'));
    }

    #[test]
    fn test_only_unsupported_characters() {
        let encoding = BaudotEncoder::new().encode("€!").unwrap();
        assert_eq!(encoding.symbols, framed(&[]));
        assert_eq!(encoding.skipped.len(), 2);
    }

    #[test]
    fn test_empty_input_rejected() {
        for text in ["", "   ", "\t\n"] {
            let result = BaudotEncoder::new().encode(text);
            assert!(matches!(result, Err(RttyError::EmptyInput)), "{:?}", text);
        }
    }

    #[test]
    fn test_mode_resets_between_calls() {
        let encoder = BaudotEncoder::new();
        let first = encoder.encode("123").unwrap();
        let second = encoder.encode("123").unwrap();
        assert_eq!(first.bits, second.bits);

        // A fresh call starts on the Latin page again
        let latin = encoder.encode("A").unwrap();
        assert_eq!(latin.symbols, framed(&chars("A")));
    }

    #[test]
    fn test_events() {
        let encoding = BaudotEncoder::new().encode("cq").unwrap();
        let messages: Vec<&str> = encoding.events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Transmitting: 'CQ'",
                "Beginning Baudot encoding",
                "Encoding complete",
                "Total bit units: 56",
            ]
        );
        assert_eq!(encoding.events[0].kind, LogKind::Highlight);
    }

    #[test]
    fn test_verbose_events() {
        let encoding = BaudotEncoder::with_verbose(true).encode("C").unwrap();
        let messages: Vec<&str> = encoding.events.iter().map(|e| e.message.as_str()).collect();
        assert!(messages.contains(&"Symbol 'LAT' → 0+11111+1.5"));
        assert!(messages.contains(&"Symbol 'CR' → 0+00010+1.5"));
        assert!(messages.contains(&"Symbol 'C' → 0+01110+1.5"));
        // One line per symbol on top of the four summary events
        assert_eq!(messages.len(), 4 + encoding.symbols.len());
    }

    #[test]
    fn test_format_bits() {
        assert_eq!(
            format_bits(&[BitUnit::Space, BitUnit::Mark, BitUnit::HalfStop]),
            "0,1,0.5"
        );
    }
}
