// wristhub — GPS Raw Line Capture
//
// UART bytes are assembled into NMEA-sized lines on the interrupt side.
// Decoding is left to the host. Only one finished line is held for the
// consumer; anything that would be overwritten or truncated is flagged.

use heapless::String;

use crate::config::NMEA_MAX_LINE;

pub type NmeaLine = String<NMEA_MAX_LINE>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpsLine {
    pub line: NmeaLine,
    /// Data was dropped since the previous line reached the consumer.
    pub lost: bool,
}

#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: NmeaLine,
    truncated: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte. Returns a finished line on `\n`.
    pub fn push(&mut self, byte: u8) -> Option<GpsLine> {
        match byte {
            b'\r' => None,
            b'\n' => {
                if self.buf.is_empty() && !self.truncated {
                    return None;
                }
                let line = GpsLine {
                    line: core::mem::take(&mut self.buf),
                    lost: self.truncated,
                };
                self.truncated = false;
                Some(line)
            }
            b if b.is_ascii() => {
                if self.buf.push(b as char).is_err() {
                    self.truncated = true;
                }
                None
            }
            _ => {
                self.truncated = true;
                None
            }
        }
    }
}

/// Store `line` in the single consumer slot, flagging loss if the previous
/// line was never drained.
pub fn store_line(slot: &mut Option<GpsLine>, mut line: GpsLine) {
    if let Some(prev) = slot.take() {
        log::trace!("GPS line dropped before drain: {}", prev.line);
        line.lost = true;
    }
    *slot = Some(line);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(asm: &mut LineAssembler, text: &str) -> Vec<GpsLine> {
        text.bytes().filter_map(|b| asm.push(b)).collect()
    }

    #[test]
    fn lines_split_on_newline() {
        let mut asm = LineAssembler::new();
        let lines = feed(&mut asm, "$GPGGA,1*00\r\n$GPRMC,2*00\r\n\r\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line.as_str(), "$GPGGA,1*00");
        assert!(!lines[1].lost);
    }

    #[test]
    fn overlong_line_is_truncated_and_flagged() {
        let mut asm = LineAssembler::new();
        let long = "X".repeat(NMEA_MAX_LINE + 10);
        let lines = feed(&mut asm, &format!("{long}\n$OK\n"));
        assert_eq!(lines[0].line.len(), NMEA_MAX_LINE);
        assert!(lines[0].lost);
        assert!(!lines[1].lost);
    }

    #[test]
    fn undrained_line_marks_loss() {
        let mut slot = None;
        let mut asm = LineAssembler::new();
        for line in feed(&mut asm, "$A\n$B\n") {
            store_line(&mut slot, line);
        }
        let held = slot.take().unwrap();
        assert_eq!(held.line.as_str(), "$B");
        assert!(held.lost);
    }
}
