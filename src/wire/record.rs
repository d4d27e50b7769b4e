//! # Telemetry Records
//!
//! Encodes and decodes the line-oriented wire format.
//!
//! Each record is serialized as `"<elapsed_s>,<value>\n"` with elapsed time
//! fixed to one decimal place and the calibrated value to four. The decimal
//! precision is part of the protocol: the host persists fields exactly as
//! formatted here.

use crate::error::{Result, VbattLinkError};

/// One calibrated sensor reading, stamped with the session-relative time at
/// which the device produced it.
///
/// Immutable once sent; the device's elapsed clock re-bases to zero for every
/// accepted connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRecord {
    /// Seconds since the current session began (non-negative)
    pub elapsed_s: f64,
    /// Calibrated physical value (battery volts)
    pub value: f64,
}

impl SampleRecord {
    #[must_use]
    pub fn new(elapsed_s: f64, value: f64) -> Self {
        Self { elapsed_s, value }
    }

    /// Serialize to one wire line, including the terminating newline.
    ///
    /// # Examples
    ///
    /// ```
    /// use vbatt_link::wire::SampleRecord;
    ///
    /// let record = SampleRecord::new(12.34, 3.301);
    /// assert_eq!(record.to_wire_line(), "12.3,3.3010\n");
    /// ```
    #[must_use]
    pub fn to_wire_line(&self) -> String {
        format!("{:.1},{:.4}\n", self.elapsed_s, self.value)
    }

    /// Parse one extracted line (terminator already stripped) into a record.
    ///
    /// Trailing whitespace (e.g. a `\r` from a peer using CRLF) is ignored.
    ///
    /// # Errors
    ///
    /// Returns a `Frame` error if the line is not UTF-8, does not contain
    /// exactly two comma-separated fields, or either field fails to parse as
    /// a decimal number. The caller is expected to drop the line and keep
    /// the stream alive.
    pub fn parse_wire_line(line: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(line)
            .map_err(|_| VbattLinkError::Frame(format!("non-UTF-8 line: {:?}", line)))?;
        let text = text.trim_end();

        let mut fields = text.split(',');
        let (elapsed_field, value_field) = match (fields.next(), fields.next(), fields.next()) {
            (Some(a), Some(b), None) => (a, b),
            _ => {
                return Err(VbattLinkError::Frame(
                    format!("expected 2 fields, got line {:?}", text)
                ));
            }
        };

        let elapsed_s: f64 = elapsed_field.trim().parse()
            .map_err(|_| VbattLinkError::Frame(
                format!("bad elapsed_s field {:?} in line {:?}", elapsed_field, text)
            ))?;
        let value: f64 = value_field.trim().parse()
            .map_err(|_| VbattLinkError::Frame(
                format!("bad value field {:?} in line {:?}", value_field, text)
            ))?;

        Ok(Self { elapsed_s, value })
    }
}
