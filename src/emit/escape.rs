//! C literal escaping
//!
//! Turns arbitrary byte payloads (labels, callback text, image data) into
//! compilable C literals on the code sink. The string escaper is bit-exact
//! about its wrapping policy: escapes are never split across a line break,
//! UTF-8 sequences only break before a leader byte, and an octal escape that
//! would swallow a following hex digit splits the literal in two.
//!
//! All output goes through the writer's raw code layer, so escaped text is
//! checksummed like any other code-sink byte.

use std::io;

use crate::emit::writer::CodeWriter;

/// Column at which the escapers prefer to break a line.
const WRAP_COLUMN: i32 = 77;

/// Payloads longer than this are abbreviated in source-view mode.
const SOURCE_VIEW_TEXT_LIMIT: usize = 300;

impl CodeWriter<'_> {
    /// Write `s` to the code sink as a double-quoted C string literal.
    ///
    /// See [`write_c_string_bytes`](Self::write_c_string_bytes) for the
    /// escaping rules; this is the common case of a known, UTF-8 payload.
    pub fn write_c_string(&mut self, s: &str) -> io::Result<()> {
        self.write_c_string_bytes(Some(s.as_bytes()))
    }

    /// Write a byte payload as a double-quoted C string literal.
    ///
    /// Escaping rules, in order:
    /// - control characters with a short form (`\b \t \n \f \r`) and the
    ///   quote characters use their two-character escape,
    /// - a `?` directly following another `?` is written `\?` so the output
    ///   can never form a trigraph,
    /// - printable ASCII passes through verbatim,
    /// - non-ASCII bytes pass through verbatim when the project uses UTF-8
    ///   in sources; a soft line break is allowed only before a sequence
    ///   leader byte,
    /// - anything else becomes an octal escape. If the next payload byte is
    ///   a hex digit the literal is split (`"` immediately followed by `"`)
    ///   so the compiler cannot fold it into the escape.
    ///
    /// In source-view mode oversized or missing payloads are abbreviated to
    /// a placeholder. A missing payload outside source-view mode emits an
    /// `#error` directive followed by a placeholder literal.
    pub fn write_c_string_bytes(&mut self, s: Option<&[u8]>) -> io::Result<()> {
        if self.probing_code_write() {
            return Ok(());
        }
        if self.source_view_enabled() {
            match s {
                Some(bytes) if bytes.len() > SOURCE_VIEW_TEXT_LIMIT => {
                    return self.code_bytes(
                        format!("\" ... {} bytes of text... \"", bytes.len()).as_bytes(),
                    );
                }
                None => return self.code_bytes(b"\" ... text... \""),
                Some(_) => {}
            }
        }
        let Some(s) = s else {
            self.code_bytes(b"\n#error  string not found\n")?;
            return self.code_bytes(b"\" ... undefined size text... \"");
        };

        let utf8_in_src = self.settings().utf8_in_src;
        let mut linelength: i32 = 1;
        self.code_byte(b'"')?;
        let mut i = 0;
        while i < s.len() {
            let c = s[i];
            let two_char = match c {
                0x08 => Some(b'b'),
                b'\t' => Some(b't'),
                b'\n' => Some(b'n'),
                0x0c => Some(b'f'),
                b'\r' => Some(b'r'),
                b'"' | b'\'' | b'\\' => Some(c),
                // ?? must not survive verbatim, or it could open a trigraph
                b'?' if i > 0 && s[i - 1] == b'?' => Some(b'?'),
                _ => None,
            };
            i += 1;
            if let Some(esc) = two_char {
                if linelength >= WRAP_COLUMN {
                    self.code_bytes(b"\\\n")?;
                    linelength = 0;
                }
                self.code_byte(b'\\')?;
                self.code_byte(esc)?;
                linelength += 2;
                continue;
            }
            if (0x20..0x7f).contains(&c) {
                if linelength >= WRAP_COLUMN + 1 {
                    self.code_bytes(b"\\\n")?;
                    linelength = 0;
                }
                self.code_byte(c)?;
                linelength += 1;
                continue;
            }
            if utf8_in_src && c & 0x80 != 0 {
                if c & 0x40 != 0 {
                    // sequence leader (0b11......): a break is allowed here,
                    // never in front of a continuation byte
                    if linelength >= WRAP_COLUMN + 1 {
                        self.code_bytes(b"\\\n")?;
                        linelength = 0;
                    }
                }
                self.code_byte(c)?;
                linelength += 1;
                continue;
            }
            // octal escape with exactly as many digits as the value needs
            let wrap_at = match c {
                0..=7 => WRAP_COLUMN - 1,
                8..=63 => WRAP_COLUMN - 2,
                _ => WRAP_COLUMN - 3,
            };
            if linelength >= wrap_at {
                self.code_bytes(b"\\\n")?;
                linelength = 0;
            }
            let octal = format!("\\{c:o}");
            linelength += octal.len() as i32;
            self.code_bytes(octal.as_bytes())?;
            // A hex digit after the escape would be consumed as part of it;
            // split the literal so the escape terminates here.
            if let Some(&next) = s.get(i) {
                if next.is_ascii_hexdigit() {
                    self.code_byte(b'"')?;
                    linelength += 1;
                    if linelength >= WRAP_COLUMN + 2 {
                        self.code_bytes(b"\n")?;
                        linelength = 0;
                    }
                    self.code_byte(b'"')?;
                    linelength += 1;
                }
            }
        }
        self.code_byte(b'"')
    }

    /// Write a byte payload as a brace-wrapped C array initializer of
    /// decimal bytes, e.g. `{1,2,200}`. Does not append a terminating null.
    ///
    /// Placeholder and error handling mirror
    /// [`write_c_string_bytes`](Self::write_c_string_bytes).
    pub fn write_c_data(&mut self, data: Option<&[u8]>) -> io::Result<()> {
        if self.probing_code_write() {
            return Ok(());
        }
        if self.source_view_enabled() {
            return match data {
                Some(bytes) => self.code_bytes(
                    format!("{{ /* ... {} bytes of binary data... */ }}", bytes.len()).as_bytes(),
                ),
                None => self.code_bytes(b"{ /* ... binary data... */ }"),
            };
        }
        let Some(data) = data else {
            self.code_bytes(b"\n#error  data not found\n")?;
            return self.code_bytes(b"{ /* ... undefined size binary data... */ }");
        };

        let mut linelength: i32 = 1;
        self.code_byte(b'{')?;
        for (idx, &c) in data.iter().enumerate() {
            linelength += match c {
                0..=9 => 2,
                10..=99 => 3,
                _ => 4,
            };
            if linelength >= WRAP_COLUMN {
                self.code_bytes(b"\n")?;
                linelength = 0;
            }
            self.code_bytes(format!("{c}").as_bytes())?;
            if idx + 1 < data.len() {
                self.code_byte(b',')?;
            }
        }
        self.code_byte(b'}')
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::project::ProjectSettings;

    fn escape_string(s: &str) -> String {
        escape_bytes(Some(s.as_bytes()), true, false)
    }

    fn escape_bytes(s: Option<&[u8]>, utf8_in_src: bool, source_view: bool) -> String {
        let settings = ProjectSettings::default().with_utf8_in_src(utf8_in_src);
        let mut code = Vec::new();
        let mut header = Vec::new();
        {
            let mut w = CodeWriter::new(&settings, &mut code, &mut header, source_view);
            w.write_c_string_bytes(s).unwrap();
        }
        String::from_utf8(code).unwrap()
    }

    fn escape_data(d: Option<&[u8]>, source_view: bool) -> String {
        let settings = ProjectSettings::default();
        let mut code = Vec::new();
        let mut header = Vec::new();
        {
            let mut w = CodeWriter::new(&settings, &mut code, &mut header, source_view);
            w.write_c_data(d).unwrap();
        }
        String::from_utf8(code).unwrap()
    }

    // ========================================
    // String escaping
    // ========================================

    #[test]
    fn test_plain_ascii_passes_through() {
        assert_eq!(escape_string("hello world"), "\"hello world\"");
    }

    #[test]
    fn test_newline_becomes_two_char_escape() {
        assert_eq!(escape_string("hi\n"), "\"hi\\n\"");
    }

    #[test]
    fn test_control_characters() {
        assert_eq!(escape_string("a\tb"), "\"a\\tb\"");
        assert_eq!(escape_string("a\rb"), "\"a\\rb\"");
        assert_eq!(escape_string("a\u{8}b"), "\"a\\bb\"");
        assert_eq!(escape_string("a\u{c}b"), "\"a\\fb\"");
    }

    #[test]
    fn test_quotes_and_backslash() {
        assert_eq!(escape_string("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(escape_string("a\\b"), "\"a\\\\b\"");
        assert_eq!(escape_string("it's"), "\"it\\'s\"");
    }

    #[test]
    fn test_double_question_mark_defeats_trigraphs() {
        assert_eq!(escape_string("a??b"), "\"a?\\?b\"");
        assert_eq!(escape_string("???="), "\"?\\?\\?=\"");
    }

    #[test]
    fn test_single_question_mark_untouched() {
        assert_eq!(escape_string("a?b"), "\"a?b\"");
    }

    #[test]
    fn test_octal_escape_minimal_digits() {
        assert_eq!(escape_bytes(Some(&[0x01]), true, false), "\"\\1\"");
        assert_eq!(escape_bytes(Some(&[0x1f]), true, false), "\"\\37\"");
        assert_eq!(escape_bytes(Some(&[0x01, b'z']), true, false), "\"\\1z\"");
    }

    #[test]
    fn test_octal_escape_splits_before_hex_digit() {
        assert_eq!(escape_bytes(Some(&[0x01, b'9']), true, false), "\"\\1\"\"9\"");
        assert_eq!(escape_bytes(Some(&[0x01, b'f']), true, false), "\"\\1\"\"f\"");
        assert_eq!(escape_bytes(Some(&[0x01, b'G']), true, false), "\"\\1G\"");
    }

    #[test]
    fn test_non_ascii_verbatim_with_utf8() {
        assert_eq!(escape_bytes(Some("é".as_bytes()), true, false), "\"é\"");
    }

    #[test]
    fn test_non_ascii_octal_without_utf8() {
        assert_eq!(
            escape_bytes(Some(&[0xc3, 0xa9]), false, false),
            "\"\\303\\251\""
        );
    }

    #[test]
    fn test_long_text_soft_wraps() {
        let long = "a".repeat(200);
        let out = escape_string(&long);
        assert!(out.contains("\\\n"));
        // rejoining continuation lines restores the original text
        let rejoined = out.replace("\\\n", "");
        assert_eq!(rejoined, format!("\"{long}\""));
        for line in out.lines() {
            assert!(line.len() <= 80, "line too long: {}", line.len());
        }
    }

    #[test]
    fn test_missing_payload_emits_error_directive() {
        let out = escape_bytes(None, true, false);
        assert!(out.starts_with("\n#error  string not found\n"));
        assert!(out.ends_with("\" ... undefined size text... \""));
    }

    #[test]
    fn test_source_view_abbreviates_long_text() {
        let long = "x".repeat(301);
        let out = escape_bytes(Some(long.as_bytes()), true, true);
        assert_eq!(out, "\" ... 301 bytes of text... \"");
    }

    #[test]
    fn test_source_view_keeps_short_text() {
        let out = escape_bytes(Some(b"short"), true, true);
        assert_eq!(out, "\"short\"");
    }

    // ========================================
    // Binary data escaping
    // ========================================

    #[test]
    fn test_data_decimal_bytes() {
        assert_eq!(escape_data(Some(&[1, 2, 200]), false), "{1,2,200}");
    }

    #[test]
    fn test_data_empty() {
        assert_eq!(escape_data(Some(&[]), false), "{}");
    }

    #[test]
    fn test_data_wraps_long_runs() {
        let bytes = vec![200u8; 64];
        let out = escape_data(Some(&bytes), false);
        assert!(out.contains('\n'));
        let rejoined: String = out.split('\n').collect();
        assert_eq!(rejoined.matches("200").count(), 64);
    }

    #[test]
    fn test_data_missing_payload() {
        let out = escape_data(None, false);
        assert!(out.starts_with("\n#error  data not found\n"));
        assert!(out.ends_with("{ /* ... undefined size binary data... */ }"));
    }

    #[test]
    fn test_data_source_view_placeholder() {
        assert_eq!(
            escape_data(Some(&[1, 2, 3]), true),
            "{ /* ... 3 bytes of binary data... */ }"
        );
    }

    // ========================================
    // Probe interaction
    // ========================================

    #[test]
    fn test_escapers_marked_as_variable_use() {
        let settings = ProjectSettings::default();
        let mut code = Vec::new();
        let mut header = Vec::new();
        {
            let mut w = CodeWriter::new(&settings, &mut code, &mut header, false);
            w.begin_variable_probe();
            w.write_c_string("label").unwrap();
            assert!(w.end_variable_probe());
        }
        assert!(code.is_empty());
    }
}
