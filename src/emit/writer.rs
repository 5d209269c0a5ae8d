//! Dual-stream code writer
//!
//! One [`CodeWriter`] exists per emit pass. It owns the two output sinks
//! (source and header), tracks indentation, de-duplicates include and
//! declaration lines, hands out stable unique identifiers, and folds every
//! code-sink byte into the running block checksum when merge-back tagging is
//! enabled.
//!
//! ## Interposition layers
//!
//! Public write operations go through two layers:
//!
//! - `write_code` / `write_header` honor the variable-use probe (writes are
//!   suppressed while probing, and a suppressed code write records that the
//!   probed variable would have been referenced);
//! - `code_bytes` / `header_bytes` are the raw appends. Code-sink bytes are
//!   normalized into the block checksum here; header bytes never are.
//!
//! The once-variants and the tagger sit directly on the raw layer, mirroring
//! how declaration de-duplication behaves in the shipped generator.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fmt::Write as _;
use std::io;
use std::io::Write;

use crate::emit::crc::BlockChecksum;
use crate::project::ProjectSettings;
use crate::tree::{is_ident_byte, Visibility};

/// Marker that introduces a tag line in the code sink.
pub(crate) const TAG_MARKER: &str = "//~fl~";

/// 32 spaces; indent strings are slices of this constant.
const INDENT_SPACES: &str = "                                ";

/// Longest identifier base the allocator composes before a conflict suffix.
const MAX_ID_BASE: usize = 119;

/// Kind field of a block tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// Structural output; edits to these blocks cannot be merged back.
    Generic,
    /// A designer-owned code block.
    Code,
    /// Callback text of a menu entry.
    MenuCallback,
    /// Callback text of a widget.
    WidgetCallback,
}

impl TagKind {
    /// The decimal digit used on the wire.
    pub fn digit(self) -> u8 {
        match self {
            TagKind::Generic => 0,
            TagKind::Code => 1,
            TagKind::MenuCallback => 2,
            TagKind::WidgetCallback => 3,
        }
    }

    /// Parse the wire digit back into a kind.
    pub fn from_digit(d: u32) -> Option<TagKind> {
        match d {
            0 => Some(TagKind::Generic),
            1 => Some(TagKind::Code),
            2 => Some(TagKind::MenuCallback),
            3 => Some(TagKind::WidgetCallback),
            _ => None,
        }
    }

}

/// Output sink with a byte counter, so source-view offsets do not depend on
/// the sink being seekable.
struct CountedSink<'w> {
    inner: Box<dyn Write + 'w>,
    written: u64,
}

impl<'w> CountedSink<'w> {
    fn new(inner: impl Write + 'w) -> Self {
        Self {
            inner: Box::new(inner),
            written: 0,
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.written
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl fmt::Debug for CountedSink<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountedSink").field("written", &self.written).finish()
    }
}

/// Innermost class or widget-class scope, for access-specifier elision.
#[derive(Debug, Clone, Copy)]
struct ClassScope {
    uid: u16,
    visibility: Option<Visibility>,
}

/// Buffered two-stream writer for one emission pass.
///
/// Created per [`emit_files`](crate::emit::emit_files) call and torn down at
/// the end of it; there is no process-wide writer state.
#[derive(Debug)]
pub struct CodeWriter<'w> {
    settings: &'w ProjectSettings,
    code: CountedSink<'w>,
    header: CountedSink<'w>,
    indentation: i32,
    ids: BTreeMap<String, u16>,
    text_in_header: HashSet<String>,
    text_in_code: HashSet<String>,
    uids_in_code: HashSet<u16>,
    class_stack: Vec<ClassScope>,
    source_view: bool,
    varused_test: bool,
    varused: bool,
    checksum: BlockChecksum,
}

impl<'w> CodeWriter<'w> {
    /// Create a writer over two sinks. `source_view` selects the abbreviated
    /// emission mode used by the code preview pane.
    pub fn new(
        settings: &'w ProjectSettings,
        code: impl Write + 'w,
        header: impl Write + 'w,
        source_view: bool,
    ) -> Self {
        Self {
            settings,
            code: CountedSink::new(code),
            header: CountedSink::new(header),
            indentation: 0,
            ids: BTreeMap::new(),
            text_in_header: HashSet::new(),
            text_in_code: HashSet::new(),
            uids_in_code: HashSet::new(),
            class_stack: Vec::new(),
            source_view,
            varused_test: false,
            varused: false,
            checksum: BlockChecksum::new(),
        }
    }

    /// The project settings this pass was created with.
    pub fn settings(&self) -> &ProjectSettings {
        self.settings
    }

    /// Whether large payloads are abbreviated for the source-view pane.
    pub fn source_view_enabled(&self) -> bool {
        self.source_view
    }

    /// Bytes written to the code sink so far.
    pub fn code_position(&self) -> u64 {
        self.code.position()
    }

    /// Bytes written to the header sink so far.
    pub fn header_position(&self) -> u64 {
        self.header.position()
    }

    /// Flush both sinks. Called once at the end of an emit pass.
    pub fn flush(&mut self) -> io::Result<()> {
        self.code.flush()?;
        self.header.flush()
    }

    // ========================================================================
    // Raw byte layer
    // ========================================================================

    /// Append raw bytes to the code sink, folding them into the block
    /// checksum when tagging is enabled.
    pub(crate) fn code_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.settings.write_mergeback_data {
            self.checksum.add(bytes);
        }
        self.code.write_all(bytes)
    }

    /// Append a single byte to the code sink.
    pub(crate) fn code_byte(&mut self, b: u8) -> io::Result<()> {
        self.code_bytes(&[b])
    }

    /// Append raw bytes to the header sink. Header bytes are never part of a
    /// block checksum.
    pub(crate) fn header_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.header.write_all(bytes)
    }

    // ========================================================================
    // Variable-use probe
    // ========================================================================

    /// Enter probe mode: every write is suppressed, and any code write marks
    /// the probed variable as used. Callers pair this with
    /// [`end_variable_probe`](Self::end_variable_probe).
    pub fn begin_variable_probe(&mut self) {
        self.varused_test = true;
        self.varused = false;
    }

    /// Leave probe mode and report whether a code write happened during it.
    pub fn end_variable_probe(&mut self) -> bool {
        self.varused_test = false;
        self.varused
    }

    /// Record a would-be code write while probing. Returns true if the write
    /// must be suppressed.
    pub(crate) fn probing_code_write(&mut self) -> bool {
        if self.varused_test {
            self.varused = true;
            true
        } else {
            false
        }
    }

    /// Whether a probe is active (header writes are silently dropped).
    pub(crate) fn probing(&self) -> bool {
        self.varused_test
    }

    // ========================================================================
    // Formatted writes
    // ========================================================================

    /// Append text to the code sink.
    pub fn write_code(&mut self, text: &str) -> io::Result<()> {
        if self.probing_code_write() {
            return Ok(());
        }
        self.code_bytes(text.as_bytes())
    }

    /// Append formatted text to the code sink.
    pub fn write_code_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        if self.probing_code_write() {
            return Ok(());
        }
        match args.as_str() {
            Some(s) => self.code_bytes(s.as_bytes()),
            None => {
                let s = args.to_string();
                self.code_bytes(s.as_bytes())
            }
        }
    }

    /// Append text to the header sink.
    pub fn write_header(&mut self, text: &str) -> io::Result<()> {
        if self.probing() {
            return Ok(());
        }
        self.header_bytes(text.as_bytes())
    }

    /// Append formatted text to the header sink.
    pub fn write_header_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        if self.probing() {
            return Ok(());
        }
        match args.as_str() {
            Some(s) => self.header_bytes(s.as_bytes()),
            None => {
                let s = args.to_string();
                self.header_bytes(s.as_bytes())
            }
        }
    }

    // ========================================================================
    // Once-sets
    // ========================================================================

    /// Append `line` (plus newline) to the header unless the identical line
    /// was already written there. Returns whether the line was new.
    pub fn write_header_once(&mut self, line: &str) -> io::Result<bool> {
        if self.text_in_header.contains(line) {
            return Ok(false);
        }
        self.header_bytes(line.as_bytes())?;
        self.header_bytes(b"\n")?;
        self.text_in_header.insert(line.to_string());
        Ok(true)
    }

    /// Append `line` (plus newline) to the source unless the identical line
    /// was already written to the source, or to the header. Returns whether
    /// the line was new.
    pub fn write_code_once(&mut self, line: &str) -> io::Result<bool> {
        // a line the header already carries is never repeated in the source
        if self.text_in_header.contains(line) || self.text_in_code.contains(line) {
            return Ok(false);
        }
        self.code_bytes(line.as_bytes())?;
        self.code_bytes(b"\n")?;
        self.text_in_code.insert(line.to_string());
        Ok(true)
    }

    /// Idempotent insert of a node uid into the emitted-definitions set.
    /// Returns true if the uid was already present.
    pub fn code_contains(&mut self, uid: u16) -> bool {
        !self.uids_in_code.insert(uid)
    }

    // ========================================================================
    // Indentation
    // ========================================================================

    /// Raise the indent level for subsequent lines.
    pub fn indent_more(&mut self) {
        self.indentation += 1;
    }

    /// Lower the indent level.
    pub fn indent_less(&mut self) {
        self.indentation -= 1;
    }

    /// The indent string for an explicit level. Two columns per level,
    /// clamped to the 32-space constant.
    pub fn indent_at(&self, level: i32) -> &'static str {
        let cols = level.saturating_mul(2).clamp(0, 32) as usize;
        &INDENT_SPACES[..cols]
    }

    /// The indent string for the current level.
    pub fn indent(&self) -> &'static str {
        self.indent_at(self.indentation)
    }

    /// The indent string for the current level plus a temporary offset.
    pub fn indent_plus(&self, offset: i32) -> &'static str {
        self.indent_at(self.indentation + offset)
    }

    /// Write one or more lines of user code, indenting each of them.
    ///
    /// Blank lines stay blank (no trailing spaces), lines starting with `#`
    /// are preprocessor directives and stay at column 0, everything else is
    /// prefixed with the current indent. The level is raised by
    /// `extra_indent` for the duration of the call only. When the text does
    /// not terminate itself with a newline, `trailing` is appended.
    pub fn emit_indented_block(
        &mut self,
        text: &str,
        extra_indent: i32,
        trailing: Option<char>,
    ) -> io::Result<()> {
        self.indentation += extra_indent;
        let result = self.emit_indented_lines(text, trailing);
        self.indentation -= extra_indent;
        result
    }

    fn emit_indented_lines(&mut self, text: &str, trailing: Option<char>) -> io::Result<()> {
        let mut rest = text;
        loop {
            let (line, tail) = match rest.split_once('\n') {
                Some((line, tail)) => (line, Some(tail)),
                None => (rest, None),
            };
            if line.is_empty() {
                // keep blank lines free of trailing spaces
            } else if line.starts_with('#') {
                self.write_code(line)?;
            } else {
                let ind = self.indent();
                self.write_code_fmt(format_args!("{ind}{line}"))?;
            }
            match tail {
                Some(tail) => {
                    self.write_code("\n")?;
                    rest = tail;
                }
                None => break,
            }
        }
        if !text.ends_with('\n') {
            if let Some(c) = trailing {
                self.write_code_fmt(format_args!("{c}"))?;
            }
        }
        Ok(())
    }

    /// Write the first `n` bytes of `code` as a statement to the source:
    /// `indent` + code, a `;` unless the snippet already ends in `;` or `}`,
    /// an optional trailing comment, and a newline.
    pub fn write_code_statement(
        &mut self,
        indent: &str,
        n: usize,
        code: &str,
        comment: &str,
    ) -> io::Result<()> {
        let snippet = code.get(..n).unwrap_or(code);
        self.write_code_fmt(format_args!("{indent}{snippet}"))?;
        if !matches!(snippet.as_bytes().last(), Some(&b'}') | Some(&b';')) {
            self.write_code(";")?;
        }
        if !comment.is_empty() {
            self.write_code_fmt(format_args!(" {comment}"))?;
        }
        self.write_code("\n")
    }

    /// Header-sink twin of [`write_code_statement`](Self::write_code_statement).
    pub fn write_header_statement(
        &mut self,
        indent: &str,
        n: usize,
        code: &str,
        comment: &str,
    ) -> io::Result<()> {
        let snippet = code.get(..n).unwrap_or(code);
        self.write_header_fmt(format_args!("{indent}{snippet}"))?;
        if !matches!(snippet.as_bytes().last(), Some(&b'}') | Some(&b';')) {
            self.write_header(";")?;
        }
        if !comment.is_empty() {
            self.write_header_fmt(format_args!(" {comment}"))?;
        }
        self.write_header("\n")
    }

    // ========================================================================
    // Class scopes and access specifiers
    // ========================================================================

    /// Enter a class or widget-class scope. Node prologues call this when
    /// they open a class body in the header.
    pub fn begin_class(&mut self, uid: u16) {
        self.class_stack.push(ClassScope {
            uid,
            visibility: None,
        });
    }

    /// Leave the innermost class scope.
    pub fn end_class(&mut self) {
        self.class_stack.pop();
    }

    /// Uid of the innermost open class scope, if any.
    pub fn current_class_uid(&self) -> Option<u16> {
        self.class_stack.last().map(|s| s.uid)
    }

    /// Write `public:` / `private:` / `protected:` to the header if the
    /// innermost class scope is not already in that state. Outside any class
    /// scope this is a no-op.
    pub fn emit_public_state(&mut self, state: Visibility) -> io::Result<()> {
        let transition = match self.class_stack.last_mut() {
            None => None,
            Some(scope) if scope.visibility == Some(state) => None,
            Some(scope) => {
                scope.visibility = Some(state);
                Some(state)
            }
        };
        if let Some(state) = transition {
            self.write_header_fmt(format_args!("{}\n", state.keyword()))?;
        }
        Ok(())
    }

    // ========================================================================
    // Identifier allocator
    // ========================================================================

    /// Return a unique, human-readable identifier for the node `owner`.
    ///
    /// The identifier is composed from `prefix`, an underscore, and the
    /// first identifier run of `name` (or of `fallback` when `name` is
    /// empty), skipping leading non-identifier bytes. If another node
    /// already claimed that identifier, an ascending hexadecimal suffix is
    /// appended until the result is unique. Asking again for the same owner
    /// returns the same string.
    ///
    /// The returned slice is owned by the writer and lives as long as the
    /// emit pass.
    pub fn unique_id(
        &mut self,
        owner: u16,
        prefix: &str,
        name: Option<&str>,
        fallback: Option<&str>,
    ) -> &str {
        let mut base = String::with_capacity(MAX_ID_BASE);
        base.push_str(prefix);
        base.push('_');
        let source = match name {
            Some(n) if !n.is_empty() => Some(n),
            _ => fallback.filter(|f| !f.is_empty()),
        };
        if let Some(text) = source {
            let bytes = text.as_bytes();
            let mut i = 0;
            while i < bytes.len() && !is_ident_byte(bytes[i]) {
                i += 1;
            }
            while i < bytes.len() && is_ident_byte(bytes[i]) && base.len() < MAX_ID_BASE {
                base.push(bytes[i] as char);
                i += 1;
            }
        }
        let base_len = base.len();
        let mut candidate = base;
        let mut which = 0u32;
        loop {
            match self.ids.get(candidate.as_str()) {
                None => {
                    self.ids.insert(candidate.clone(), owner);
                    break;
                }
                Some(&claimed) if claimed == owner => break,
                Some(_) => {
                    which += 1;
                    candidate.truncate(base_len);
                    let _ = write!(candidate, "{which:x}");
                }
            }
        }
        // the loop above guarantees the candidate is present
        self.ids
            .get_key_value(candidate.as_str())
            .map(|(id, _)| id.as_str())
            .unwrap_or_default()
    }

    // ========================================================================
    // Tagger
    // ========================================================================

    /// Close the current block: when tagging is enabled, write one tag line
    /// carrying the block's kind, the node uid, and the checksum of the
    /// bytes since the previous tag. The tag line itself does not contribute
    /// to the next block's checksum; the checksum restarts afterwards either
    /// way.
    pub fn tag(&mut self, kind: TagKind, uid: u16) -> io::Result<()> {
        if self.settings.write_mergeback_data {
            let line = format!(
                "{}{}~{:04x}~{:08x}~~\n",
                TAG_MARKER,
                kind.digit(),
                uid,
                self.checksum.value()
            );
            self.code.write_all(line.as_bytes())?;
        }
        self.checksum.reset();
        Ok(())
    }
}
