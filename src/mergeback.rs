//! Merge-back of hand-edited generated code
//!
//! Reads a source file previously produced by [`emit_files`] with tagging
//! enabled, recomputes every block's checksum under the shared
//! normalization rule, and compares it with the checksum stored in the tag
//! line that closes the block. A mismatch means a human edited the block.
//!
//! Edits to code blocks and callbacks can be folded back into the design
//! tree; their tag carries the uid of the owning node. Edits to structural
//! blocks cannot be merged and are only reported.
//!
//! The core stays dialog-free: the interactive task takes a caller-supplied
//! prompt that inspects the classification counters and decides whether to
//! apply.
//!
//! [`emit_files`]: crate::emit::emit_files

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

use crate::emit::{BlockChecksum, TagKind, TAG_MARKER};
use crate::project::ProjectSettings;
use crate::tree::{DesignTree, NodeKind};

/// Errors surfaced by a merge-back pass.
#[derive(Debug, Error)]
pub enum MergeBackError {
    /// A tag line did not match the wire format `//~fl~<kind>~<uid>~<crc>~~`
    /// exactly, or carried an out-of-range kind. The scan is abandoned.
    #[error("malformed merge tag in line {line}")]
    MalformedTag { line: usize },

    /// The source file could not be read.
    #[error("I/O error while reading generated code: {0}")]
    Io(#[from] io::Error),
}

/// Classification counters from one scan of the source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Divergent blocks of structural kind; these cannot be merged.
    pub changed_structure: usize,
    /// Divergent designer-owned code blocks.
    pub changed_code: usize,
    /// Divergent menu or widget callbacks.
    pub changed_callbacks: usize,
    /// Divergent mergeable blocks whose uid matches no node in the tree.
    pub uid_not_found: usize,
}

impl MergeReport {
    /// Bitmask form of the counters: bit 0 structural, bit 1 code, bit 2
    /// callbacks, bit 3 unknown uid.
    pub fn divergence_mask(&self) -> u8 {
        let mut mask = 0;
        if self.changed_structure > 0 {
            mask |= 1;
        }
        if self.changed_code > 0 {
            mask |= 2;
        }
        if self.changed_callbacks > 0 {
            mask |= 4;
        }
        if self.uid_not_found > 0 {
            mask |= 8;
        }
        mask
    }

    /// Whether the file matches the design tree exactly.
    pub fn is_clean(&self) -> bool {
        self.divergence_mask() == 0
    }

    /// Whether any divergence can actually be folded back.
    pub fn has_mergeable_changes(&self) -> bool {
        self.changed_code > 0 || self.changed_callbacks > 0
    }
}

/// What a merge-back call should do.
pub enum MergeTask<'a> {
    /// Classify only; never mutate the tree.
    Check,
    /// Classify, then let the prompt decide whether to apply. The prompt
    /// receives the counters and returns true to merge.
    Interactive(&'a mut dyn FnMut(&MergeReport) -> bool),
    /// Apply all safe edits regardless of conflicts.
    Go,
    /// Apply only if there is no structural divergence.
    GoSafe,
}

impl MergeTask<'_> {
    fn label(&self) -> &'static str {
        match self {
            MergeTask::Check => "check",
            MergeTask::Interactive(_) => "interactive",
            MergeTask::Go => "go",
            MergeTask::GoSafe => "go_safe",
        }
    }
}

impl fmt::Debug for MergeTask<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of a merge-back call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing diverged (or tagging is disabled); the tree was not touched.
    Unchanged,
    /// At least one edit was folded back into the tree.
    Applied,
    /// Conflicts prevented applying; the tree was not touched.
    Blocked(MergeReport),
    /// Classification result of a check-only call.
    Checked(MergeReport),
}

/// Merge external changes in a generated source file back into the tree.
///
/// The caller must make sure `path` was generated from the currently loaded
/// design tree. When the project has merge-back tagging disabled this is a
/// no-op returning [`MergeOutcome::Unchanged`].
#[tracing::instrument(skip_all, fields(path = ?path, task = task.label()))]
pub fn merge_back(
    tree: &mut dyn DesignTree,
    settings: &ProjectSettings,
    path: &Path,
    task: MergeTask<'_>,
) -> Result<MergeOutcome, MergeBackError> {
    if !settings.write_mergeback_data {
        return Ok(MergeOutcome::Unchanged);
    }
    let data = fs::read(path)?;
    match task {
        MergeTask::Check => {
            let scan = scan(&data, tree, Pass::Classify)?;
            Ok(MergeOutcome::Checked(scan.report))
        }
        MergeTask::Go => {
            let scan = scan(&data, tree, Pass::Apply)?;
            Ok(if scan.changed {
                MergeOutcome::Applied
            } else {
                MergeOutcome::Unchanged
            })
        }
        MergeTask::GoSafe => {
            let first = scan(&data, tree, Pass::Classify)?;
            if first.report.changed_structure > 0 {
                return Ok(MergeOutcome::Blocked(first.report));
            }
            if !first.report.has_mergeable_changes() {
                return Ok(MergeOutcome::Unchanged);
            }
            let second = scan(&data, tree, Pass::Apply)?;
            Ok(if second.changed {
                MergeOutcome::Applied
            } else {
                MergeOutcome::Unchanged
            })
        }
        MergeTask::Interactive(prompt) => {
            let first = scan(&data, tree, Pass::Classify)?;
            if first.report.is_clean() {
                return Ok(MergeOutcome::Unchanged);
            }
            if !first.report.has_mergeable_changes() {
                // structural-only divergence, nothing a merge could save
                return Ok(MergeOutcome::Blocked(first.report));
            }
            if !prompt(&first.report) {
                return Ok(MergeOutcome::Blocked(first.report));
            }
            let second = scan(&data, tree, Pass::Apply)?;
            Ok(if second.changed {
                MergeOutcome::Applied
            } else {
                MergeOutcome::Unchanged
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Classify,
    Apply,
}

struct ScanOutcome {
    report: MergeReport,
    changed: bool,
}

fn scan(
    data: &[u8],
    tree: &mut dyn DesignTree,
    pass: Pass,
) -> Result<ScanOutcome, MergeBackError> {
    let mut checksum = BlockChecksum::new();
    let mut report = MergeReport::default();
    let mut changed = false;
    let mut block_start = 0usize;
    let mut block_end = 0usize;
    let mut pos = 0usize;
    let mut line_no = 0usize;

    while pos < data.len() {
        line_no += 1;
        let next = match data[pos..].iter().position(|&b| b == b'\n') {
            Some(i) => pos + i + 1,
            None => data.len(),
        };
        let line = &data[pos..next];
        match find_tag(line) {
            None => {
                checksum.add(line);
                block_end = next;
            }
            Some(tag_text) => {
                let (kind, uid, crc) =
                    parse_tag(tag_text).ok_or(MergeBackError::MalformedTag { line: line_no })?;
                if checksum.value() != crc {
                    tracing::debug!(?kind, uid, line = line_no, "divergent block");
                    let block = &data[block_start..block_end];
                    handle_divergence(tree, pass, kind, uid, block, &mut report, &mut changed);
                }
                checksum.reset();
                block_start = next;
                block_end = next;
            }
        }
        pos = next;
    }
    Ok(ScanOutcome { report, changed })
}

fn handle_divergence(
    tree: &mut dyn DesignTree,
    pass: Pass,
    kind: TagKind,
    uid: u16,
    block: &[u8],
    report: &mut MergeReport,
    changed: &mut bool,
) {
    match pass {
        Pass::Apply => match kind {
            TagKind::Code => {
                if let Some(i) = tree.position_of_uid(uid) {
                    if tree.node(i).kind() == NodeKind::Code {
                        let text = unindent(block);
                        tree.node_mut(i).set_body(&text);
                        *changed = true;
                    }
                }
            }
            TagKind::MenuCallback | TagKind::WidgetCallback => {
                if let Some(i) = tree.position_of_uid(uid) {
                    if tree.node(i).is_true_widget() {
                        let text = unindent(block);
                        tree.node_mut(i).set_callback(&text);
                        *changed = true;
                    }
                }
            }
            // structural edits are not mergeable
            TagKind::Generic => {}
        },
        Pass::Classify => {
            let find_node = match kind {
                TagKind::Generic => {
                    report.changed_structure += 1;
                    false
                }
                TagKind::Code => {
                    report.changed_code += 1;
                    true
                }
                TagKind::MenuCallback | TagKind::WidgetCallback => {
                    report.changed_callbacks += 1;
                    true
                }
            };
            if find_node && tree.position_of_uid(uid).is_none() {
                report.uid_not_found += 1;
            }
        }
    }
}

/// Locate the tag marker inside a line, returning the tag text from the
/// marker onwards.
fn find_tag(line: &[u8]) -> Option<&[u8]> {
    let marker = TAG_MARKER.as_bytes();
    line.windows(marker.len())
        .position(|window| window == marker)
        .map(|i| &line[i..])
}

/// Parse a tag strictly: `//~fl~<kind>~<uid4>~<crc8>~~`. Field widths and
/// separators must match exactly; the kind must be a known digit.
fn parse_tag(tag: &[u8]) -> Option<(TagKind, u16, u32)> {
    let rest = tag.strip_prefix(TAG_MARKER.as_bytes())?;
    let tilde = rest.iter().position(|&b| b == b'~')?;
    if tilde == 0 || !rest[..tilde].iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let kind_text = std::str::from_utf8(&rest[..tilde]).ok()?;
    let kind = TagKind::from_digit(kind_text.parse().ok()?)?;
    let rest = &rest[tilde + 1..];
    if rest.len() < 15 {
        return None;
    }
    if !rest[..4].iter().all(|b| b.is_ascii_hexdigit()) || rest[4] != b'~' {
        return None;
    }
    if !rest[5..13].iter().all(|b| b.is_ascii_hexdigit()) || &rest[13..15] != b"~~" {
        return None;
    }
    let uid_text = std::str::from_utf8(&rest[..4]).ok()?;
    let crc_text = std::str::from_utf8(&rest[5..13]).ok()?;
    let uid = u16::from_str_radix(uid_text, 16).ok()?;
    let crc = u32::from_str_radix(crc_text, 16).ok()?;
    Some((kind, uid, crc))
}

/// Remove up to two leading whitespace bytes from every line of `block` and
/// drop carriage returns, yielding the text as it belongs in the tree.
///
/// The whitespace class is the same one [`BlockChecksum`] normalizes over;
/// a blank line's newline counts as leading whitespace, so blank lines
/// inside a merged block are consumed.
fn unindent(block: &[u8]) -> String {
    let mut out = Vec::with_capacity(block.len());
    for line in block.split_inclusive(|&b| b == b'\n') {
        let mut rest = line;
        let mut dropped = 0;
        while dropped < 2 && rest.first().is_some_and(|b| b.is_ascii_whitespace()) {
            rest = &rest[1..];
            dropped += 1;
        }
        out.extend(rest.iter().copied().filter(|&b| b != b'\r'));
    }
    String::from_utf8_lossy(&out).into_owned()
}
