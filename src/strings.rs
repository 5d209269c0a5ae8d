//! Strings export for translation
//!
//! Walks the design tree and dumps every widget label and tooltip into a
//! text file, in a format matching the project's i18n flavor:
//!
//! - plain text, one string per line (no i18n),
//! - gettext `.po` with one `msgid`/`msgstr` pair per string,
//! - catgets `.msg` with `$set`, `$quote` and numbered entries.
//!
//! Bytes outside printable ASCII and the quote character are escaped as
//! three-digit octal, so the file survives any catalog tooling.

use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::emit::EmitError;
use crate::project::{I18nFlavor, ProjectSettings};
use crate::tree::DesignTree;
use crate::version::QUIPU_VERSION;

/// Write all label and tooltip strings of `tree` to `path`, in the format
/// selected by the project's i18n flavor.
#[tracing::instrument(skip_all, fields(path = ?path))]
pub fn write_strings(
    tree: &dyn DesignTree,
    settings: &ProjectSettings,
    path: &Path,
) -> Result<(), EmitError> {
    let file = File::create(path).map_err(|source| EmitError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(file);
    write_strings_to(tree, settings, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Sink-generic form of [`write_strings`], used by the tests and by hosts
/// that export somewhere other than a file.
pub fn write_strings_to(
    tree: &dyn DesignTree,
    settings: &ProjectSettings,
    out: &mut impl Write,
) -> io::Result<()> {
    match &settings.i18n {
        I18nFlavor::None => {
            writeln!(
                out,
                "# generated by the Quipu user interface designer (quipu) version {QUIPU_VERSION}"
            )?;
            for_each_string(tree, |s| {
                escape_msg(out, s)?;
                out.write_all(b"\n")
            })
        }
        I18nFlavor::Gettext(_) => {
            writeln!(
                out,
                "# generated by the Quipu user interface designer (quipu) version {QUIPU_VERSION}"
            )?;
            for_each_string(tree, |s| {
                out.write_all(b"msgid \"")?;
                escape_msg(out, s)?;
                out.write_all(b"\"\n")?;
                out.write_all(b"msgstr \"")?;
                escape_msg(out, s)?;
                out.write_all(b"\"\n")
            })
        }
        I18nFlavor::Catgets(c) => {
            writeln!(
                out,
                "$ generated by the Quipu user interface designer (quipu) version {QUIPU_VERSION}"
            )?;
            writeln!(out, "$set {}", c.set_number)?;
            writeln!(out, "$quote \"")?;
            let mut number = 1;
            for_each_string(tree, |s| {
                write!(out, "{number} \"")?;
                number += 1;
                escape_msg(out, s)?;
                out.write_all(b"\"\n")
            })
        }
    }
}

/// Visit every widget label and tooltip in tree order.
fn for_each_string(
    tree: &dyn DesignTree,
    mut visit: impl FnMut(&str) -> io::Result<()>,
) -> io::Result<()> {
    for i in 0..tree.len() {
        let node = tree.node(i);
        if !node.is_widget() {
            continue;
        }
        if let Some(label) = node.label() {
            visit(label)?;
        }
        if let Some(tooltip) = node.tooltip() {
            visit(tooltip)?;
        }
    }
    Ok(())
}

/// Escape a catalog string: printable ASCII except `"` passes through,
/// everything else becomes `\NNN` octal.
fn escape_msg(out: &mut impl Write, s: &str) -> io::Result<()> {
    for &b in s.as_bytes() {
        if !(0x20..=0x7e).contains(&b) || b == b'"' {
            write!(out, "\\{b:03o}")?;
        } else {
            out.write_all(&[b])?;
        }
    }
    Ok(())
}
