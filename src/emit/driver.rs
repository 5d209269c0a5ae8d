//! Tree walker and top-level emit driver
//!
//! [`emit_files`] is the entry point of an emission pass: it opens the two
//! sinks, writes the fixed prelude (copyright comment, version banner,
//! header guard, includes, i18n preamble), then walks the design tree
//! depth-first, invoking each node's emit hooks.
//!
//! The walk is deterministic: declaration order, children between the two
//! halves of their parent, with one special case: widget classes emit all
//! non-function children first, then their epilogue, then the function
//! children, so methods land inside the class body after the constructor.

use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::emit::writer::CodeWriter;
use crate::project::{I18nFlavor, ProjectSettings};
use crate::tree::{DesignTree, NodeKind};
use crate::version::QUIPU_VERSION;

/// Errors surfaced by an emission pass.
#[derive(Debug, Error)]
pub enum EmitError {
    /// A sink could not be opened. If the source file opened first, it is
    /// closed (and left behind) before this is returned.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing or closing a sink failed.
    #[error("I/O error while writing generated code: {0}")]
    Io(#[from] io::Error),
}

/// Write the source and header files for the design `tree`.
///
/// A `None` path selects standard output for that stream. Existing files
/// are overwritten. In source-view mode, large payloads are abbreviated and
/// per-node byte offsets are recorded into the tree, so `tree` is borrowed
/// mutably for the duration of the pass.
#[tracing::instrument(skip_all, fields(source = ?source_path, header = ?header_path, source_view))]
pub fn emit_files(
    tree: &mut dyn DesignTree,
    settings: &ProjectSettings,
    source_path: Option<&Path>,
    header_path: Option<&Path>,
    source_view: bool,
) -> Result<(), EmitError> {
    let code_sink = open_sink(source_path)?;
    let header_sink = open_sink(header_path)?;
    let header_name = match header_path.and_then(|p| p.file_name()) {
        Some(name) => name.to_string_lossy().into_owned(),
        None => settings.header_file_name.clone(),
    };
    let include_header = header_path.is_some() && settings.include_header_from_source;
    let mut writer = CodeWriter::new(settings, code_sink, header_sink, source_view);
    emit_pass(&mut writer, tree, &header_name, include_header)?;
    writer.flush()?;
    tracing::debug!(
        code_bytes = writer.code_position(),
        header_bytes = writer.header_position(),
        "emission complete"
    );
    Ok(())
}

/// Emit into caller-provided sinks instead of files.
///
/// This is the testing and preview entry: `header_name` stands in for the
/// header file's basename when deriving the include guard.
pub fn emit_into<'w>(
    tree: &mut dyn DesignTree,
    settings: &'w ProjectSettings,
    code: impl Write + 'w,
    header: impl Write + 'w,
    source_view: bool,
    header_name: &str,
) -> Result<(), EmitError> {
    let mut writer = CodeWriter::new(settings, code, header, source_view);
    emit_pass(&mut writer, tree, header_name, settings.include_header_from_source)?;
    writer.flush()?;
    Ok(())
}

fn open_sink(path: Option<&Path>) -> Result<Box<dyn Write>, EmitError> {
    match path {
        Some(path) => {
            let file = File::create(path).map_err(|source| EmitError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

/// Derive the include-guard symbol from the header file's basename:
/// non-alphanumeric characters become `_`, and a leading non-alphabetic
/// character gets an extra `_` prefix.
fn header_guard(header_name: &str) -> String {
    let mut guard = String::with_capacity(header_name.len() + 1);
    if !header_name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        guard.push('_');
    }
    for c in header_name.chars() {
        guard.push(if c.is_ascii_alphanumeric() { c } else { '_' });
    }
    guard
}

fn emit_pass(
    w: &mut CodeWriter<'_>,
    tree: &mut dyn DesignTree,
    header_name: &str,
    include_header: bool,
) -> io::Result<()> {
    // A leading comment is usually the copyright notice; it goes out before
    // anything else in both files.
    let mut first = 0;
    if !tree.is_empty() && tree.node(0).kind() == NodeKind::Comment {
        if w.source_view_enabled() {
            let c = w.code_position();
            let h = w.header_position();
            let o = tree.node_mut(0).offsets_mut();
            o.code.prologue_start = c;
            o.code.epilogue_start = c;
            o.header.prologue_start = h;
            o.header.epilogue_start = h;
        }
        // comments have no children, a flat prologue call is enough
        tree.node(0).emit_prologue(w)?;
        if w.source_view_enabled() {
            let c = w.code_position();
            let h = w.header_position();
            let o = tree.node_mut(0).offsets_mut();
            o.code.prologue_end = c;
            o.code.epilogue_end = c;
            o.header.prologue_end = h;
            o.header.epilogue_end = h;
        }
        first = 1;
    }

    let banner = format!(
        "// generated by the Quipu user interface designer (quipu) version {QUIPU_VERSION}\n\n"
    );
    w.write_header(&banner)?;
    w.write_code(&banner)?;

    let guard = header_guard(header_name);
    w.write_header_fmt(format_args!("#ifndef {guard}\n"))?;
    w.write_header_fmt(format_args!("#define {guard}\n"))?;

    if !w.settings().avoid_early_includes {
        let include = format!("#include {}", w.settings().toolkit_include);
        w.write_header_once(&include)?;
    }
    if include_header {
        if w.source_view_enabled() {
            w.write_code("#include \"SourceView.h\"\n")?;
        } else {
            let configured = w.settings().header_file_name.clone();
            if configured.starts_with('.') && !configured.contains('/') {
                w.write_code_fmt(format_args!("#include \"{header_name}\"\n"))?;
            } else {
                w.write_code_fmt(format_args!("#include \"{configured}\"\n"))?;
            }
        }
    }

    emit_i18n_preamble(w)?;

    let mut index = first;
    while index < tree.len() {
        emit_statics(w, tree, index)?;
        index = emit_subtree(w, tree, index)?;
    }

    w.write_header("#endif\n")?;

    // a trailing comment was deferred by the walker; it closes the source
    let last = tree.len().wrapping_sub(1);
    if !tree.is_empty() && last >= first && tree.node(last).kind() == NodeKind::Comment {
        if w.source_view_enabled() {
            let c = w.code_position();
            let h = w.header_position();
            let o = tree.node_mut(last).offsets_mut();
            o.code.prologue_start = c;
            o.code.epilogue_start = c;
            o.header.prologue_start = h;
            o.header.epilogue_start = h;
        }
        tree.node(last).emit_prologue(w)?;
        if w.source_view_enabled() {
            let c = w.code_position();
            let h = w.header_position();
            let o = tree.node_mut(last).offsets_mut();
            o.code.prologue_end = c;
            o.code.epilogue_end = c;
            o.header.prologue_end = h;
            o.header.epilogue_end = h;
        }
    }
    Ok(())
}

/// Emit the translation-function preamble selected by the project settings.
fn emit_i18n_preamble(w: &mut CodeWriter<'_>) -> io::Result<()> {
    let flavor = w.settings().i18n.clone();
    match flavor {
        I18nFlavor::None => Ok(()),
        I18nFlavor::Gettext(g) => {
            if g.include.is_empty() {
                return Ok(());
            }
            let (include, conditional, function, static_function) =
                (g.include, g.conditional, g.function, g.static_function);
            let wrapped = !conditional.is_empty();
            if wrapped {
                w.write_code_fmt(format_args!("#ifdef {conditional}\n"))?;
                w.indent_more();
            }
            emit_i18n_include(w, &include)?;
            if wrapped {
                w.write_code("#else\n")?;
                if !function.is_empty() {
                    let ind = w.indent();
                    w.write_code_fmt(format_args!("#{ind}ifndef {function}\n"))?;
                    let ind1 = w.indent_plus(1);
                    w.write_code_fmt(format_args!("#{ind1}define {function}(text) text\n"))?;
                    let ind = w.indent();
                    w.write_code_fmt(format_args!("#{ind}endif\n"))?;
                }
                w.indent_less();
                w.write_code("#endif\n")?;
            }
            if !static_function.is_empty() {
                w.write_code_fmt(format_args!("#ifndef {static_function}\n"))?;
                let ind1 = w.indent_plus(1);
                w.write_code_fmt(format_args!(
                    "#{ind1}define {static_function}(text) text\n"
                ))?;
                w.write_code("#endif\n")?;
            }
            Ok(())
        }
        I18nFlavor::Catgets(c) => {
            if c.include.is_empty() {
                return Ok(());
            }
            let (include, conditional, catalog) = (c.include, c.conditional, c.catalog_file);
            let wrapped = !conditional.is_empty();
            if wrapped {
                w.write_code_fmt(format_args!("#ifdef {conditional}\n"))?;
                w.indent_more();
            }
            emit_i18n_include(w, &include)?;
            if !catalog.is_empty() {
                w.write_code_fmt(format_args!("extern nl_catd {catalog};\n"))?;
            } else {
                w.write_code("// Initialize I18N stuff now for menus...\n")?;
                let ind = w.indent();
                w.write_code_fmt(format_args!("#{ind}include <locale.h>\n"))?;
                w.write_code("static char *_locale = setlocale(LC_MESSAGES, \"\");\n")?;
                let catalog_name = w.settings().basename().to_string();
                w.write_code_fmt(format_args!(
                    "static nl_catd _catalog = catopen(\"{catalog_name}\", 0);\n"
                ))?;
            }
            if wrapped {
                w.write_code("#else\n")?;
                let ind = w.indent();
                w.write_code_fmt(format_args!("#{ind}ifndef catgets\n"))?;
                let ind1 = w.indent_plus(1);
                w.write_code_fmt(format_args!(
                    "#{ind1}define catgets(catalog, set, msgid, text) text\n"
                ))?;
                let ind = w.indent();
                w.write_code_fmt(format_args!("#{ind}endif\n"))?;
                w.indent_less();
                w.write_code("#endif\n")?;
            }
            Ok(())
        }
    }
}

/// Emit `#include` for an i18n header, quoting bare names.
fn emit_i18n_include(w: &mut CodeWriter<'_>, include: &str) -> io::Result<()> {
    let ind = w.indent();
    if include.starts_with('<') || include.starts_with('"') {
        w.write_code_fmt(format_args!("#{ind}include {include}\n"))
    } else {
        w.write_code_fmt(format_args!("#{ind}include \"{include}\"\n"))
    }
}

/// Emit static data for the node at `index` and every one of its
/// descendants, recording source-view offsets per node.
fn emit_statics(
    w: &mut CodeWriter<'_>,
    tree: &mut dyn DesignTree,
    index: usize,
) -> io::Result<()> {
    let depth = tree.node(index).depth();
    emit_one_static(w, tree, index)?;
    let mut q = index + 1;
    while q < tree.len() && tree.node(q).depth() > depth {
        emit_one_static(w, tree, q)?;
        q += 1;
    }
    Ok(())
}

fn emit_one_static(
    w: &mut CodeWriter<'_>,
    tree: &mut dyn DesignTree,
    index: usize,
) -> io::Result<()> {
    if w.source_view_enabled() {
        let c = w.code_position();
        let h = w.header_position();
        let o = tree.node_mut(index).offsets_mut();
        o.code.static_start = c;
        o.header.static_start = h;
    }
    tree.node(index).emit_static(w)?;
    if w.source_view_enabled() {
        let c = w.code_position();
        let h = w.header_position();
        let o = tree.node_mut(index).offsets_mut();
        o.code.static_end = c;
        o.header.static_end = h;
    }
    Ok(())
}

/// Recursively emit the subtree rooted at `index`, putting children between
/// the prologue and the epilogue of their parent. Returns the index of the
/// first node past the subtree.
fn emit_subtree(
    w: &mut CodeWriter<'_>,
    tree: &mut dyn DesignTree,
    index: usize,
) -> io::Result<usize> {
    let depth = tree.node(index).depth();
    let last = tree.len() - 1;

    // the last comment carries the user's closing remark; the driver emits
    // it at the very end of the source file instead
    let deferred_comment = index == last && tree.node(index).kind() == NodeKind::Comment;
    if !deferred_comment {
        if w.source_view_enabled() {
            let c = w.code_position();
            let h = w.header_position();
            let o = tree.node_mut(index).offsets_mut();
            o.code.prologue_start = c;
            o.header.prologue_start = h;
        }
        tree.node(index).emit_prologue(w)?;
        if w.source_view_enabled() {
            let c = w.code_position();
            let h = w.header_position();
            let o = tree.node_mut(index).offsets_mut();
            o.code.prologue_end = c;
            o.header.prologue_end = h;
        }
    }

    let widget_class = tree.node(index).is_widget() && tree.node(index).is_class();
    let next = if widget_class {
        // pass 1: everything that is not a method goes into the class body
        let mut q = index + 1;
        while q < tree.len() && tree.node(q).depth() > depth {
            if tree.node(q).kind() != NodeKind::Function {
                q = emit_subtree(w, tree, q)?;
            } else {
                q = skip_subtree(tree, q);
            }
        }

        emit_epilogue(w, tree, index)?;

        // pass 2: methods, now that the constructor body is closed
        let mut f = index + 1;
        while f < tree.len() && tree.node(f).depth() > depth {
            if tree.node(f).kind() == NodeKind::Function {
                f = emit_subtree(w, tree, f)?;
            } else {
                f = skip_subtree(tree, f);
            }
        }

        w.write_header("};\n")?;
        w.end_class();
        q
    } else {
        let mut q = index + 1;
        while q < tree.len() && tree.node(q).depth() > depth {
            q = emit_subtree(w, tree, q)?;
        }
        emit_epilogue(w, tree, index)?;
        q
    };
    Ok(next)
}

fn emit_epilogue(
    w: &mut CodeWriter<'_>,
    tree: &mut dyn DesignTree,
    index: usize,
) -> io::Result<()> {
    if w.source_view_enabled() {
        let c = w.code_position();
        let h = w.header_position();
        let o = tree.node_mut(index).offsets_mut();
        o.code.epilogue_start = c;
        o.header.epilogue_start = h;
    }
    tree.node(index).emit_epilogue(w)?;
    if w.source_view_enabled() {
        let c = w.code_position();
        let h = w.header_position();
        let o = tree.node_mut(index).offsets_mut();
        o.code.epilogue_end = c;
        o.header.epilogue_end = h;
    }
    Ok(())
}

/// Advance past the subtree rooted at `index` without emitting anything.
fn skip_subtree(tree: &dyn DesignTree, index: usize) -> usize {
    let depth = tree.node(index).depth();
    let mut q = index + 1;
    while q < tree.len() && tree.node(q).depth() > depth {
        q += 1;
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_guard_plain_name() {
        assert_eq!(header_guard("browser.h"), "browser_h");
    }

    #[test]
    fn test_header_guard_replaces_non_alnum() {
        assert_eq!(header_guard("My View.h"), "My_View_h");
    }

    #[test]
    fn test_header_guard_prefixes_non_alpha_start() {
        assert_eq!(header_guard("1panel.h"), "_1panel_h");
        assert_eq!(header_guard(".h"), "__h");
    }
}
