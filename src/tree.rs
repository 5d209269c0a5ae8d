//! Design-tree collaborator contract
//!
//! The emission core does not own a node model. The host application keeps
//! the design tree (windows, widgets, code blocks, comments) and hands it to
//! [`emit_files`](crate::emit::emit_files) and
//! [`merge_back`](crate::mergeback::merge_back) through the traits in this
//! module.
//!
//! The tree is presented as a flattened preorder list: `depth` encodes
//! nesting, and a node's children are exactly the following entries whose
//! depth is strictly greater than its own. This keeps the walker free of
//! parent/child pointers and matches how hosts store their node lists.

use std::io;

use crate::emit::CodeWriter;

/// Classification of a design node.
///
/// The core only needs to distinguish a handful of kinds; hosts are free to
/// carry richer taxonomies behind [`DesignNode::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Freestanding comment. The first and last comments of a tree get
    /// special placement (copyright header, trailing remark).
    Comment,
    /// Free function or method.
    Function,
    /// Verbatim code block owned by the designer.
    Code,
    /// Declared C++ class.
    Class,
    /// Concrete widget instance.
    Widget,
    /// Entry of a menu widget.
    MenuItem,
}

/// Member visibility inside an emitted class body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Private,
    Public,
    Protected,
}

impl Visibility {
    /// The C++ access-specifier line for this state, without a newline.
    pub fn keyword(self) -> &'static str {
        match self {
            Visibility::Private => "private:",
            Visibility::Public => "public:",
            Visibility::Protected => "protected:",
        }
    }
}

/// Byte ranges of the text a node produced in one sink.
///
/// Filled in by the tree walker when emitting in source-view mode, so an
/// external viewer can map design nodes to generated text. All offsets are
/// byte positions from the start of the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkOffsets {
    pub prologue_start: u64,
    pub prologue_end: u64,
    pub epilogue_start: u64,
    pub epilogue_end: u64,
    pub static_start: u64,
    pub static_end: u64,
}

/// Source-view offsets for both output sinks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceOffsets {
    pub code: SinkOffsets,
    pub header: SinkOffsets,
}

/// One node of the design tree, as seen by the emission core.
///
/// The three emit hooks are where the host renders its node-specific text.
/// The core drives them in a fixed order (see the tree walker) and interposes
/// on every byte for indentation, de-duplication and block checksums.
pub trait DesignNode {
    /// Nesting depth in the flattened tree. Top-level nodes have depth 0.
    fn depth(&self) -> usize;

    /// Session-stable 16-bit identifier, unique within the tree.
    fn uid(&self) -> u16;

    /// Node classification.
    fn kind(&self) -> NodeKind;

    /// Whether this node is a widget or menu item.
    fn is_widget(&self) -> bool {
        matches!(self.kind(), NodeKind::Widget | NodeKind::MenuItem)
    }

    /// Whether this node opens a class scope in the header.
    fn is_class(&self) -> bool {
        self.kind() == NodeKind::Class
    }

    /// Whether this node is an actual widget instance (not a menu entry).
    fn is_true_widget(&self) -> bool {
        self.kind() == NodeKind::Widget
    }

    /// Emit the text that precedes this node's children.
    fn emit_prologue(&self, w: &mut CodeWriter<'_>) -> io::Result<()>;

    /// Emit the text that follows this node's children.
    fn emit_epilogue(&self, w: &mut CodeWriter<'_>) -> io::Result<()>;

    /// Emit static data (images, include-once declarations) for this node.
    fn emit_static(&self, w: &mut CodeWriter<'_>) -> io::Result<()>;

    /// Replace the stored code body. Only meaningful for [`NodeKind::Code`]
    /// nodes; the merge-back parser calls this when folding an edit back.
    fn set_body(&mut self, text: &str);

    /// Replace the stored callback text. Only meaningful for widget nodes.
    fn set_callback(&mut self, text: &str);

    /// User-visible label, if any. Consumed by the strings export.
    fn label(&self) -> Option<&str> {
        None
    }

    /// Tooltip text, if any. Consumed by the strings export.
    fn tooltip(&self) -> Option<&str> {
        None
    }

    /// Source-view offsets recorded by the walker.
    fn offsets(&self) -> &SourceOffsets;

    /// Mutable access for the walker to record offsets.
    fn offsets_mut(&mut self) -> &mut SourceOffsets;
}

/// The design tree handed to the emission core.
///
/// Nodes are stored in preorder; `depth` defines the structure. Mutable
/// access is needed in two places only: offset recording in source-view mode
/// and merge-back edits.
pub trait DesignTree {
    /// Number of nodes in the flattened tree.
    fn len(&self) -> usize;

    /// Whether the tree has no nodes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The node at `index` in preorder.
    fn node(&self, index: usize) -> &dyn DesignNode;

    /// Mutable node access.
    fn node_mut(&mut self, index: usize) -> &mut dyn DesignNode;

    /// Find the preorder index of the node carrying `uid`.
    fn position_of_uid(&self, uid: u16) -> Option<usize> {
        (0..self.len()).find(|&i| self.node(i).uid() == uid)
    }
}

/// Return true if `b` can appear in a C identifier.
///
/// Deliberately byte-based so the result is not affected by locale settings.
pub fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
