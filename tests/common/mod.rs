//! Shared mock design tree for integration tests
//!
//! Implements the core's collaborator contract with a small node model that
//! emits realistic C++, exercising the writer the way a host application
//! would: once-includes, unique callback identifiers, indented code blocks,
//! string escaping, and block tags.

// not every test binary uses every helper
#![allow(dead_code)]

use std::io;

use quipu::emit::CodeWriter;
use quipu::tree::{DesignNode, DesignTree, NodeKind, SourceOffsets, Visibility};
use quipu::TagKind;

/// Payload of one mock node.
#[derive(Debug, Clone)]
pub enum NodePayload {
    Comment {
        text: String,
        in_header: bool,
    },
    Function {
        name: String,
    },
    Code {
        body: String,
    },
    Widget {
        name: String,
        label: String,
        callback: Option<String>,
    },
    MenuItem {
        name: String,
        label: String,
        callback: Option<String>,
    },
    WidgetClass {
        name: String,
    },
}

#[derive(Debug, Clone)]
pub struct MockNode {
    pub depth: usize,
    pub uid: u16,
    pub payload: NodePayload,
    pub offsets: SourceOffsets,
}

impl MockNode {
    pub fn new(depth: usize, uid: u16, payload: NodePayload) -> Self {
        Self {
            depth,
            uid,
            payload,
            offsets: SourceOffsets::default(),
        }
    }

    /// Stored code body, for merge-back assertions.
    pub fn body(&self) -> Option<&str> {
        match &self.payload {
            NodePayload::Code { body } => Some(body),
            _ => None,
        }
    }

    /// Stored callback text, for merge-back assertions.
    pub fn callback(&self) -> Option<&str> {
        match &self.payload {
            NodePayload::Widget { callback, .. } | NodePayload::MenuItem { callback, .. } => {
                callback.as_deref()
            }
            _ => None,
        }
    }
}

impl DesignNode for MockNode {
    fn depth(&self) -> usize {
        self.depth
    }

    fn uid(&self) -> u16 {
        self.uid
    }

    fn kind(&self) -> NodeKind {
        match &self.payload {
            NodePayload::Comment { .. } => NodeKind::Comment,
            NodePayload::Function { .. } => NodeKind::Function,
            NodePayload::Code { .. } => NodeKind::Code,
            NodePayload::Widget { .. } => NodeKind::Widget,
            NodePayload::MenuItem { .. } => NodeKind::MenuItem,
            NodePayload::WidgetClass { .. } => NodeKind::Class,
        }
    }

    fn is_widget(&self) -> bool {
        matches!(
            self.payload,
            NodePayload::Widget { .. } | NodePayload::MenuItem { .. } | NodePayload::WidgetClass { .. }
        )
    }

    fn is_class(&self) -> bool {
        matches!(self.payload, NodePayload::WidgetClass { .. })
    }

    fn is_true_widget(&self) -> bool {
        matches!(self.payload, NodePayload::Widget { .. })
    }

    fn emit_prologue(&self, w: &mut CodeWriter<'_>) -> io::Result<()> {
        match &self.payload {
            NodePayload::Comment { text, in_header } => {
                w.write_code_fmt(format_args!("// {text}\n"))?;
                if *in_header {
                    w.write_header_fmt(format_args!("// {text}\n"))?;
                }
            }
            NodePayload::Function { name } => {
                w.emit_public_state(Visibility::Public)?;
                w.write_header_fmt(format_args!("{}void {name}();\n", w.indent_at(1)))?;
                w.write_code_fmt(format_args!("void {name}() {{\n"))?;
                w.indent_more();
                w.tag(TagKind::Generic, self.uid)?;
            }
            NodePayload::Code { body } => {
                w.emit_indented_block(body, 0, Some('\n'))?;
                w.tag(TagKind::Code, self.uid)?;
            }
            NodePayload::Widget { name, label, callback }
            | NodePayload::MenuItem { name, label, callback } => {
                let ind = w.indent();
                w.write_code_fmt(format_args!(
                    "{ind}Fl_Button* {name} = new Fl_Button(10, 10, 90, 25, "
                ))?;
                w.write_c_string(label)?;
                w.write_code(");\n")?;
                if callback.is_some() {
                    let cb = w.unique_id(self.uid, "cb", Some(name), None).to_string();
                    let ind = w.indent();
                    w.write_code_fmt(format_args!("{ind}{name}->callback({cb});\n"))?;
                }
            }
            NodePayload::WidgetClass { name } => {
                w.write_header_fmt(format_args!("class {name} : public Fl_Group {{\n"))?;
                w.begin_class(self.uid);
                w.emit_public_state(Visibility::Public)?;
                w.write_header_fmt(format_args!("{}{name}();\n", w.indent_at(1)))?;
                w.write_code_fmt(format_args!(
                    "{name}::{name}() : Fl_Group(0, 0, 400, 300) {{\n"
                ))?;
                w.indent_more();
                w.tag(TagKind::Generic, self.uid)?;
            }
        }
        Ok(())
    }

    fn emit_epilogue(&self, w: &mut CodeWriter<'_>) -> io::Result<()> {
        match &self.payload {
            NodePayload::Function { .. } | NodePayload::WidgetClass { .. } => {
                w.indent_less();
                w.write_code("}\n")?;
                w.tag(TagKind::Generic, self.uid)?;
            }
            NodePayload::Widget { .. } | NodePayload::MenuItem { .. } => {
                w.tag(TagKind::Generic, self.uid)?;
            }
            NodePayload::Comment { .. } | NodePayload::Code { .. } => {}
        }
        Ok(())
    }

    fn emit_static(&self, w: &mut CodeWriter<'_>) -> io::Result<()> {
        let (name, callback, tag_kind) = match &self.payload {
            NodePayload::Widget { name, callback, .. } => {
                (name, callback, TagKind::WidgetCallback)
            }
            NodePayload::MenuItem { name, callback, .. } => (name, callback, TagKind::MenuCallback),
            _ => return Ok(()),
        };
        w.write_header_once("#include <FL/Fl_Button.H>")?;
        if let Some(callback) = callback {
            let cb = w.unique_id(self.uid, "cb", Some(name), None).to_string();
            w.write_code_fmt(format_args!("static void {cb}(Fl_Widget* o, void* v) {{\n"))?;
            w.tag(TagKind::Generic, self.uid)?;
            w.emit_indented_block(callback, 1, Some('\n'))?;
            w.tag(tag_kind, self.uid)?;
            w.write_code("}\n")?;
        }
        Ok(())
    }

    fn set_body(&mut self, text: &str) {
        if let NodePayload::Code { body } = &mut self.payload {
            *body = text.to_string();
        }
    }

    fn set_callback(&mut self, text: &str) {
        match &mut self.payload {
            NodePayload::Widget { callback, .. } | NodePayload::MenuItem { callback, .. } => {
                *callback = Some(text.to_string());
            }
            _ => {}
        }
    }

    fn label(&self) -> Option<&str> {
        match &self.payload {
            NodePayload::Widget { label, .. } | NodePayload::MenuItem { label, .. } => Some(label),
            _ => None,
        }
    }

    fn offsets(&self) -> &SourceOffsets {
        &self.offsets
    }

    fn offsets_mut(&mut self) -> &mut SourceOffsets {
        &mut self.offsets
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockTree {
    pub nodes: Vec<MockNode>,
}

impl MockTree {
    pub fn new(nodes: Vec<MockNode>) -> Self {
        Self { nodes }
    }
}

impl DesignTree for MockTree {
    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, index: usize) -> &dyn DesignNode {
        &self.nodes[index]
    }

    fn node_mut(&mut self, index: usize) -> &mut dyn DesignNode {
        &mut self.nodes[index]
    }
}

/// A small but representative design: copyright comment, a window-building
/// function holding a code block and a button with a callback, and a
/// trailing comment.
pub fn sample_tree() -> MockTree {
    MockTree::new(vec![
        MockNode::new(
            0,
            1,
            NodePayload::Comment {
                text: "Copyright 2026 the Quipu authors.".to_string(),
                in_header: true,
            },
        ),
        MockNode::new(
            0,
            2,
            NodePayload::Function {
                name: "make_window".to_string(),
            },
        ),
        MockNode::new(
            1,
            3,
            NodePayload::Code {
                body: "int clicks = 0;\nsetup_state(&clicks);".to_string(),
            },
        ),
        MockNode::new(
            1,
            4,
            NodePayload::Widget {
                name: "ok_button".to_string(),
                label: "OK".to_string(),
                callback: Some("do_ok(o);".to_string()),
            },
        ),
        MockNode::new(
            0,
            5,
            NodePayload::Comment {
                text: "End of generated output.".to_string(),
                in_header: false,
            },
        ),
    ])
}

/// A tree with a widget class holding both a child widget and a method, for
/// the class-scope reordering rules.
pub fn widget_class_tree() -> MockTree {
    MockTree::new(vec![
        MockNode::new(
            0,
            1,
            NodePayload::WidgetClass {
                name: "Panel".to_string(),
            },
        ),
        MockNode::new(
            1,
            2,
            NodePayload::Function {
                name: "refresh".to_string(),
            },
        ),
        MockNode::new(
            1,
            3,
            NodePayload::Widget {
                name: "close_button".to_string(),
                label: "Close".to_string(),
                callback: None,
            },
        ),
    ])
}
