use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{Attrs, Document, EditorConfig, ElementKind, Marks, Node, Selection};
use crate::schema::Schema;

pub type Path = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid position: {0}")]
    InvalidPosition(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    InsertText {
        #[serde(default)]
        path: Path,
        /// Char offset into the text node.
        offset: usize,
        text: String,
    },
    InsertNode {
        #[serde(default)]
        path: Path,
        node: Node,
    },
    /// Splices `nodes` over `parent`'s children in `range`. An empty `parent`
    /// addresses the document root.
    ReplaceNodes {
        #[serde(default)]
        parent: Path,
        range: Range<usize>,
        nodes: Vec<Node>,
    },
    SetNodeKind {
        #[serde(default)]
        path: Path,
        kind: ElementKind,
        attrs: Attrs,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Pending transaction: an exclusively owned draft of the next editor state.
///
/// Every op is applied to the draft as it is added, so later steps observe
/// earlier ones. Nothing reaches the editor until [`Editor::apply`] swaps the
/// draft in; dropping the transaction discards it.
///
/// [`Editor::apply`]: crate::Editor::apply
#[derive(Debug, Clone)]
pub struct Transaction {
    doc: Document,
    selection: Selection,
    stored_marks: Option<Marks>,
    ops: Vec<Op>,
    meta: TransactionMeta,
    schema: Arc<Schema>,
    default_block: String,
}

impl Transaction {
    pub(crate) fn new(
        doc: Document,
        selection: Selection,
        stored_marks: Option<Marks>,
        schema: Arc<Schema>,
        config: &EditorConfig,
    ) -> Self {
        Self {
            doc,
            selection,
            stored_marks,
            ops: Vec::new(),
            meta: TransactionMeta::default(),
            schema,
            default_block: config.default_block.clone(),
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        let size = self.doc.content_size();
        self.selection = Selection::new(selection.anchor.min(size), selection.head.min(size));
    }

    pub fn stored_marks(&self) -> Option<&Marks> {
        self.stored_marks.as_ref()
    }

    pub fn set_stored_marks(&mut self, marks: Option<Marks>) {
        self.stored_marks = marks;
    }

    /// Stores `marks` for the next insertion unless they already apply there.
    pub fn ensure_marks(&mut self, marks: Marks) {
        let current = match &self.stored_marks {
            Some(stored) => stored.clone(),
            None => self
                .doc
                .resolve(self.selection.from())
                .map(|pos| pos.marks())
                .unwrap_or_default(),
        };
        if current != marks {
            self.stored_marks = Some(marks);
        }
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn doc_changed(&self) -> bool {
        !self.ops.is_empty()
    }

    pub fn meta(&self) -> &TransactionMeta {
        &self.meta
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn default_block(&self) -> &str {
        &self.default_block
    }

    pub(crate) fn into_parts(self) -> (Document, Selection, Option<Marks>) {
        (self.doc, self.selection, self.stored_marks)
    }

    /// Applies `op` to the draft. A failed op leaves the draft untouched.
    /// Changing the document drops stored marks.
    pub fn step(&mut self, op: Op) -> Result<(), ApplyError> {
        apply_op_to(&mut self.doc, &op)?;
        self.ops.push(op);
        self.stored_marks = None;
        Ok(())
    }
}

fn apply_op_to(doc: &mut Document, op: &Op) -> Result<(), ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = match node_mut(doc, path)? {
                Node::Text(t) => t,
                _ => return Err(ApplyError::InvalidPath("Expected Text node".into())),
            };
            let byte = char_to_byte(&text_node.text, *offset);
            text_node.text.insert_str(byte, text);
            Ok(())
        }
        Op::InsertNode { path, node } => {
            let Some((&index, parent)) = path.split_last() else {
                return Err(ApplyError::InvalidPath("Empty insert path".into()));
            };
            let children = children_mut(doc, parent)?;
            if index > children.len() {
                return Err(ApplyError::InvalidPath(format!(
                    "Insert index out of bounds: {index} > {}",
                    children.len()
                )));
            }
            children.insert(index, node.clone());
            Ok(())
        }
        Op::ReplaceNodes {
            parent,
            range,
            nodes,
        } => {
            let children = children_mut(doc, parent)?;
            if range.start > range.end || range.end > children.len() {
                return Err(ApplyError::InvalidPath(format!(
                    "Replace range out of bounds: {range:?} in {}",
                    children.len()
                )));
            }
            children.splice(range.clone(), nodes.iter().cloned());
            Ok(())
        }
        Op::SetNodeKind { path, kind, attrs } => match node_mut(doc, path)? {
            Node::Element(el) => {
                el.kind = kind.clone();
                el.attrs = attrs.clone();
                Ok(())
            }
            _ => Err(ApplyError::InvalidPath("Expected Element node".into())),
        },
    }
}

fn char_to_byte(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(ix, _)| ix).unwrap_or(s.len())
}

fn children_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Vec<Node>, ApplyError> {
    let mut children = &mut doc.children;
    for (depth, &ix) in path.iter().enumerate() {
        let len = children.len();
        children = match children.get_mut(ix) {
            Some(Node::Element(el)) => &mut el.children,
            Some(_) => {
                return Err(ApplyError::InvalidPath(format!(
                    "Non-container node at depth {depth}"
                )));
            }
            None => {
                return Err(ApplyError::InvalidPath(format!(
                    "Path out of bounds at depth {depth}: {ix} >= {len}"
                )));
            }
        };
    }
    Ok(children)
}

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, ApplyError> {
    let Some((&index, parent)) = path.split_last() else {
        return Err(ApplyError::InvalidPath("Empty path".into()));
    };
    let children = children_mut(doc, parent)?;
    let len = children.len();
    children.get_mut(index).ok_or_else(|| {
        ApplyError::InvalidPath(format!("Path out of bounds: {index} >= {len}"))
    })
}
