//! Structural primitives on a pending [`Transaction`].
//!
//! Each primitive either applies fully or leaves the draft untouched and
//! reports `false`. Wrapping, lifting and joining rebuild subtrees with
//! [`Op::ReplaceNodes`]; the selection is carried across through a text block
//! bookmark, since none of these primitives create, drop or reorder text
//! blocks.

use std::ops::Range;

use crate::core::{Attrs, Document, ElementNode, Node, Selection, TextNode};
use crate::ops::{ApplyError, Op, Path, Transaction};
use crate::resolve::Container;
use crate::schema::{NodeType, Schema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextblockSpan {
    pub path: Path,
    /// Absolute position of the start of the block's content.
    pub start: usize,
    pub end: usize,
}

pub(crate) fn textblocks(doc: &Document, schema: &Schema) -> Vec<TextblockSpan> {
    fn walk(
        children: &[Node],
        schema: &Schema,
        base: usize,
        path: &mut Path,
        out: &mut Vec<TextblockSpan>,
    ) {
        let mut pos = base;
        for (ix, node) in children.iter().enumerate() {
            if let Node::Element(el) = node {
                path.push(ix);
                if schema.is_textblock(&el.kind) {
                    out.push(TextblockSpan {
                        path: path.clone(),
                        start: pos + 1,
                        end: pos + 1 + el.content_size(),
                    });
                } else {
                    walk(&el.children, schema, pos + 1, path, out);
                }
                path.pop();
            }
            pos += node.size();
        }
    }

    let mut out = Vec::new();
    walk(&doc.children, schema, 0, &mut Vec::new(), &mut out);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BookmarkPoint {
    InBlock { ordinal: usize, offset: usize },
    Raw(usize),
}

impl BookmarkPoint {
    fn capture(spans: &[TextblockSpan], pos: usize) -> Self {
        spans
            .iter()
            .position(|s| s.start <= pos && pos <= s.end)
            .map(|ordinal| BookmarkPoint::InBlock {
                ordinal,
                offset: pos - spans[ordinal].start,
            })
            .unwrap_or(BookmarkPoint::Raw(pos))
    }

    fn restore(self, spans: &[TextblockSpan], size: usize) -> usize {
        match self {
            BookmarkPoint::InBlock { ordinal, offset } => match spans.get(ordinal) {
                Some(span) => (span.start + offset).min(span.end),
                None => size,
            },
            BookmarkPoint::Raw(pos) => pos.min(size),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SelectionBookmark {
    anchor: BookmarkPoint,
    head: BookmarkPoint,
}

impl SelectionBookmark {
    pub fn capture(doc: &Document, schema: &Schema, selection: &Selection) -> Self {
        let spans = textblocks(doc, schema);
        Self {
            anchor: BookmarkPoint::capture(&spans, selection.anchor),
            head: BookmarkPoint::capture(&spans, selection.head),
        }
    }

    pub fn restore(self, doc: &Document, schema: &Schema) -> Selection {
        let spans = textblocks(doc, schema);
        let size = doc.content_size();
        Selection::new(
            self.anchor.restore(&spans, size),
            self.head.restore(&spans, size),
        )
    }
}

/// Owned copy of a [`NodeRange`](crate::NodeRange), detached from the
/// snapshot it was resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockSpan {
    pub parent: Path,
    pub parent_kind: String,
    pub start_index: usize,
    pub end_index: usize,
}

impl Transaction {
    /// Block range covering the current selection.
    pub(crate) fn selection_block_span(
        &self,
        pred: impl Fn(Container<'_>) -> bool,
    ) -> Option<BlockSpan> {
        let doc = self.doc();
        let from = doc.resolve(self.selection().from())?;
        let to = doc.resolve(self.selection().to())?;
        let range = from.block_range_where(&to, self.schema(), pred)?;
        Some(BlockSpan {
            parent: range.parent_path(),
            parent_kind: range.parent().kind().to_string(),
            start_index: range.start_index(),
            end_index: range.end_index(),
        })
    }

    fn replace_nodes(
        &mut self,
        parent: Path,
        range: Range<usize>,
        nodes: Vec<Node>,
    ) -> Result<(), ApplyError> {
        let bookmark = SelectionBookmark::capture(self.doc(), self.schema(), self.selection());
        self.step(Op::ReplaceNodes {
            parent,
            range,
            nodes,
        })?;
        let selection = bookmark.restore(self.doc(), self.schema());
        self.set_selection(selection);
        Ok(())
    }

    fn children_at(&self, path: &[usize]) -> Option<&[Node]> {
        let mut children: &[Node] = &self.doc().children;
        for &ix in path {
            children = match children.get(ix)? {
                Node::Element(el) => &el.children,
                _ => return None,
            };
        }
        Some(children)
    }

    fn element_at(&self, path: &[usize]) -> Option<&ElementNode> {
        let (&last, parent) = path.split_last()?;
        self.children_at(parent)?.get(last)?.as_element()
    }

    /// Wraps each block of the selection's block range in an item of `list`'s
    /// default item type, and the items in one `list` node.
    pub fn wrap_in_list(&mut self, list: &NodeType, attrs: &Attrs) -> bool {
        let Some(span) = self.selection_block_span(|_| true) else {
            return false;
        };
        let Some(item) = self.schema().default_child(list) else {
            return false;
        };
        let Some(siblings) = self.children_at(&span.parent) else {
            return false;
        };

        let blocks = &siblings[span.start_index..span.end_index];
        if blocks.is_empty() {
            return false;
        }
        let items: Vec<Node> = blocks
            .iter()
            .map(|block| {
                Node::element_with_attrs(
                    item.name(),
                    item.default_attrs().clone(),
                    vec![block.clone()],
                )
            })
            .collect();

        let schema = self.schema();
        let items_ok = items
            .iter()
            .all(|it| schema.accepts(item.name(), it.children()));
        if !items_ok || !schema.valid_content(list, &items) {
            return false;
        }
        let wrapper = Node::element_with_attrs(list.name(), list.compute_attrs(attrs), items);
        let fits = schema.can_replace(
            &span.parent_kind,
            siblings,
            span.start_index..span.end_index,
            std::slice::from_ref(&wrapper),
        );
        if !fits {
            return false;
        }

        self.replace_nodes(span.parent, span.start_index..span.end_index, vec![wrapper])
            .is_ok()
    }

    /// Lifts the selected items of the innermost list whose items are of type
    /// `item`. Nested lists outdent into the outer list; top-level lists are
    /// split and the items' content lands at the list's level.
    pub fn lift_list_item(&mut self, item: &NodeType) -> bool {
        let item_name = item.name().to_string();
        let Some(span) = self.selection_block_span(|node| {
            node.children()
                .first()
                .is_some_and(|first| first.kind() == item_name)
        }) else {
            return false;
        };

        // The list itself sits inside an item of the same type.
        let nested = span
            .parent
            .split_last()
            .and_then(|(_, list_parent)| self.element_at(list_parent))
            .is_some_and(|el| el.kind == item_name);

        if nested {
            self.lift_to_outer_list(&span)
        } else {
            self.lift_out_of_list(&span)
        }
    }

    fn lift_out_of_list(&mut self, span: &BlockSpan) -> bool {
        let Some((&list_ix, list_parent)) = span.parent.split_last() else {
            return false;
        };
        let Some(list) = self.element_at(&span.parent).cloned() else {
            return false;
        };
        let Some(parent_kind) = self.container_kind(list_parent) else {
            return false;
        };

        let before = &list.children[..span.start_index];
        let lifted = &list.children[span.start_index..span.end_index];
        let after = &list.children[span.end_index..];

        let mut nodes: Vec<Node> = Vec::new();
        if !before.is_empty() {
            nodes.push(Node::Element(ElementNode {
                children: before.to_vec(),
                ..list.clone()
            }));
        }
        for entry in lifted {
            nodes.extend(entry.children().iter().cloned());
        }
        if !after.is_empty() {
            nodes.push(Node::Element(ElementNode {
                children: after.to_vec(),
                ..list.clone()
            }));
        }

        let Some(siblings) = self.children_at(list_parent) else {
            return false;
        };
        if !self
            .schema()
            .can_replace(&parent_kind, siblings, list_ix..list_ix + 1, &nodes)
        {
            return false;
        }

        self.replace_nodes(list_parent.to_vec(), list_ix..list_ix + 1, nodes)
            .is_ok()
    }

    fn lift_to_outer_list(&mut self, span: &BlockSpan) -> bool {
        // span.parent = [..outer_list, parent_item, inner_list]
        let Some((&inner_ix, item_path)) = span.parent.split_last() else {
            return false;
        };
        let Some((&item_ix, outer_path)) = item_path.split_last() else {
            return false;
        };
        let (Some(inner), Some(parent_item), Some(outer)) = (
            self.element_at(&span.parent).cloned(),
            self.element_at(item_path).cloned(),
            self.element_at(outer_path).cloned(),
        ) else {
            return false;
        };

        let mut lifted: Vec<Node> = inner.children[span.start_index..span.end_index].to_vec();
        let trailing = &inner.children[span.end_index..];
        if !trailing.is_empty() {
            let nested = Node::Element(ElementNode {
                children: trailing.to_vec(),
                ..inner.clone()
            });
            match lifted.last_mut() {
                Some(Node::Element(last)) => last.children.push(nested),
                _ => return false,
            }
        }

        let mut kept: Vec<Node> = parent_item.children[..inner_ix].to_vec();
        if span.start_index > 0 {
            kept.push(Node::Element(ElementNode {
                children: inner.children[..span.start_index].to_vec(),
                ..inner.clone()
            }));
        }

        // Blocks after the inner list follow the lifted items. They join the
        // last lifted item, or a copy of the parent item when it can't take them.
        let rest = &parent_item.children[inner_ix + 1..];
        let mut tail: Option<Node> = None;
        if !rest.is_empty() {
            let last = match lifted.last_mut() {
                Some(Node::Element(last)) => last,
                _ => return false,
            };
            let mut extended = last.children.clone();
            extended.extend(rest.iter().cloned());
            if self.schema().accepts(&last.kind, &extended) {
                last.children = extended;
            } else {
                tail = Some(Node::Element(ElementNode {
                    children: rest.to_vec(),
                    ..parent_item.clone()
                }));
            }
        }

        let mut nodes: Vec<Node> = Vec::new();
        if !kept.is_empty() {
            nodes.push(Node::Element(ElementNode {
                children: kept,
                ..parent_item
            }));
        }
        nodes.extend(lifted);
        nodes.extend(tail);

        let schema = self.schema();
        if !schema.can_replace(&outer.kind, &outer.children, item_ix..item_ix + 1, &nodes) {
            return false;
        }
        let items_ok = nodes
            .iter()
            .filter_map(Node::as_element)
            .all(|el| schema.accepts(&el.kind, &el.children));
        if !items_ok {
            return false;
        }

        self.replace_nodes(outer_path.to_vec(), item_ix..item_ix + 1, nodes)
            .is_ok()
    }

    fn container_kind(&self, path: &[usize]) -> Option<String> {
        if path.is_empty() {
            return Some(crate::core::DOC_KIND.to_string());
        }
        self.element_at(path).map(|el| el.kind.clone())
    }

    /// Resets every text block touching the selection to the default text
    /// block and lifts it out of wrappers that can't hold it.
    pub fn clear_nodes(&mut self) -> bool {
        let from = self.selection().from();
        let to = self.selection().to();
        let ordinals: Vec<usize> = textblocks(self.doc(), self.schema())
            .iter()
            .enumerate()
            .filter(|(_, span)| span.start <= to && span.end >= from)
            .map(|(ordinal, _)| ordinal)
            .collect();

        let Some(default_block) = self.clearing_target() else {
            tracing::debug!("no text block type in schema");
            return true;
        };

        for ordinal in ordinals {
            let Some(span) = textblocks(self.doc(), self.schema()).into_iter().nth(ordinal) else {
                continue;
            };
            let Some(block) = self.element_at(&span.path) else {
                continue;
            };
            if block.kind != default_block.name() || &block.attrs != default_block.default_attrs() {
                let op = Op::SetNodeKind {
                    path: span.path.clone(),
                    kind: default_block.name().to_string(),
                    attrs: default_block.default_attrs().clone(),
                };
                if self.step(op).is_err() {
                    continue;
                }
            }
            if let Some(target) = self.lift_target(&span.path) {
                self.lift_to_depth(&span.path, target);
            }
        }
        true
    }

    /// The configured default block when it is a text block, else the schema's
    /// first text block type.
    fn clearing_target(&self) -> Option<NodeType> {
        let schema = self.schema();
        match schema.get(self.default_block()) {
            Some(ty) if ty.is_textblock() => Some(ty.clone()),
            configured => {
                if configured.is_some() {
                    tracing::warn!(
                        kind = self.default_block(),
                        "default block is not a text block, using the schema default"
                    );
                }
                schema.default_textblock().cloned()
            }
        }
    }

    /// Shallowest-needed ancestor depth able to hold the node at `path` in
    /// place of the wrapper containing it.
    fn lift_target(&self, path: &[usize]) -> Option<usize> {
        let node = self.element_at(path)?.clone();
        let range_depth = path.len().checked_sub(1)?;
        let mut depth = range_depth;
        loop {
            let kind = self.container_kind(&path[..depth])?;
            let children = self.children_at(&path[..depth])?;
            let index = path[depth];
            if depth < range_depth
                && self.schema().can_replace(
                    &kind,
                    children,
                    index..index + 1,
                    std::slice::from_ref(&Node::Element(node.clone())),
                )
            {
                return Some(depth);
            }
            if depth == 0 || self.schema().is_isolating(&kind) || !self.can_cut(&kind, children, index) {
                return None;
            }
            depth -= 1;
        }
    }

    fn can_cut(&self, kind: &str, children: &[Node], index: usize) -> bool {
        let schema = self.schema();
        (index == 0 || schema.accepts(kind, &children[..index]))
            && (index + 1 >= children.len() || schema.accepts(kind, &children[index + 1..]))
    }

    /// Moves the node at `path` up so its parent becomes the ancestor at
    /// `target`, splitting every wrapper in between around it.
    fn lift_to_depth(&mut self, path: &[usize], target: usize) -> bool {
        let Some(node) = self.element_at(path).cloned() else {
            return false;
        };
        let wrapper_path = &path[..=target];
        let Some(wrapper) = self.element_at(wrapper_path).cloned() else {
            return false;
        };
        let (before, after) = split_around(&wrapper, &path[target + 1..]);

        let mut nodes: Vec<Node> = Vec::new();
        nodes.extend(before);
        nodes.push(Node::Element(node));
        nodes.extend(after);

        let index = path[target];
        self.replace_nodes(path[..target].to_vec(), index..index + 1, nodes)
            .is_ok()
    }

    /// Retypes the element at `pos`, keeping its children. Attributes reset to
    /// the new type's defaults.
    pub fn set_node_type(&mut self, pos: usize, node_type: &NodeType) -> bool {
        let Some(Node::Element(el)) = self.doc().node_at(pos) else {
            return false;
        };
        if !self.schema().valid_content(node_type, &el.children) {
            return false;
        }
        let Some(path) = self.doc().path_at(pos) else {
            return false;
        };
        self.step(Op::SetNodeKind {
            path,
            kind: node_type.name().to_string(),
            attrs: node_type.default_attrs().clone(),
        })
        .is_ok()
    }

    /// Whether the elements on either side of `pos` can merge into one.
    pub fn can_join(&self, pos: usize) -> bool {
        let Some(resolved) = self.doc().resolve(pos) else {
            return false;
        };
        if resolved.text_offset() != 0 {
            return false;
        }
        let (Some(Node::Element(before)), Some(Node::Element(after))) =
            (resolved.node_before(), resolved.node_after())
        else {
            return false;
        };

        let schema = self.schema();
        let merged: Vec<&str> = before
            .children
            .iter()
            .chain(&after.children)
            .map(Node::kind)
            .collect();
        let index = resolved.index(resolved.depth());
        let parent = resolved.parent();
        schema.accepts_kinds(&before.kind, &merged)
            && schema.can_replace(parent.kind(), parent.children(), index..index + 1, &[])
    }

    /// Merges the elements on either side of `pos`. The result keeps the first
    /// element's kind and attributes.
    pub fn join(&mut self, pos: usize) -> bool {
        if !self.can_join(pos) {
            return false;
        }
        let Some(resolved) = self.doc().resolve(pos) else {
            return false;
        };
        let (Some(Node::Element(before)), Some(Node::Element(after))) =
            (resolved.node_before(), resolved.node_after())
        else {
            return false;
        };
        let depth = resolved.depth();
        let index = resolved.index(depth);
        let parent = resolved.path_to(depth);
        let mut merged = before.clone();
        merged.children.extend(after.children.iter().cloned());

        self.replace_nodes(parent, index - 1..index + 1, vec![Node::Element(merged)])
            .is_ok()
    }

    /// Inserts `text` at the selection head, marked with the stored marks or
    /// else the marks at the cursor. The caret ends after the new text.
    pub fn insert_text(&mut self, text: &str) -> Result<(), ApplyError> {
        let head = self.selection().head;
        let resolved = self
            .doc()
            .resolve(head)
            .ok_or(ApplyError::InvalidPosition(head))?;
        if !self.schema().is_textblock(resolved.parent().kind()) {
            return Err(ApplyError::InvalidPosition(head));
        }
        let marks = match self.stored_marks() {
            Some(stored) => stored.clone(),
            None => resolved.marks(),
        };

        let depth = resolved.depth();
        let parent = resolved.path_to(depth);
        let index = resolved.index(depth);
        let text_offset = resolved.text_offset();
        let before = resolved.node_before().cloned();
        let after = resolved.node_after().cloned();

        let op = match (text_offset, before, after) {
            (0, Some(Node::Text(prev)), _) if prev.marks == marks => Op::InsertText {
                path: child_path(&parent, index - 1),
                offset: prev.len(),
                text: text.to_string(),
            },
            (0, _, Some(Node::Text(next))) if next.marks == marks => Op::InsertText {
                path: child_path(&parent, index),
                offset: 0,
                text: text.to_string(),
            },
            (0, _, _) => Op::InsertNode {
                path: child_path(&parent, index),
                node: Node::marked_text(text, marks),
            },
            (offset, Some(Node::Text(current)), _) if current.marks == marks => Op::InsertText {
                path: child_path(&parent, index),
                offset,
                text: text.to_string(),
            },
            (offset, Some(Node::Text(current)), _) => {
                let split = char_split(&current.text, offset);
                Op::ReplaceNodes {
                    parent: parent.clone(),
                    range: index..index + 1,
                    nodes: vec![
                        Node::Text(TextNode {
                            text: split.0.to_string(),
                            marks: current.marks.clone(),
                        }),
                        Node::marked_text(text, marks),
                        Node::Text(TextNode {
                            text: split.1.to_string(),
                            marks: current.marks,
                        }),
                    ],
                }
            }
            _ => return Err(ApplyError::InvalidPosition(head)),
        };

        self.step(op)?;
        let caret = head + text.chars().count();
        self.set_selection(Selection::collapsed(caret));
        Ok(())
    }
}

fn child_path(parent: &[usize], index: usize) -> Path {
    let mut path = parent.to_vec();
    path.push(index);
    path
}

fn char_split(s: &str, chars: usize) -> (&str, &str) {
    let byte = s.char_indices().nth(chars).map(|(ix, _)| ix).unwrap_or(s.len());
    s.split_at(byte)
}

/// Copies of `wrapper` holding what lies before and after the descendant at
/// `rel`. Copies left without children are dropped.
fn split_around(wrapper: &ElementNode, rel: &[usize]) -> (Option<Node>, Option<Node>) {
    let Some((&ix, rest)) = rel.split_first() else {
        return (None, None);
    };
    let Some(child) = wrapper.children.get(ix) else {
        return (Some(Node::Element(wrapper.clone())), None);
    };

    let mut left: Vec<Node> = wrapper.children[..ix].to_vec();
    let mut right: Vec<Node> = wrapper.children[ix + 1..].to_vec();
    if !rest.is_empty() {
        if let Node::Element(inner) = child {
            let (inner_left, inner_right) = split_around(inner, rest);
            left.extend(inner_left);
            if let Some(node) = inner_right {
                right.insert(0, node);
            }
        }
    }

    let copy = |children: Vec<Node>| {
        (!children.is_empty()).then(|| {
            Node::Element(ElementNode {
                kind: wrapper.kind.clone(),
                attrs: wrapper.attrs.clone(),
                children,
            })
        })
    };
    (copy(left), copy(right))
}
