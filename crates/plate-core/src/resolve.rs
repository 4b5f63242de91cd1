//! Absolute positions and what they resolve to.
//!
//! Positions count tokens in the flattened tree: a text node spans one
//! position per char, a void node spans one, and an element spans its content
//! plus an opening and a closing token. Position 0 is the start of the
//! document content.

use crate::core::{DOC_KIND, Document, ElementNode, Marks, Node};
use crate::ops::Path;
use crate::schema::Schema;

/// A node that can hold children: the document root or an element.
#[derive(Debug, Clone, Copy)]
pub enum Container<'a> {
    Doc(&'a Document),
    Element(&'a ElementNode),
}

impl<'a> Container<'a> {
    pub fn kind(&self) -> &'a str {
        match self {
            Container::Doc(_) => DOC_KIND,
            Container::Element(el) => el.kind.as_str(),
        }
    }

    pub fn children(&self) -> &'a [Node] {
        match self {
            Container::Doc(doc) => &doc.children,
            Container::Element(el) => &el.children,
        }
    }

    pub fn as_element(&self) -> Option<&'a ElementNode> {
        match self {
            Container::Doc(_) => None,
            Container::Element(el) => Some(el),
        }
    }

    pub fn content_size(&self) -> usize {
        self.children().iter().map(Node::size).sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct Level<'a> {
    node: Container<'a>,
    /// Index of the child the position points into (or before).
    index: usize,
    /// Absolute position of the start of `node`'s content.
    start: usize,
}

/// A position resolved against a document snapshot.
#[derive(Debug, Clone)]
pub struct ResolvedPos<'a> {
    pos: usize,
    text_offset: usize,
    path: Vec<Level<'a>>,
}

impl Document {
    pub fn resolve(&self, pos: usize) -> Option<ResolvedPos<'_>> {
        if pos > self.content_size() {
            return None;
        }

        let mut path: Vec<Level<'_>> = Vec::new();
        let mut node = Container::Doc(self);
        let mut start = 0;
        let mut parent_offset = pos;
        loop {
            let (index, offset) = find_index(node.children(), parent_offset);
            let rem = parent_offset - offset;
            path.push(Level { node, index, start });
            if rem == 0 {
                return Some(ResolvedPos {
                    pos,
                    text_offset: 0,
                    path,
                });
            }
            match node.children().get(index) {
                Some(Node::Element(el)) => {
                    node = Container::Element(el);
                    start += offset + 1;
                    parent_offset = rem - 1;
                }
                _ => {
                    return Some(ResolvedPos {
                        pos,
                        text_offset: rem,
                        path,
                    });
                }
            }
        }
    }
}

/// Index of the child containing `offset`, and that child's start offset.
fn find_index(children: &[Node], offset: usize) -> (usize, usize) {
    let mut cur = 0;
    for (ix, child) in children.iter().enumerate() {
        let end = cur + child.size();
        if end > offset {
            return (ix, cur);
        }
        cur = end;
    }
    (children.len(), cur)
}

impl<'a> ResolvedPos<'a> {
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    /// Offset into the text node at `index(depth)`, 0 when between nodes.
    pub fn text_offset(&self) -> usize {
        self.text_offset
    }

    pub fn node(&self, depth: usize) -> Container<'a> {
        self.path[depth.min(self.depth())].node
    }

    pub fn parent(&self) -> Container<'a> {
        self.node(self.depth())
    }

    pub fn index(&self, depth: usize) -> usize {
        self.path[depth.min(self.depth())].index
    }

    pub fn index_after(&self, depth: usize) -> usize {
        let depth = depth.min(self.depth());
        let bump = usize::from(depth != self.depth() || self.text_offset != 0);
        self.index(depth) + bump
    }

    pub fn start(&self, depth: usize) -> usize {
        self.path[depth.min(self.depth())].start
    }

    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    pub fn parent_offset(&self) -> usize {
        self.pos - self.start(self.depth())
    }

    /// Position right before the ancestor at `depth`. `None` for the root or
    /// for depths past `depth() + 1`.
    pub fn before(&self, depth: usize) -> Option<usize> {
        if depth == 0 || depth > self.depth() + 1 {
            return None;
        }
        if depth == self.depth() + 1 {
            return Some(self.pos);
        }
        Some(self.start(depth) - 1)
    }

    /// Position right after the ancestor at `depth`.
    pub fn after(&self, depth: usize) -> Option<usize> {
        if depth == 0 || depth > self.depth() + 1 {
            return None;
        }
        if depth == self.depth() + 1 {
            return Some(self.pos);
        }
        Some(self.end(depth) + 1)
    }

    /// Child-index path of the ancestor at `depth`.
    pub fn path_to(&self, depth: usize) -> Path {
        (0..depth.min(self.depth())).map(|d| self.index(d)).collect()
    }

    pub fn node_after(&self) -> Option<&'a Node> {
        self.parent().children().get(self.index(self.depth()))
    }

    pub fn node_before(&self) -> Option<&'a Node> {
        let index = self.index(self.depth());
        if self.text_offset != 0 {
            return self.parent().children().get(index);
        }
        index
            .checked_sub(1)
            .and_then(|ix| self.parent().children().get(ix))
    }

    /// Marks a character typed here would pick up.
    pub fn marks(&self) -> Marks {
        let parent = self.parent();
        if parent.content_size() == 0 {
            return Marks::default();
        }
        let candidate = if self.text_offset != 0 {
            self.node_after()
        } else {
            self.node_before().or_else(|| self.node_after())
        };
        match candidate {
            Some(Node::Text(text)) => text.marks.clone(),
            _ => Marks::default(),
        }
    }

    /// Minimal range of sibling blocks covering `self` and `other`.
    pub fn block_range(&self, other: &ResolvedPos<'a>, schema: &Schema) -> Option<NodeRange<'a>> {
        self.block_range_where(other, schema, |_| true)
    }

    /// Like [`block_range`](Self::block_range), but the node at the range
    /// depth must also satisfy `pred`. Never climbs out of an isolating node.
    pub fn block_range_where(
        &self,
        other: &ResolvedPos<'a>,
        schema: &Schema,
        pred: impl Fn(Container<'a>) -> bool,
    ) -> Option<NodeRange<'a>> {
        if other.pos < self.pos {
            return other.block_range_where(self, schema, pred);
        }

        let skip_parent = schema.is_textblock(self.parent().kind()) || self.pos == other.pos;
        let mut depth = self.depth().checked_sub(usize::from(skip_parent))?;
        loop {
            let node = self.node(depth);
            if other.pos <= self.end(depth) && pred(node) {
                return Some(NodeRange {
                    from: self.clone(),
                    to: other.clone(),
                    depth,
                });
            }
            if depth == 0 || schema.is_isolating(node.kind()) {
                return None;
            }
            depth -= 1;
        }
    }
}

/// A run of siblings at `depth`, bounded by two resolved positions.
#[derive(Debug, Clone)]
pub struct NodeRange<'a> {
    pub from: ResolvedPos<'a>,
    pub to: ResolvedPos<'a>,
    pub depth: usize,
}

impl<'a> NodeRange<'a> {
    pub fn start(&self) -> usize {
        self.from.before(self.depth + 1).unwrap_or(self.from.pos)
    }

    pub fn end(&self) -> usize {
        self.to.after(self.depth + 1).unwrap_or(self.to.pos)
    }

    pub fn parent(&self) -> Container<'a> {
        self.from.node(self.depth)
    }

    pub fn start_index(&self) -> usize {
        self.from.index(self.depth)
    }

    pub fn end_index(&self) -> usize {
        self.to.index_after(self.depth)
    }

    /// Child-index path of the range's parent.
    pub fn parent_path(&self) -> Path {
        self.from.path_to(self.depth)
    }
}

/// Nearest ancestor matching a predicate.
#[derive(Debug, Clone, Copy)]
pub struct ParentMatch<'a> {
    pub node: &'a ElementNode,
    /// Position right before the node.
    pub pos: usize,
    /// Position of the start of the node's content.
    pub start: usize,
    pub depth: usize,
}

impl ParentMatch<'_> {
    /// Position right after the node.
    pub fn end(&self) -> usize {
        self.pos + self.node.size()
    }
}

/// Walks from the innermost ancestor of `pos` outwards (the root excluded) and
/// returns the first one `pred` accepts.
pub fn find_parent_node<'a>(
    pos: &ResolvedPos<'a>,
    pred: impl Fn(&ElementNode) -> bool,
) -> Option<ParentMatch<'a>> {
    (1..=pos.depth()).rev().find_map(|depth| {
        let el = pos.node(depth).as_element()?;
        if !pred(el) {
            return None;
        }
        Some(ParentMatch {
            node: el,
            pos: pos.before(depth)?,
            start: pos.start(depth),
            depth,
        })
    })
}
