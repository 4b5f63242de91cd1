//! Toggling a block selection in and out of lists.
//!
//! [`ToggleList::plan`] is the single decision function. The editor runs the
//! plan it returns either as a feasibility pass ([`Editor::can`]) or as a
//! commit pass ([`Editor::commit`]), so both always see the same steps.
//!
//! [`Editor::can`]: crate::Editor::can
//! [`Editor::commit`]: crate::Editor::commit

use crate::core::{Attrs, Editor, Node};
use crate::ops::Transaction;
use crate::plan::{ExecMode, Plan, Step};
use crate::resolve::find_parent_node;
use crate::schema::{NodeType, Schema, SchemaError, TypeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Backward,
    Forward,
}

/// Merges the list of type `list` around the selection with an identical list
/// right before it. Always succeeds; a missed merge is not an error.
pub fn join_list_backward(tx: &mut Transaction, list: &NodeType) -> bool {
    join_list(tx, list, Direction::Backward)
}

/// Merges the list of type `list` around the selection with an identical list
/// right after it. Always succeeds.
pub fn join_list_forward(tx: &mut Transaction, list: &NodeType) -> bool {
    join_list(tx, list, Direction::Forward)
}

fn join_list(tx: &mut Transaction, list: &NodeType, direction: Direction) -> bool {
    let boundary = {
        let Some(from) = tx.doc().resolve(tx.selection().from()) else {
            return true;
        };
        let Some(found) = find_parent_node(&from, |el| el.kind == list.name()) else {
            tracing::trace!(list = list.name(), "join: no enclosing list");
            return true;
        };
        match direction {
            Direction::Backward => found.pos,
            Direction::Forward => found.end(),
        }
    };

    let neighbour_matches = tx.doc().resolve(boundary).is_some_and(|pos| {
        let neighbour = match direction {
            Direction::Backward => pos.node_before(),
            Direction::Forward => pos.node_after(),
        };
        matches!(neighbour, Some(Node::Element(el)) if el.kind == list.name())
    });
    if !neighbour_matches {
        tracing::trace!(list = list.name(), ?direction, boundary, "join: no matching sibling");
        return true;
    }

    if !tx.can_join(boundary) {
        tracing::trace!(list = list.name(), ?direction, boundary, "join: boundary not joinable");
        return true;
    }
    let joined = tx.join(boundary);
    tracing::debug!(list = list.name(), ?direction, boundary, joined, "join: merged sibling lists");
    true
}

/// The toggle-list command, with its type arguments already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ToggleList {
    list: NodeType,
    item: NodeType,
    keep_marks: bool,
    attrs: Attrs,
}

impl ToggleList {
    pub fn new(list: NodeType, item: NodeType) -> Self {
        Self {
            list,
            item,
            keep_marks: false,
            attrs: Attrs::default(),
        }
    }

    /// Resolves both types against `schema`. Unknown names fail here, before
    /// any decision is made.
    pub fn resolve<'a>(
        schema: &Schema,
        list: impl Into<TypeRef<'a>>,
        item: impl Into<TypeRef<'a>>,
    ) -> Result<Self, SchemaError> {
        Ok(Self::new(schema.resolve(list)?, schema.resolve(item)?))
    }

    pub fn keep_marks(mut self, keep_marks: bool) -> Self {
        self.keep_marks = keep_marks;
        self
    }

    pub fn attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn list(&self) -> &NodeType {
        &self.list
    }

    pub fn item(&self) -> &NodeType {
        &self.item
    }

    /// Builds the step sequence for the editor's current state, or `None` when
    /// the selection has no block range.
    pub fn plan(&self, editor: &Editor, mode: ExecMode) -> Option<Plan> {
        let doc = editor.doc();
        let schema = editor.schema();
        let capabilities = editor.capabilities();
        let selection = editor.selection();

        let from = doc.resolve(selection.from())?;
        let to = doc.resolve(selection.to())?;
        let Some(range) = from.block_range(&to, schema) else {
            tracing::debug!(from = selection.from(), to = selection.to(), "toggle_list: no block range");
            return None;
        };

        let parent_list = find_parent_node(&from, |el| capabilities.is_list_kind(&el.kind));
        if let Some(parent) = parent_list {
            let within_reach = range.depth as isize - parent.depth as isize <= 1;
            if range.depth >= 1 && within_reach {
                if parent.node.kind == self.list.name() {
                    tracing::debug!(list = self.list.name(), "toggle_list: unwrap");
                    return Some(
                        Plan::from(Step::LiftListItem {
                            item: self.item.clone(),
                        })
                        .with_source("command:list.toggle:unwrap"),
                    );
                }

                if schema.valid_content(&self.list, &parent.node.children) {
                    tracing::debug!(
                        from = parent.node.kind.as_str(),
                        to = self.list.name(),
                        "toggle_list: retype"
                    );
                    return Some(
                        Plan::from(vec![
                            Step::SetNodeType {
                                pos: parent.pos,
                                node_type: self.list.clone(),
                            },
                            Step::JoinBackward {
                                list: self.list.clone(),
                            },
                            Step::JoinForward {
                                list: self.list.clone(),
                            },
                        ])
                        .with_source("command:list.toggle:retype"),
                    );
                }
            }
        }

        let mut plan = Plan::new().with_source("command:list.toggle:wrap");
        let wrap = Step::WrapInList {
            list: self.list.clone(),
            attrs: self.attrs.clone(),
        };
        if !editor.can(&Plan::from(wrap.clone())) {
            tracing::debug!(list = self.list.name(), "toggle_list: clearing blocks before wrap");
            plan.push(Step::ClearNodes);
        }
        plan.push(wrap);
        plan.push(Step::JoinBackward {
            list: self.list.clone(),
        });
        plan.push(Step::JoinForward {
            list: self.list.clone(),
        });

        if self.keep_marks && mode == ExecMode::Commit {
            let marks =
                capabilities.active_splittable_marks(doc, selection, editor.stored_marks());
            if !marks.is_empty() {
                plan.push(Step::EnsureMarks(marks));
            }
        }
        Some(plan)
    }

    pub fn can_run(&self, editor: &Editor) -> bool {
        self.plan(editor, ExecMode::Feasibility)
            .is_some_and(|plan| editor.can(&plan))
    }

    pub fn run(&self, editor: &mut Editor) -> bool {
        let Some(plan) = self.plan(editor, ExecMode::Commit) else {
            return false;
        };
        let ok = editor.commit(&plan);
        tracing::debug!(list = self.list.name(), ok, steps = plan.steps().len(), "toggle_list");
        ok
    }
}
