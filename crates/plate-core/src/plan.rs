use crate::core::{Attrs, Marks};
use crate::list::{join_list_backward, join_list_forward};
use crate::ops::Transaction;
use crate::schema::NodeType;

/// Which of the two executors is running a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Throwaway draft; the caller only wants to know whether the plan holds.
    Feasibility,
    /// The draft is applied to the editor if the plan succeeds.
    Commit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    ClearNodes,
    WrapInList { list: NodeType, attrs: Attrs },
    LiftListItem { item: NodeType },
    SetNodeType { pos: usize, node_type: NodeType },
    JoinBackward { list: NodeType },
    JoinForward { list: NodeType },
    EnsureMarks(Marks),
}

impl Step {
    /// Cosmetic steps never abort a plan, whatever they report.
    pub fn is_cosmetic(&self) -> bool {
        matches!(self, Step::JoinBackward { .. } | Step::JoinForward { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Step::ClearNodes => "clear_nodes",
            Step::WrapInList { .. } => "wrap_in_list",
            Step::LiftListItem { .. } => "lift_list_item",
            Step::SetNodeType { .. } => "set_node_type",
            Step::JoinBackward { .. } => "join_backward",
            Step::JoinForward { .. } => "join_forward",
            Step::EnsureMarks(_) => "ensure_marks",
        }
    }

    fn run(&self, tx: &mut Transaction, mode: ExecMode) -> bool {
        match self {
            Step::ClearNodes => tx.clear_nodes(),
            Step::WrapInList { list, attrs } => tx.wrap_in_list(list, attrs),
            Step::LiftListItem { item } => tx.lift_list_item(item),
            Step::SetNodeType { pos, node_type } => tx.set_node_type(*pos, node_type),
            Step::JoinBackward { list } => join_list_backward(tx, list),
            Step::JoinForward { list } => join_list_forward(tx, list),
            Step::EnsureMarks(marks) => {
                if mode == ExecMode::Commit && !marks.is_empty() {
                    tx.ensure_marks(marks.clone());
                }
                true
            }
        }
    }
}

/// Ordered steps run against one pending transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    steps: Vec<Step>,
    source: Option<String>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn source(&self) -> String {
        match &self.source {
            Some(source) => source.clone(),
            None => {
                let names: Vec<&str> = self.steps.iter().map(Step::name).collect();
                format!("plan:{}", names.join("+"))
            }
        }
    }

    /// Runs every step in order. A failing mandatory step stops the plan and
    /// the result is `false`; the caller must then discard `tx`.
    pub fn run(&self, tx: &mut Transaction, mode: ExecMode) -> bool {
        for (ix, step) in self.steps.iter().enumerate() {
            let ok = step.run(tx, mode);
            if !ok && !step.is_cosmetic() {
                tracing::debug!(step = step.name(), index = ix, ?mode, "plan step failed");
                return false;
            }
        }
        true
    }
}

impl From<Step> for Plan {
    fn from(step: Step) -> Self {
        Self {
            steps: vec![step],
            source: None,
        }
    }
}

impl From<Vec<Step>> for Plan {
    fn from(steps: Vec<Step>) -> Self {
        Self {
            steps,
            source: None,
        }
    }
}
