use manos_plate_core::{
    Attrs, Document, Editor, ExecMode, Marks, Node, Plan, PluginRegistry, Selection, Step,
    ToggleList,
};
use pretty_assertions::assert_eq;

fn item(text: &str) -> Node {
    Node::element("list_item", vec![Node::paragraph(text)])
}

fn bold() -> Marks {
    Marks {
        bold: true,
        ..Marks::default()
    }
}

fn step_names(plan: &Plan) -> Vec<&'static str> {
    plan.steps().iter().map(Step::name).collect()
}

#[test]
fn wrap_plan_for_a_plain_paragraph() {
    let mut editor = Editor::with_richtext_plugins();
    editor.set_stored_marks(Some(bold()));
    let toggle = ToggleList::resolve(editor.schema(), "bullet_list", "list_item")
        .unwrap()
        .keep_marks(true);

    let commit = toggle.plan(&editor, ExecMode::Commit).unwrap();
    assert_eq!(
        step_names(&commit),
        vec!["wrap_in_list", "join_backward", "join_forward", "ensure_marks"]
    );
    assert_eq!(commit.source(), "command:list.toggle:wrap");

    // Mark retention has no place in a feasibility run.
    let feasibility = toggle.plan(&editor, ExecMode::Feasibility).unwrap();
    assert_eq!(
        step_names(&feasibility),
        vec!["wrap_in_list", "join_backward", "join_forward"]
    );
}

#[test]
fn blocks_that_cannot_be_wrapped_are_cleared_first() {
    let doc = Document::new(vec![Node::heading(1, "h")]);
    let editor = Editor::new(doc, Selection::collapsed(1), PluginRegistry::richtext());
    let toggle = ToggleList::resolve(editor.schema(), "bullet_list", "list_item").unwrap();

    let plan = toggle.plan(&editor, ExecMode::Commit).unwrap();
    assert_eq!(
        step_names(&plan),
        vec!["clear_nodes", "wrap_in_list", "join_backward", "join_forward"]
    );
}

#[test]
fn plans_inside_a_list() {
    let doc = Document::new(vec![Node::element("bullet_list", vec![item("a")])]);
    let editor = Editor::new(doc, Selection::collapsed(3), PluginRegistry::richtext());
    let schema = editor.schema();

    let unwrap = ToggleList::resolve(schema, "bullet_list", "list_item").unwrap();
    let plan = unwrap.plan(&editor, ExecMode::Commit).unwrap();
    assert_eq!(step_names(&plan), vec!["lift_list_item"]);

    let retype = ToggleList::resolve(schema, "ordered_list", "list_item").unwrap();
    let plan = retype.plan(&editor, ExecMode::Commit).unwrap();
    assert_eq!(
        step_names(&plan),
        vec!["set_node_type", "join_backward", "join_forward"]
    );
    assert_eq!(
        plan.steps()[0],
        Step::SetNodeType {
            pos: 0,
            node_type: schema.node_type("ordered_list").unwrap(),
        }
    );
}

#[test]
fn no_plan_without_a_block_range() {
    let doc = Document::new(vec![Node::paragraph("a")]);
    let editor = Editor::new(doc, Selection::collapsed(0), PluginRegistry::core());
    let toggle = ToggleList::resolve(editor.schema(), "bullet_list", "list_item").unwrap();

    assert!(toggle.plan(&editor, ExecMode::Commit).is_none());
    assert!(!toggle.can_run(&editor));
}

#[test]
fn failed_mandatory_step_discards_the_draft() {
    let doc = Document::new(vec![Node::paragraph("a")]);
    let mut editor = Editor::new(doc, Selection::collapsed(1), PluginRegistry::core());
    let list = editor.schema().node_type("bullet_list").unwrap();

    // Wrapping succeeds, then lifting from the wrong item type fails.
    let plan = Plan::from(vec![
        Step::WrapInList {
            list,
            attrs: Attrs::default(),
        },
        Step::LiftListItem {
            item: editor.schema().node_type("paragraph").unwrap(),
        },
    ]);
    assert!(!editor.can(&plan));
    assert!(!editor.commit(&plan));
    assert_eq!(editor.doc(), &Document::new(vec![Node::paragraph("a")]));
    assert_eq!(editor.selection(), &Selection::collapsed(1));
}

#[test]
fn joins_never_fail_a_plan() {
    let editor = Editor::with_core_plugins();
    let list = editor.schema().node_type("bullet_list").unwrap();
    let plan = Plan::from(vec![
        Step::JoinBackward { list: list.clone() },
        Step::JoinForward { list },
    ]);

    assert!(plan.steps().iter().all(Step::is_cosmetic));
    assert!(editor.can(&plan));
    assert_eq!(plan.source(), "plan:join_backward+join_forward");
}

#[test]
fn ensure_marks_only_acts_when_committing() {
    let editor = Editor::with_core_plugins();
    let plan = Plan::from(Step::EnsureMarks(bold()));

    let mut tx = editor.transaction();
    assert!(plan.run(&mut tx, ExecMode::Feasibility));
    assert_eq!(tx.stored_marks(), None);

    let mut tx = editor.transaction();
    assert!(plan.run(&mut tx, ExecMode::Commit));
    assert_eq!(tx.stored_marks(), Some(&bold()));
}
