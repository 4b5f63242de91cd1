use manos_plate_core::{Document, Editor, Node, PluginRegistry, Selection};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

fn item(text: &str) -> Node {
    Node::element("list_item", vec![Node::paragraph(text)])
}

#[rstest]
#[case::bullet("list.toggle_bullet", "bullet_list")]
#[case::ordered("list.toggle_ordered", "ordered_list")]
#[case::task("list.toggle_task", "task_list")]
fn toggle_commands_switch_lists_on_and_off(#[case] command: &str, #[case] list: &str) {
    let mut editor = Editor::with_richtext_plugins();

    editor.run_command(command, None).unwrap();
    assert_eq!(
        editor
            .run_query::<Option<String>>("list.active_type", None)
            .unwrap()
            .as_deref(),
        Some(list)
    );
    assert!(
        editor
            .run_query::<bool>("list.is_active", Some(json!({ "type": list })))
            .unwrap()
    );

    editor.run_command(command, None).unwrap();
    assert_eq!(
        editor
            .run_query::<Option<String>>("list.active_type", None)
            .unwrap(),
        None
    );
    assert_eq!(editor.doc(), &Document::new(vec![Node::paragraph("")]));
}

#[test]
fn generic_toggle_takes_attrs_and_defaults_the_item_type() {
    let mut editor = Editor::with_richtext_plugins();

    editor
        .run_command(
            "list.toggle",
            Some(json!({ "list": "ordered_list", "attrs": { "start": 3 } })),
        )
        .unwrap();

    let Node::Element(list) = &editor.doc().children[0] else {
        panic!("expected list element");
    };
    assert_eq!(list.kind, "ordered_list");
    assert_eq!(list.attrs.get("start").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(list.children[0].kind(), "list_item");
}

#[test]
fn generic_toggle_reports_unknown_types() {
    let mut editor = Editor::with_richtext_plugins();

    let err = editor
        .run_command("list.toggle", Some(json!({ "list": "nope" })))
        .unwrap_err();
    assert_eq!(err.message(), "unknown node type: nope");

    let err = editor.run_command("list.toggle", None).unwrap_err();
    assert_eq!(err.message(), "Missing args");
}

#[test]
fn failed_toggle_is_a_command_error() {
    let doc = Document::new(vec![Node::paragraph("a")]);
    let mut editor = Editor::new(doc, Selection::collapsed(0), PluginRegistry::richtext());

    let err = editor.run_command("list.toggle_bullet", None).unwrap_err();
    assert_eq!(err.message(), "Cannot toggle bullet_list here");
}

#[test]
fn lift_and_wrap_commands() {
    let mut editor = Editor::with_core_plugins();

    editor
        .run_command("list.wrap", Some(json!({ "list": "bullet_list" })))
        .unwrap();
    assert_eq!(
        editor.doc(),
        &Document::new(vec![Node::element("bullet_list", vec![item("")])])
    );

    editor.run_command("list.lift", None).unwrap();
    assert_eq!(editor.doc(), &Document::new(vec![Node::paragraph("")]));

    assert!(editor.run_command("list.lift", None).is_err());
}

#[test]
fn can_toggle_query_matches_the_command() {
    let doc = Document::new(vec![Node::paragraph("a")]);
    let mut editor = Editor::new(doc, Selection::collapsed(1), PluginRegistry::richtext());

    assert!(
        editor
            .run_query::<bool>("list.can_toggle", Some(json!({ "list": "task_list" })))
            .unwrap()
    );

    editor.set_selection(Selection::collapsed(0));
    assert!(
        !editor
            .run_query::<bool>("list.can_toggle", Some(json!({ "list": "task_list" })))
            .unwrap()
    );
}

#[test]
fn typed_text_goes_through_the_insert_command() {
    let mut editor = Editor::with_core_plugins();

    editor
        .run_command("text.insert", Some(json!({ "text": "hi" })))
        .unwrap();
    assert_eq!(editor.doc(), &Document::new(vec![Node::paragraph("hi")]));
    assert_eq!(editor.selection(), &Selection::collapsed(3));
}

#[test]
fn unknown_commands_and_queries_are_errors() {
    let mut editor = Editor::with_core_plugins();

    assert_eq!(
        editor.run_command("nope", None).unwrap_err().message(),
        "Unknown command: nope"
    );
    assert_eq!(
        editor.run_query_json("nope", None).unwrap_err().message(),
        "Unknown query: nope"
    );
    // Task lists belong to the rich text registry only.
    assert!(editor.registry().command("list.toggle_task").is_none());
    assert!(!editor.registry().is_known_kind("task_list"));
}

#[test]
fn registry_rejects_duplicate_plugins() {
    use manos_plate_core::{CommandSpec, PlatePlugin, SchemaError};

    struct Shadow;

    impl PlatePlugin for Shadow {
        fn id(&self) -> &'static str {
            "shadow"
        }

        fn commands(&self) -> Vec<CommandSpec> {
            vec![CommandSpec::new("list.toggle_bullet", "Shadow", |_editor, _args| Ok(()))]
        }
    }

    let base = PluginRegistry::core();
    assert!(base.plugin_ids().contains(&"list"));

    let plugins: Vec<Box<dyn PlatePlugin>> = vec![Box::new(Shadow), Box::new(Shadow)];
    let err = match PluginRegistry::new(plugins) {
        Ok(_) => panic!("duplicate plugin ids must be rejected"),
        Err(err) => err,
    };
    assert_eq!(
        err,
        SchemaError::Duplicate {
            what: "plugin id",
            id: "shadow".to_string()
        }
    );
}
