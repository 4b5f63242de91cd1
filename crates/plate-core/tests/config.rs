use manos_plate_core::{
    Attrs, Document, Editor, EditorConfig, MarkKind, Marks, Node, PluginRegistry, Selection,
};
use pretty_assertions::assert_eq;

#[test]
fn defaults_fill_missing_fields() {
    let config = EditorConfig::from_json_str("{}").unwrap();

    assert_eq!(config.list_group, "list");
    assert_eq!(config.default_block, "paragraph");
    assert_eq!(config.unsplittable_marks(), &[MarkKind::Link]);
}

#[test]
fn json_overrides_are_kept() {
    let config =
        EditorConfig::from_json_str(r#"{ "unsplittable_marks": ["link", "bold"] }"#).unwrap();

    assert_eq!(config.list_group, "list");
    assert_eq!(
        config.unsplittable_marks(),
        &[MarkKind::Link, MarkKind::Bold]
    );
}

#[test]
fn malformed_json_is_rejected() {
    assert!(EditorConfig::from_json_str(r#"{ "unsplittable_marks": ["blink"] }"#).is_err());
}

#[test]
fn unsplittable_marks_are_not_retained() {
    let config =
        EditorConfig::from_json_str(r#"{ "unsplittable_marks": ["bold"] }"#).unwrap();
    let doc = Document::new(vec![Node::paragraph("")]);
    let mut editor =
        Editor::with_config(doc, Selection::collapsed(1), PluginRegistry::core(), config);
    editor.set_stored_marks(Some(Marks {
        bold: true,
        italic: true,
        ..Marks::default()
    }));

    assert!(
        editor
            .toggle_list("bullet_list", "list_item", true, Attrs::default())
            .unwrap()
    );
    assert_eq!(
        editor.stored_marks(),
        Some(&Marks {
            italic: true,
            ..Marks::default()
        })
    );
}

#[test]
fn list_group_decides_what_counts_as_a_list() {
    // With no list group, a caret in a list is treated like any other block:
    // the toggle clears it out and wraps it again instead of unwrapping.
    let config = EditorConfig::from_json_str(r#"{ "list_group": "none" }"#).unwrap();
    let list = Node::element(
        "bullet_list",
        vec![Node::element("list_item", vec![Node::paragraph("a")])],
    );
    let doc = Document::new(vec![list.clone()]);
    let mut editor =
        Editor::with_config(doc, Selection::collapsed(3), PluginRegistry::core(), config);

    assert!(
        editor
            .toggle_list("bullet_list", "list_item", false, Attrs::default())
            .unwrap()
    );
    assert_eq!(editor.doc(), &Document::new(vec![list]));
}
