use manos_plate_core::{Document, Editor, Node, PluginRegistry, Selection};
use pretty_assertions::assert_eq;

fn item(children: Vec<Node>) -> Node {
    Node::element("list_item", children)
}

fn text_item(text: &str) -> Node {
    item(vec![Node::paragraph(text)])
}

fn bullet(items: Vec<Node>) -> Node {
    Node::element("bullet_list", items)
}

fn editor(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document::new(children), selection, PluginRegistry::core())
}

fn nested() -> Vec<Node> {
    // outer 0..19: item 1..18 holding p "a" 2..5 and inner list 5..17,
    // whose items "b" and "c" have their text at 8 and 13.
    vec![bullet(vec![item(vec![
        Node::paragraph("a"),
        bullet(vec![text_item("b"), text_item("c")]),
    ])])]
}

#[test]
fn nested_item_outdents_into_the_outer_list() {
    let mut editor = editor(nested(), Selection::collapsed(8));

    assert!(editor.lift_list_item("list_item").unwrap());
    assert_eq!(
        editor.doc(),
        &Document::new(vec![bullet(vec![
            text_item("a"),
            item(vec![Node::paragraph("b"), bullet(vec![text_item("c")])]),
        ])])
    );
    assert_eq!(editor.selection(), &Selection::collapsed(8));
}

#[test]
fn toggling_the_same_kind_inside_a_nested_list_outdents() {
    let mut editor = editor(nested(), Selection::collapsed(13));

    assert!(
        editor
            .toggle_list("bullet_list", "list_item", false, Default::default())
            .unwrap()
    );
    assert_eq!(
        editor.doc(),
        &Document::new(vec![bullet(vec![
            item(vec![Node::paragraph("a"), bullet(vec![text_item("b")])]),
            text_item("c"),
        ])])
    );
}

#[test]
fn blocks_after_a_nested_list_keep_their_place() {
    // outer item 1..: p "a" 2..5, inner list 5..12 with "b" at 8, then p "z"
    let mut editor = editor(
        vec![bullet(vec![item(vec![
            Node::paragraph("a"),
            bullet(vec![text_item("b")]),
            Node::paragraph("z"),
        ])])],
        Selection::collapsed(8),
    );

    assert!(
        editor
            .toggle_list("bullet_list", "list_item", false, Default::default())
            .unwrap()
    );
    assert_eq!(
        editor.doc(),
        &Document::new(vec![bullet(vec![
            text_item("a"),
            item(vec![Node::paragraph("b"), Node::paragraph("z")]),
        ])])
    );
    assert_eq!(editor.doc().children[0].text_content(), "abz");
    assert_eq!(editor.selection(), &Selection::collapsed(7));
}

#[test]
fn middle_item_splits_a_top_level_list() {
    // items "a", "b", "c" have their text at 3, 8 and 13
    let mut editor = editor(
        vec![bullet(vec![text_item("a"), text_item("b"), text_item("c")])],
        Selection::collapsed(8),
    );

    assert!(editor.lift_list_item("list_item").unwrap());
    assert_eq!(
        editor.doc(),
        &Document::new(vec![
            bullet(vec![text_item("a")]),
            Node::paragraph("b"),
            bullet(vec![text_item("c")]),
        ])
    );
    assert_eq!(editor.selection(), &Selection::collapsed(8));
}

#[test]
fn lifting_outside_a_list_fails() {
    let mut editor = editor(vec![Node::paragraph("a")], Selection::collapsed(1));

    assert!(!editor.lift_list_item("list_item").unwrap());
    assert_eq!(editor.doc(), &Document::new(vec![Node::paragraph("a")]));
}
