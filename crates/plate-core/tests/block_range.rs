use manos_plate_core::{Document, Node, PluginRegistry, find_parent_node};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn doc() -> Document {
    // p "ab" 0..4, list 4..12 with item 5..11 holding p "cd" 6..10
    Document::new(vec![
        Node::paragraph("ab"),
        Node::element(
            "bullet_list",
            vec![Node::element("list_item", vec![Node::paragraph("cd")])],
        ),
    ])
}

#[test]
fn sizes_follow_the_token_model() {
    let doc = doc();
    assert_eq!(doc.children[0].size(), 4);
    assert_eq!(doc.children[1].size(), 8);
    assert_eq!(doc.content_size(), 12);
    assert_eq!(Node::divider().size(), 1);
}

#[rstest]
#[case(0, 0, 0)]
#[case(2, 1, 0)]
#[case(4, 0, 1)]
#[case(5, 1, 0)]
#[case(8, 3, 0)]
#[case(12, 0, 2)]
fn resolves_depth_and_index(#[case] pos: usize, #[case] depth: usize, #[case] index: usize) {
    let doc = doc();
    let resolved = doc.resolve(pos).unwrap();
    assert_eq!(resolved.depth(), depth);
    assert_eq!(resolved.index(depth), index);
}

#[test]
fn positions_past_the_end_do_not_resolve() {
    assert!(doc().resolve(13).is_none());
}

#[test]
fn ancestors_report_their_boundaries() {
    let doc = doc();
    let pos = doc.resolve(8).unwrap();

    assert_eq!(pos.parent().kind(), "paragraph");
    assert_eq!(pos.start(3), 7);
    assert_eq!(pos.end(3), 9);
    assert_eq!(pos.before(1), Some(4));
    assert_eq!(pos.after(1), Some(12));
    assert_eq!(pos.before(0), None);
    assert_eq!(pos.parent_offset(), 1);
    assert_eq!(pos.text_offset(), 1);
}

#[test]
fn finds_the_nearest_matching_ancestor() {
    let doc = doc();
    let pos = doc.resolve(8).unwrap();

    let list = find_parent_node(&pos, |el| el.kind == "bullet_list").unwrap();
    assert_eq!(list.depth, 1);
    assert_eq!(list.pos, 4);
    assert_eq!(list.start, 5);
    assert_eq!(list.end(), 12);

    assert!(find_parent_node(&pos, |el| el.kind == "blockquote").is_none());
}

#[test]
fn block_range_of_a_caret_in_a_text_block_is_its_parent() {
    let registry = PluginRegistry::core();
    let doc = doc();
    let pos = doc.resolve(8).unwrap();

    let range = pos.block_range(&pos, registry.schema()).unwrap();
    assert_eq!(range.depth, 2);
    assert_eq!(range.parent().kind(), "list_item");
    assert_eq!((range.start_index(), range.end_index()), (0, 1));
    assert_eq!((range.start(), range.end()), (6, 10));
}

#[test]
fn block_range_across_blocks_climbs_to_the_shared_parent() {
    let registry = PluginRegistry::core();
    let doc = doc();
    let from = doc.resolve(2).unwrap();
    let to = doc.resolve(8).unwrap();

    let range = from.block_range(&to, registry.schema()).unwrap();
    assert_eq!(range.depth, 0);
    assert_eq!((range.start_index(), range.end_index()), (0, 2));
    assert_eq!(range.parent_path(), Vec::<usize>::new());
}

#[test]
fn caret_at_the_root_has_no_block_range() {
    let registry = PluginRegistry::core();
    let doc = doc();
    let pos = doc.resolve(4).unwrap();

    assert!(pos.block_range(&pos, registry.schema()).is_none());
}
