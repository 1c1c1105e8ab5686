//! Structural edits through the document facade.

use blockwork::{Block, Cell, Document, Node};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn block_of(cell: &Cell) -> Block {
    cell.peek().unwrap().expect_block().unwrap().clone()
}

/// `{a: 1, b: 2}` followed by items `[3, 4]`, placed in the document root.
fn sample(document: &Document) -> (Cell, [Cell; 4]) {
    let cells = [
        document.number(1.0),
        document.number(2.0),
        document.number(3.0),
        document.number(4.0),
    ];
    let [a, b, c, d] = cells.clone();
    let block = document.block([("a", a), ("b", b)], [c, d]).unwrap();
    document
        .set(document.root(), Node::Block(Block::from_items([block.clone()])))
        .unwrap();
    (block, cells)
}

#[test]
fn canonical_order_is_values_then_items() {
    init();
    let document = Document::default();
    let (block, cells) = sample(&document);
    let children: Vec<Cell> = block_of(&block).children().cloned().collect();
    assert_eq!(children, cells);
}

#[test]
fn wrap_then_unwrap_restores_identity_and_parent() {
    init();
    let document = Document::default();
    let (block, [_, _, item, _]) = sample(&document);

    assert_eq!(document.wrap_with_block(&item), Ok(item.clone()));
    let wrapper = document.scope().parent_of(&item).unwrap();
    assert_ne!(wrapper, block);
    assert_eq!(document.scope().parent_of(&wrapper), Some(block.clone()));
    assert_eq!(block_of(&block).item(1), Some(&wrapper));

    assert_eq!(document.unwrap_block_if_single_child(&wrapper), Ok(item.clone()));
    assert_eq!(document.scope().parent_of(&item), Some(block.clone()));
    assert_eq!(block_of(&block).item(1), Some(&item));
    assert!(!document.scope().has_parent(&wrapper));
}

#[test]
fn wrapping_a_value_keeps_its_key() {
    init();
    let document = Document::default();
    let (block, [a, ..]) = sample(&document);

    document.wrap_with_block(&a).unwrap();
    let wrapper = block_of(&block).get("a").cloned().unwrap();
    assert_eq!(block_of(&wrapper).items(), &[a]);
}

#[test]
fn unwrap_requires_exactly_one_item_and_no_values() {
    init();
    let document = Document::default();
    let (block, _) = sample(&document);
    assert_eq!(document.unwrap_block_if_single_child(&block), Ok(block.clone()));

    let keyed = document
        .block([("only", document.number(1.0))], [])
        .unwrap();
    document.insert_after(&block, keyed.clone()).unwrap();
    assert_eq!(document.unwrap_block_if_single_child(&keyed), Ok(keyed.clone()));
}

#[test]
fn assign_key_then_remove_key_returns_the_item_to_the_front() {
    init();
    let document = Document::default();
    let (block, [a, b, c, d]) = sample(&document);

    assert_eq!(document.assign_key(&d, "d"), Ok(d.clone()));
    let keyed = block_of(&block);
    assert_eq!(keyed.get("d"), Some(&d));
    assert_eq!(keyed.items(), &[c.clone()]);

    assert_eq!(document.remove_key(&d), Ok(d.clone()));
    let restored = block_of(&block);
    assert!(!restored.contains_key("d"));
    assert_eq!(restored.items(), &[d, c]);
    assert_eq!(restored.values().len(), 2);
    assert_eq!(restored.get("a"), Some(&a));
    assert_eq!(restored.get("b"), Some(&b));
}

#[test]
fn assign_key_renames_values_in_place_and_ignores_collisions() {
    init();
    let document = Document::default();
    let (block, [a, b, c, _]) = sample(&document);

    document.assign_key(&a, "first").unwrap();
    let keys: Vec<_> = block_of(&block)
        .values()
        .iter()
        .map(|entry| entry.key.to_string())
        .collect();
    assert_eq!(keys, ["first", "b"]);

    let before = block_of(&block);
    assert_eq!(document.assign_key(&c, "b"), Ok(c.clone()));
    assert_eq!(block_of(&block), before);
    assert_eq!(before.get("b"), Some(&b));
}

#[test]
fn remove_key_on_an_item_is_a_no_op() {
    init();
    let document = Document::default();
    let (block, [_, _, c, _]) = sample(&document);
    let before = block_of(&block);
    assert_eq!(document.remove_key(&c), Ok(c.clone()));
    assert_eq!(block_of(&block), before);
}

#[test]
fn insert_around_items_and_values() {
    init();
    let document = Document::default();
    let (block, [a, _, c, d]) = sample(&document);

    let after_c = document.text("after c");
    assert_eq!(document.insert_after(&c, after_c.clone()), Ok(after_c.clone()));
    let before_a = document.text("before a");
    assert_eq!(document.insert_before(&a, before_a.clone()), Ok(before_a.clone()));

    assert_eq!(
        block_of(&block).items(),
        &[before_a.clone(), c, after_c.clone(), d]
    );
    assert_eq!(document.scope().parent_of(&before_a), Some(block.clone()));
    assert_eq!(document.scope().parent_of(&after_c), Some(block));
}

#[test]
fn remove_child_moves_focus_to_a_sibling_then_the_parent() {
    init();
    let document = Document::default();
    let (block, [a, b, c, d]) = sample(&document);

    assert_eq!(document.remove_child(&c), Ok(b.clone()));
    assert_eq!(document.remove_child(&a), Ok(b.clone()));
    assert_eq!(document.remove_child(&b), Ok(d.clone()));
    assert!(!document.scope().has_parent(&a));

    assert_eq!(document.remove_child(&d), Ok(block.clone()));
    assert!(block_of(&block).is_empty());
}

#[test]
fn the_only_child_of_the_root_hands_focus_to_the_root() {
    init();
    let document = Document::default();
    let only = document.number(1.0);
    document
        .set(document.root(), Node::Block(Block::from_items([only.clone()])))
        .unwrap();
    assert_eq!(document.remove_child(&only), Ok(document.root().clone()));
}

#[test]
fn readers_keep_their_snapshot() {
    init();
    let document = Document::default();
    let (block, [a, ..]) = sample(&document);
    let snapshot = block_of(&block);

    document.remove_child(&a).unwrap();
    assert_eq!(snapshot.len(), 4);
    assert_eq!(block_of(&block).len(), 3);
}

#[test]
fn inserting_into_a_sibling_block_moves_the_cell() {
    init();
    let document = Document::default();
    let (a, b) = (document.number(1.0), document.number(2.0));
    let left = document.block::<&str>([], [a.clone()]).unwrap();
    let right = document.block::<&str>([], [b.clone()]).unwrap();
    document
        .set(document.root(), Node::Block(Block::from_items([left.clone(), right.clone()])))
        .unwrap();

    assert_eq!(document.insert_after(&b, a.clone()), Ok(a.clone()));
    assert!(block_of(&left).is_empty());
    assert_eq!(block_of(&right).items(), &[b, a.clone()]);
    assert_eq!(document.scope().parent_of(&a), Some(right));
}
