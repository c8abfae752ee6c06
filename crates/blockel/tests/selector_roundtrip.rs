use blockel::app::synthesize::synthesize;
use blockel::domain::dom::Document;
use proptest::prelude::*;

const TAGS: &[&str] = &["div", "span", "p", "li", "section"];
const IDS: &[&str] = &["main", "nav", "2col"];
const CLASSES: &[&str] = &["item", "ad", "row", "a:b", "2col"];

#[derive(Debug, Clone)]
struct NodeSpec {
    parent: usize,
    tag: &'static str,
    id: Option<&'static str>,
    classes: Vec<&'static str>,
}

fn node_spec() -> impl Strategy<Value = NodeSpec> {
    (
        any::<usize>(),
        prop::sample::select(TAGS),
        prop::option::weighted(0.2, prop::sample::select(IDS)),
        prop::sample::subsequence(CLASSES, 0..=3),
    )
        .prop_map(|(parent, tag, id, classes)| NodeSpec {
            parent,
            tag,
            id,
            classes,
        })
}

fn without_id() -> impl Strategy<Value = NodeSpec> {
    node_spec().prop_map(|spec| NodeSpec { id: None, ..spec })
}

fn build(specs: &[NodeSpec]) -> Document {
    let mut doc = Document::new("https://shop.example.com/").unwrap();
    let mut parents = vec![doc.body()];
    for spec in specs {
        let parent = parents[spec.parent % parents.len()];
        let class = spec.classes.join(" ");
        let mut attrs: Vec<(&str, &str)> = Vec::new();
        if let Some(id) = spec.id {
            attrs.push(("id", id));
        }
        if !class.is_empty() {
            attrs.push(("class", class.as_str()));
        }
        let node = doc.append_element(parent, spec.tag, &attrs);
        parents.push(node);
    }
    doc
}

proptest! {
    #[test]
    fn synthesized_selectors_select_only_their_element(
        specs in prop::collection::vec(node_spec(), 1..40)
    ) {
        let doc = build(&specs);
        for element in doc.elements() {
            let selector = synthesize(&doc, element);
            let matches = doc.query_selector_all(&selector).unwrap();
            prop_assert_eq!(matches, vec![element], "{}", selector);
        }
    }

    #[test]
    fn synthesized_selectors_are_unique_in_trees_without_ids(
        specs in prop::collection::vec(without_id(), 1..40)
    ) {
        let doc = build(&specs);
        for element in doc.elements() {
            let selector = synthesize(&doc, element);
            let matches = doc.query_selector_all(&selector).unwrap();
            prop_assert_eq!(matches, vec![element], "{}", selector);
        }
    }
}
