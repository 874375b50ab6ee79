//! The format-neutral parse result: a tree of identified elements, each with
//! an ordered property list and ordered children.
//!
//! Storage is a flat arena indexed by [`ElementId`]. Children and properties
//! are ordinary `Vec`s, so property position keeps its meaning (the class
//! tag of a `Model` element is its 3rd property, and so on) and dropping a
//! tree is a flat deallocation — an adversarially deep document cannot
//! overflow the stack on teardown.

use crate::data::DataView;

pub type ElementId = usize;

/// Binary scalar property type codes and their payload widths.
pub mod prop {
    pub const INT16: u8 = b'Y';
    pub const BOOL: u8 = b'C';
    pub const INT32: u8 = b'I';
    pub const FLOAT: u8 = b'F';
    pub const DOUBLE: u8 = b'D';
    pub const LONG: u8 = b'L';
    pub const STRING: u8 = b'S';
    pub const RAW: u8 = b'R';
    pub const ARRAY_BOOL: u8 = b'b';
    pub const ARRAY_FLOAT: u8 = b'f';
    pub const ARRAY_DOUBLE: u8 = b'd';
    pub const ARRAY_LONG: u8 = b'l';
    pub const ARRAY_INT: u8 = b'i';
}

/// One typed value or homogeneous array attached to an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Property<'a> {
    pub type_code: u8,
    /// Element count for array properties, 0 otherwise.
    pub count: u32,
    pub value: DataView<'a>,
}

impl Property<'_> {
    pub fn is_string(&self) -> bool {
        self.type_code == prop::STRING
    }

    pub fn is_long(&self) -> bool {
        self.type_code == prop::LONG
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self.type_code,
            prop::ARRAY_BOOL
                | prop::ARRAY_FLOAT
                | prop::ARRAY_DOUBLE
                | prop::ARRAY_LONG
                | prop::ARRAY_INT
        )
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct Element<'a> {
    pub id: DataView<'a>,
    pub properties: Vec<Property<'a>>,
    pub children: Vec<ElementId>,
}

impl<'a> Element<'a> {
    /// Property at `idx`, in declaration order.
    pub fn property(&self, idx: usize) -> Option<&Property<'a>> {
        self.properties.get(idx)
    }

    pub fn first_property(&self) -> Option<&Property<'a>> {
        self.properties.first()
    }

    pub fn last_property(&self) -> Option<&Property<'a>> {
        self.properties.last()
    }
}

/// Arena-backed element tree. Index 0 is the synthetic root.
#[derive(Debug, PartialEq)]
pub struct Tree<'a> {
    elements: Vec<Element<'a>>,
}

impl<'a> Tree<'a> {
    pub const ROOT: ElementId = 0;

    pub(crate) fn new() -> Self {
        Tree {
            elements: vec![Element::default()],
        }
    }

    pub fn get(&self, id: ElementId) -> &Element<'a> {
        &self.elements[id]
    }

    pub(crate) fn get_mut(&mut self, id: ElementId) -> &mut Element<'a> {
        &mut self.elements[id]
    }

    /// Appends `element` as the last child of `parent`.
    pub(crate) fn push(&mut self, parent: ElementId, element: Element<'a>) -> ElementId {
        let id = self.elements.len();
        self.elements.push(element);
        self.elements[parent].children.push(id);
        id
    }

    pub fn children(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        self.get(id).children.iter().copied()
    }

    /// First direct child whose identifier equals `name`.
    pub fn find_child(&self, id: ElementId, name: &str) -> Option<ElementId> {
        self.children(id).find(|&c| self.get(c).id == name)
    }

    /// First property of the first direct child named `name`, the most
    /// common lookup shape in the resolver.
    pub fn child_property(&self, id: ElementId, name: &str) -> Option<&Property<'a>> {
        self.find_child(id, name)
            .and_then(|c| self.get(c).first_property())
    }
}

#[test]
fn test_tree_ordering() {
    let mut t = Tree::new();
    let a = t.push(
        Tree::ROOT,
        Element {
            id: DataView::text(b"A"),
            ..Default::default()
        },
    );
    let _b = t.push(
        Tree::ROOT,
        Element {
            id: DataView::text(b"B"),
            ..Default::default()
        },
    );
    let a0 = t.push(
        a,
        Element {
            id: DataView::text(b"Sub"),
            ..Default::default()
        },
    );
    assert_eq!(t.find_child(Tree::ROOT, "B"), Some(2));
    assert_eq!(t.find_child(a, "Sub"), Some(a0));
    assert_eq!(t.find_child(a, "Nope"), None);
    let kids: Vec<_> = t.children(Tree::ROOT).collect();
    assert_eq!(kids, vec![1, 2]);
}
