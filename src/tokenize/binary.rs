//! Tokenizer for the binary FBX container.
//!
//! Node records are: end offset, property count, property list length (all
//! three 8 bytes wide from version 7500 on, 4 bytes before), a
//! length-prefixed identifier, the properties, and an optional children
//! block closed by a fixed all-zero sentinel (25 bytes from 7500, 13
//! before). A zero end offset terminates a sibling list. The walk uses an
//! explicit frame stack instead of call recursion, so nesting depth is
//! bounded by the heap, not the call stack.

use log::trace;

use crate::cursor::Cursor;
use crate::data::DataView;
use crate::error::Error;
use crate::tree::{prop, Element, ElementId, Property, Tree};

use super::MAGIC;

fn read_offset(cur: &mut Cursor<'_>, version: u32) -> Result<u64, Error> {
    if version >= 7500 {
        cur.read_u64()
    } else {
        cur.read_u32().map(u64::from)
    }
}

fn sentinel_len(version: u32) -> u64 {
    if version >= 7500 {
        25
    } else {
        13
    }
}

fn read_property<'a>(cur: &mut Cursor<'a>) -> Result<Property<'a>, Error> {
    let type_code = cur.read_u8()?;
    let mut count = 0u32;
    let value = match type_code {
        prop::STRING => cur.read_long_string()?,
        prop::INT16 => cur.take(2)?,
        prop::BOOL => cur.take(1)?,
        prop::INT32 | prop::FLOAT => cur.take(4)?,
        prop::DOUBLE | prop::LONG => cur.take(8)?,
        prop::RAW => {
            // span keeps the 4-byte length prefix in front of the payload
            let mark = *cur;
            let len = cur.read_u32()?;
            cur.skip(len as usize)?;
            let mut whole = mark;
            whole.take(4 + len as usize)?
        }
        prop::ARRAY_BOOL
        | prop::ARRAY_FLOAT
        | prop::ARRAY_DOUBLE
        | prop::ARRAY_LONG
        | prop::ARRAY_INT => {
            // span covers the count/encoding/length header plus the payload
            let mark = *cur;
            count = cur.read_u32()?;
            let _encoding = cur.read_u32()?;
            let comp_len = cur.read_u32()?;
            cur.skip(comp_len as usize)?;
            let mut whole = mark;
            whole.take(12 + comp_len as usize)?
        }
        other => return Err(Error::UnknownPropertyType(other)),
    };
    Ok(Property {
        type_code,
        count,
        value: DataView::binary(value),
    })
}

pub(crate) fn tokenize(data: &[u8]) -> Result<Tree<'_>, Error> {
    let mut cur = Cursor::new(data);
    if cur.take(MAGIC.len())? != MAGIC.as_slice() {
        return Err(Error::MalformedSyntax(0));
    }
    cur.skip(2)?; // reserved
    let version = cur.read_u32()?;
    trace!("binary fbx, version {version}");

    let sentinel = sentinel_len(version);
    let mut tree = Tree::new();
    // (element, declared end offset) for every open children block
    let mut stack: Vec<(ElementId, u64)> = Vec::new();

    loop {
        // close every frame whose children region is exhausted
        while let Some(&(elem, end)) = stack.last() {
            if (cur.pos() as u64) < end - sentinel {
                break;
            }
            let pad = cur.take(sentinel as usize)?;
            if pad.iter().any(|&b| b != 0) {
                return Err(Error::OutOfRange);
            }
            trace!("closed {:?}", tree.get(elem).id.to_string_lossy());
            stack.pop();
        }

        let end_offset = read_offset(&mut cur, version)?;
        if end_offset == 0 {
            match stack.pop() {
                // end of the top-level sibling list: the document is done,
                // trailing footer bytes are not interpreted
                None => return Ok(tree),
                // end of a nested sibling list
                Some(_) => continue,
            }
        }

        let prop_count = read_offset(&mut cur, version)?;
        let _prop_length = read_offset(&mut cur, version)?;
        let id = cur.read_short_string()?;

        let mut element = Element {
            id: DataView::binary(id),
            properties: Vec::with_capacity((prop_count as usize).min(64)),
            children: Vec::new(),
        };
        for _ in 0..prop_count {
            element.properties.push(read_property(&mut cur)?);
        }

        let parent = stack.last().map_or(Tree::ROOT, |f| f.0);
        let elem = tree.push(parent, element);

        if (cur.pos() as u64) < end_offset {
            // the children block must leave room for its sentinel
            if end_offset < cur.pos() as u64 + sentinel {
                return Err(Error::OutOfRange);
            }
            stack.push((elem, end_offset));
        }
    }
}

// --- test document construction ---------------------------------------

#[cfg(test)]
pub(crate) fn test_doc(version: u32, nodes: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
    let mut buf = MAGIC.to_vec();
    buf.extend([0x1a, 0x00]);
    buf.extend(version.to_le_bytes());
    nodes(&mut buf);
    if version >= 7500 {
        buf.extend(0u64.to_le_bytes());
    } else {
        buf.extend(0u32.to_le_bytes());
    }
    buf
}

/// Emits one v7400-layout node, patching its end offset afterwards.
#[cfg(test)]
pub(crate) fn test_node(
    buf: &mut Vec<u8>,
    name: &[u8],
    prop_count: u32,
    props: &[u8],
    children: Option<&dyn Fn(&mut Vec<u8>)>,
) {
    let start = buf.len();
    buf.extend(0u32.to_le_bytes());
    buf.extend(prop_count.to_le_bytes());
    buf.extend((props.len() as u32).to_le_bytes());
    buf.push(name.len() as u8);
    buf.extend_from_slice(name);
    buf.extend_from_slice(props);
    if let Some(ch) = children {
        ch(buf);
        buf.extend([0u8; 13]);
    }
    let end = buf.len() as u32;
    buf[start..start + 4].copy_from_slice(&end.to_le_bytes());
}

#[cfg(test)]
pub(crate) fn test_prop_i64(v: i64) -> Vec<u8> {
    let mut b = vec![b'L'];
    b.extend(v.to_le_bytes());
    b
}

#[cfg(test)]
pub(crate) fn test_prop_str(s: &str) -> Vec<u8> {
    let mut b = vec![b'S'];
    b.extend((s.len() as u32).to_le_bytes());
    b.extend_from_slice(s.as_bytes());
    b
}

#[test]
fn test_empty_document() {
    let doc = test_doc(7400, |_| {});
    let tree = tokenize(&doc).unwrap();
    assert_eq!(tree.children(Tree::ROOT).count(), 0);
}

#[test]
fn test_single_leaf_node() {
    let mut props = test_prop_i64(9000);
    props.extend(test_prop_str("hello"));
    let doc = test_doc(7400, |b| test_node(b, b"Thing", 2, &props, None));
    let tree = tokenize(&doc).unwrap();
    let el = tree.find_child(Tree::ROOT, "Thing").unwrap();
    let el = tree.get(el);
    assert_eq!(el.properties.len(), 2);
    assert_eq!(el.property(0).unwrap().value.to_i64(), 9000);
    assert!(el.property(1).unwrap().value == "hello");
    assert!(el.property(1).unwrap().is_string());
}

#[test]
fn test_nested_nodes() {
    let doc = test_doc(7400, |b| {
        test_node(
            b,
            b"Objects",
            0,
            &[],
            Some(&|b: &mut Vec<u8>| {
                test_node(b, b"A", 1, &test_prop_i64(1), None);
                test_node(b, b"B", 1, &test_prop_i64(2), None);
            }),
        );
    });
    let tree = tokenize(&doc).unwrap();
    let objs = tree.find_child(Tree::ROOT, "Objects").unwrap();
    let kids: Vec<_> = tree
        .children(objs)
        .map(|c| tree.get(c).id.to_string_lossy())
        .collect();
    assert_eq!(kids, vec!["A", "B"]);
}

#[test]
fn test_sentinel_must_fit() {
    // node claims a children block but its end offset leaves no room for
    // the 13-byte sentinel
    let mut doc = MAGIC.to_vec();
    doc.extend([0x1a, 0x00]);
    doc.extend(7400u32.to_le_bytes());
    let start = doc.len();
    doc.extend(0u32.to_le_bytes());
    doc.extend(0u32.to_le_bytes()); // prop count
    doc.extend(0u32.to_le_bytes()); // prop length
    doc.push(1);
    doc.push(b'X');
    // end offset points 1 byte past the header: children region too small
    let end = (doc.len() + 1) as u32;
    doc[start..start + 4].copy_from_slice(&end.to_le_bytes());
    doc.push(0);
    assert_eq!(tokenize(&doc), Err(Error::OutOfRange));
}

#[test]
fn test_truncated_property_fails() {
    // array property whose declared byte length runs past the buffer
    let mut props = vec![b'i'];
    props.extend(4u32.to_le_bytes()); // count
    props.extend(0u32.to_le_bytes()); // raw encoding
    props.extend(u32::MAX.to_le_bytes()); // absurd compressed length
    let doc = test_doc(7400, |b| test_node(b, b"Bad", 1, &props, None));
    assert_eq!(tokenize(&doc), Err(Error::OutOfRange));
}

#[test]
fn test_wide_offsets_v7500() {
    let mut doc = MAGIC.to_vec();
    doc.extend([0x1a, 0x00]);
    doc.extend(7500u32.to_le_bytes());
    let start = doc.len();
    doc.extend(0u64.to_le_bytes());
    doc.extend(1u64.to_le_bytes()); // prop count
    doc.extend(9u64.to_le_bytes()); // prop length
    doc.push(4);
    doc.extend_from_slice(b"Node");
    doc.extend(test_prop_i64(-7));
    let end = doc.len() as u64;
    doc[start..start + 8].copy_from_slice(&end.to_le_bytes());
    doc.extend(0u64.to_le_bytes());
    let tree = tokenize(&doc).unwrap();
    let el = tree.find_child(Tree::ROOT, "Node").unwrap();
    assert_eq!(tree.get(el).property(0).unwrap().value.to_i64(), -7);
}
