//! Tokenizer for the legacy ASCII FBX dialect.
//!
//! Produces the same tree shape as the binary tokenizer. A node is
//! `identifier ':' property-list ('{' children '}')?`; the property list
//! ends at an un-braced newline or at the opening brace. `;` starts a
//! line comment. Property kinds are decided by the leading character:
//! `"` quoted string, digit/`-` numeric literal (upgraded from integer to
//! float when a `.` appears), `T`/`Y` one-byte sentinel tokens, and
//! `*count { a: v0,v1,... }` inline arrays. Anything else is a fatal
//! syntax error, with no recovery.

use crate::data::DataView;
use crate::error::Error;
use crate::tree::{prop, Element, ElementId, Property, Tree};

struct Scan<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Scan<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek(&self) -> u8 {
        self.data[self.pos]
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn skip_inline_ws(&mut self) {
        while !self.at_end() && self.peek().is_ascii_whitespace() && self.peek() != b'\n' {
            self.bump();
        }
    }

    fn skip_line(&mut self) {
        while !self.at_end() && self.peek() != b'\n' {
            self.bump();
        }
        if !self.at_end() {
            self.bump();
        }
        self.skip_inline_ws();
    }

    /// Whitespace of any kind plus `;` comment lines.
    fn skip_whitespaces(&mut self) {
        loop {
            while !self.at_end() && self.peek().is_ascii_whitespace() {
                self.bump();
            }
            if !self.at_end() && self.peek() == b';' {
                self.skip_line();
            } else {
                return;
            }
        }
    }

    /// Longest run of `[A-Za-z0-9_]` at the cursor.
    fn read_token(&mut self) -> &'a [u8] {
        let begin = self.pos;
        while !self.at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == b'_') {
            self.bump();
        }
        &self.data[begin..self.pos]
    }
}

fn read_text_property<'a>(s: &mut Scan<'a>) -> Result<Property<'a>, Error> {
    match s.peek() {
        b'"' => {
            s.bump();
            let begin = s.pos;
            while !s.at_end() && s.peek() != b'"' {
                s.bump();
            }
            let value = &s.data[begin..s.pos];
            if !s.at_end() {
                s.bump(); // closing quote
            }
            Ok(Property {
                type_code: prop::STRING,
                count: 0,
                value: DataView::text(value),
            })
        }
        c if c.is_ascii_digit() || c == b'-' => {
            let begin = s.pos;
            let mut type_code = prop::LONG;
            if s.peek() == b'-' {
                s.bump();
            }
            while !s.at_end() && s.peek().is_ascii_digit() {
                s.bump();
            }
            if !s.at_end() && s.peek() == b'.' {
                type_code = prop::DOUBLE;
                s.bump();
                while !s.at_end() && s.peek().is_ascii_digit() {
                    s.bump();
                }
                if !s.at_end() && matches!(s.peek(), b'e' | b'E') {
                    // 10.5e-013
                    s.bump();
                    if !s.at_end() && s.peek() == b'-' {
                        s.bump();
                    }
                    while !s.at_end() && s.peek().is_ascii_digit() {
                        s.bump();
                    }
                }
            }
            Ok(Property {
                type_code,
                count: 0,
                value: DataView::text(&s.data[begin..s.pos]),
            })
        }
        c @ (b'T' | b'Y') => {
            // opaque one-byte marker token, semantics owned by the caller
            let begin = s.pos;
            s.bump();
            Ok(Property {
                type_code: c,
                count: 0,
                value: DataView::text(&s.data[begin..s.pos]),
            })
        }
        b'*' => {
            // Vertices: *10740 { a: 14.2760353088379,... }
            s.bump();
            let mut type_code = prop::ARRAY_LONG;
            while !s.at_end() && s.peek() != b':' {
                s.bump();
            }
            if !s.at_end() {
                s.bump(); // ':'
            }
            s.skip_inline_ws();
            let begin = s.pos;
            let mut count = 0u32;
            let mut is_any = false;
            while !s.at_end() && s.peek() != b'}' {
                let c = s.peek();
                if c == b',' {
                    if is_any {
                        count += 1;
                    }
                    is_any = false;
                } else if !c.is_ascii_whitespace() {
                    is_any = true;
                }
                if c == b'.' {
                    type_code = prop::ARRAY_DOUBLE;
                }
                s.bump();
            }
            if is_any {
                count += 1;
            }
            let value = &s.data[begin..s.pos];
            if !s.at_end() {
                s.bump(); // '}'
            }
            Ok(Property {
                type_code,
                count,
                value: DataView::text(value),
            })
        }
        _ => Err(Error::MalformedSyntax(s.pos)),
    }
}

pub(crate) fn tokenize(data: &[u8]) -> Result<Tree<'_>, Error> {
    let mut s = Scan { data, pos: 0 };
    let mut tree = Tree::new();
    // elements whose `{` block is currently open
    let mut stack: Vec<ElementId> = Vec::new();

    loop {
        if !stack.is_empty() {
            s.skip_whitespaces();
        }
        if s.at_end() {
            break;
        }
        match s.peek() {
            b';' | b'\r' | b'\n' => s.skip_line(),
            b'}' => {
                if stack.pop().is_none() {
                    return Err(Error::MalformedSyntax(s.pos));
                }
                s.bump();
            }
            _ => {
                let id = s.read_token();
                if s.at_end() || s.peek() != b':' {
                    return Err(Error::MalformedSyntax(s.pos));
                }
                s.bump();
                s.skip_whitespaces();
                if s.at_end() {
                    return Err(Error::MalformedSyntax(s.pos));
                }

                let parent = stack.last().copied().unwrap_or(Tree::ROOT);
                let elem = tree.push(
                    parent,
                    Element {
                        id: DataView::text(id),
                        ..Default::default()
                    },
                );

                while !s.at_end() && s.peek() != b'\n' && s.peek() != b'{' {
                    let p = read_text_property(&mut s)?;
                    tree.get_mut(elem).properties.push(p);
                    if !s.at_end() && s.peek() == b',' {
                        s.bump();
                        s.skip_whitespaces();
                    }
                    s.skip_inline_ws();
                }

                if !s.at_end() && s.peek() == b'{' {
                    s.bump();
                    stack.push(elem);
                }
            }
        }
    }
    Ok(tree)
}

#[test]
fn test_model_node() {
    let tree = tokenize(b"Model: 123, \"Model::Cube\", \"Mesh\" {\n}\n").unwrap();
    let el = tree.find_child(Tree::ROOT, "Model").unwrap();
    let el = tree.get(el);
    assert_eq!(el.properties.len(), 3);
    assert!(el.property(0).unwrap().is_long());
    assert_eq!(el.property(0).unwrap().value.to_u64(), 123);
    assert!(el.property(1).unwrap().value == "Model::Cube");
    assert!(el.property(2).unwrap().value == "Mesh");
}

#[test]
fn test_float_literal_upgrade() {
    let tree = tokenize(b"A: 10.5e-013, 2, 3.\n").unwrap();
    let el = tree.get(tree.find_child(Tree::ROOT, "A").unwrap());
    assert_eq!(el.property(0).unwrap().type_code, prop::DOUBLE);
    assert_eq!(el.property(1).unwrap().type_code, prop::LONG);
    assert_eq!(el.property(2).unwrap().type_code, prop::DOUBLE);
    assert!((el.property(0).unwrap().value.to_f64() - 10.5e-13).abs() < 1e-20);
}

#[test]
fn test_inline_array() {
    let src = b"Geometry: {\n\tVertices: *6 {\n\t\ta: 1,2,3,4.5,5,6\n\t}\n}\n";
    let tree = tokenize(src).unwrap();
    let geom = tree.find_child(Tree::ROOT, "Geometry").unwrap();
    let verts = tree.find_child(geom, "Vertices").unwrap();
    let p = tree.get(verts).property(0).unwrap().clone();
    assert_eq!(p.type_code, prop::ARRAY_DOUBLE);
    assert_eq!(p.count, 6);
}

#[test]
fn test_integer_array_stays_long() {
    let tree = tokenize(b"I: *3 { a: 7,8,9 }\n").unwrap();
    let el = tree.get(tree.find_child(Tree::ROOT, "I").unwrap());
    let p = el.property(0).unwrap();
    assert_eq!(p.type_code, prop::ARRAY_LONG);
    assert_eq!(p.count, 3);
}

#[test]
fn test_comments_and_nesting() {
    let src = b"; a header comment\nObjects:  {\n\t; inner comment\n\tModel: 1, \"a\", \"Null\" {\n\t}\n}\n";
    let tree = tokenize(src).unwrap();
    let objs = tree.find_child(Tree::ROOT, "Objects").unwrap();
    let model = tree.find_child(objs, "Model").unwrap();
    assert_eq!(tree.get(model).properties.len(), 3);
}

#[test]
fn test_sentinel_tokens() {
    let tree = tokenize(b"P: \"x\", Y, T\n").unwrap();
    let el = tree.get(tree.find_child(Tree::ROOT, "P").unwrap());
    assert_eq!(el.property(1).unwrap().type_code, b'Y');
    assert_eq!(el.property(2).unwrap().type_code, b'T');
}

#[test]
fn test_unexpected_token_is_fatal() {
    assert!(matches!(
        tokenize(b"M: @bad\n"),
        Err(Error::MalformedSyntax(_))
    ));
}

#[test]
fn test_stray_brace_is_fatal() {
    assert!(matches!(tokenize(b"}\n"), Err(Error::MalformedSyntax(_))));
}
