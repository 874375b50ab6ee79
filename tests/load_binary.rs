use fbxscene::{load, tokenize, Error};

const MAGIC: &[u8] = b"Kaydara FBX Binary  \x00";

// --- byte-level document construction ----------------------------------

fn doc(nodes: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
    let mut buf = MAGIC.to_vec();
    buf.extend([0x1a, 0x00]);
    buf.extend(7400u32.to_le_bytes());
    nodes(&mut buf);
    buf.extend(0u32.to_le_bytes());
    buf
}

fn node(
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

fn p_i64(v: i64) -> Vec<u8> {
    let mut b = vec![b'L'];
    b.extend(v.to_le_bytes());
    b
}

fn p_i32(v: i32) -> Vec<u8> {
    let mut b = vec![b'I'];
    b.extend(v.to_le_bytes());
    b
}

fn p_str(s: &[u8]) -> Vec<u8> {
    let mut b = vec![b'S'];
    b.extend((s.len() as u32).to_le_bytes());
    b.extend_from_slice(s);
    b
}

fn p_arr(code: u8, count: u32, encoding: u32, payload: &[u8]) -> Vec<u8> {
    let mut b = vec![code];
    b.extend(count.to_le_bytes());
    b.extend(encoding.to_le_bytes());
    b.extend((payload.len() as u32).to_le_bytes());
    b.extend_from_slice(payload);
    b
}

fn p_i32_arr(vals: &[i32]) -> Vec<u8> {
    let payload: Vec<u8> = vals.iter().flat_map(|v| v.to_le_bytes()).collect();
    p_arr(b'i', vals.len() as u32, 0, &payload)
}

fn p_f64_arr(vals: &[f64]) -> Vec<u8> {
    let payload: Vec<u8> = vals.iter().flat_map(|v| v.to_le_bytes()).collect();
    p_arr(b'd', vals.len() as u32, 0, &payload)
}

/// A zlib stream around a single stored (uncompressed) deflate block, with
/// a correct adler32 trailer. Enough to exercise the inflate path without
/// a compressor dependency.
fn zlib_stored(data: &[u8]) -> Vec<u8> {
    assert!(data.len() <= u16::MAX as usize);
    let mut out = vec![0x78, 0x01];
    out.push(0x01); // final, stored
    out.extend((data.len() as u16).to_le_bytes());
    out.extend((!(data.len() as u16)).to_le_bytes());
    out.extend_from_slice(data);
    let (mut a, mut b) = (1u32, 0u32);
    for &byte in data {
        a = (a + byte as u32) % 65521;
        b = (b + a) % 65521;
    }
    out.extend(((b << 16) | a).to_be_bytes());
    out
}

fn p_f64_arr_zlib(vals: &[f64]) -> Vec<u8> {
    let payload: Vec<u8> = vals.iter().flat_map(|v| v.to_le_bytes()).collect();
    p_arr(b'd', vals.len() as u32, 1, &zlib_stored(&payload))
}

fn scene_doc() -> Vec<u8> {
    doc(|b| {
        node(
            b,
            b"GlobalSettings",
            0,
            &[],
            Some(&|b: &mut Vec<u8>| {
                node(
                    b,
                    b"Properties70",
                    0,
                    &[],
                    Some(&|b: &mut Vec<u8>| {
                        let mut props = p_str(b"TimeMode");
                        props.extend(p_str(b"enum"));
                        props.extend(p_str(b""));
                        props.extend(p_str(b""));
                        props.extend(p_i32(3)); // 60 fps
                        node(b, b"P", 5, &props, None);
                    }),
                );
            }),
        );
        node(
            b,
            b"Objects",
            0,
            &[],
            Some(&|b: &mut Vec<u8>| {
                let mut geom_props = p_i64(100);
                geom_props.extend(p_str(b"Plane\x00\x01Geometry"));
                geom_props.extend(p_str(b"Mesh"));
                node(
                    b,
                    b"Geometry",
                    3,
                    &geom_props,
                    Some(&|b: &mut Vec<u8>| {
                        let verts = [
                            0., 0., 0., //
                            1., 0., 0., //
                            1., 1., 0., //
                            0., 1., 0.,
                        ];
                        node(b, b"Vertices", 1, &p_f64_arr_zlib(&verts), None);
                        node(
                            b,
                            b"PolygonVertexIndex",
                            1,
                            &p_i32_arr(&[0, 1, 2, -4]),
                            None,
                        );
                        node(
                            b,
                            b"LayerElementNormal",
                            1,
                            &p_i32(0),
                            Some(&|b: &mut Vec<u8>| {
                                node(
                                    b,
                                    b"MappingInformationType",
                                    1,
                                    &p_str(b"ByPolygonVertex"),
                                    None,
                                );
                                node(
                                    b,
                                    b"ReferenceInformationType",
                                    1,
                                    &p_str(b"Direct"),
                                    None,
                                );
                                let normals = [0., 0., 1.].repeat(4);
                                node(b, b"Normals", 1, &p_f64_arr(&normals), None);
                            }),
                        );
                    }),
                );
                let mut model_props = p_i64(200);
                model_props.extend(p_str(b"Plane\x00\x01Model"));
                model_props.extend(p_str(b"Mesh"));
                node(b, b"Model", 3, &model_props, None);
                let mut mat_props = p_i64(300);
                mat_props.extend(p_str(b"Red\x00\x01Material"));
                mat_props.extend(p_str(b""));
                node(b, b"Material", 3, &mat_props, None);
            }),
        );
        node(
            b,
            b"Connections",
            0,
            &[],
            Some(&|b: &mut Vec<u8>| {
                let mut c = p_str(b"OO");
                c.extend(p_i64(100));
                c.extend(p_i64(200));
                node(b, b"C", 3, &c, None);
                let mut c = p_str(b"OO");
                c.extend(p_i64(300));
                c.extend(p_i64(200));
                node(b, b"C", 3, &c, None);
            }),
        );
    })
}

// --- tests --------------------------------------------------------------

#[test]
fn test_binary_scene() {
    let _ = env_logger::builder().is_test(true).try_init();
    let data = scene_doc();
    assert!(tokenize::is_binary(&data));
    let scene = load(&data).unwrap();

    assert_eq!(scene.mesh_count(), 1);
    let mesh = scene.mesh(0).unwrap();
    // the display name stops at the \x00\x01 class separator
    assert_eq!(mesh.name, "Plane");
    assert_eq!(mesh.as_mesh().unwrap().geometry, Some(100));
    assert_eq!(mesh.as_mesh().unwrap().materials, vec![300]);

    let geom = scene.object(100).unwrap().as_geometry().unwrap();
    assert_eq!(geom.vertices.len(), 6);
    assert_eq!(geom.vertices[0], [0., 0., 0.]);
    assert_eq!(geom.vertices[4], [1., 1., 0.]);
    assert_eq!(geom.normals.len(), 6);
    assert!(geom.normals.iter().all(|&n| n == [0., 0., 1.]));

    assert_eq!(scene.frame_rate(), 60.);

    // a default-white material with empty texture slots
    let mat = scene.object(300).unwrap().as_material().unwrap();
    assert_eq!(mat.diffuse_color.r, 1.);
    assert_eq!(mat.textures, [None, None]);
}

#[test]
fn test_every_truncation_errors() {
    // no prefix of a real document may parse, wrap pointers, or panic
    let data = scene_doc();
    for len in 1..data.len() {
        assert!(load(&data[..len]).is_err(), "truncation at {len} parsed");
    }
}

#[test]
fn test_empty_input_is_an_empty_scene() {
    // an empty buffer is an empty text document: just the root object
    let scene = load(b"").unwrap();
    assert_eq!(scene.objects().len(), 1);
    assert_eq!(scene.mesh_count(), 0);
    assert_eq!(scene.frame_rate(), -1.);
}

#[test]
fn test_corrupt_zlib_stream_fails() {
    let data = doc(|b| {
        node(
            b,
            b"Objects",
            0,
            &[],
            Some(&|b: &mut Vec<u8>| {
                let mut props = p_i64(100);
                props.extend(p_str(b"X\x00\x01Geometry"));
                props.extend(p_str(b"Mesh"));
                node(
                    b,
                    b"Geometry",
                    3,
                    &props,
                    Some(&|b: &mut Vec<u8>| {
                        // valid header, garbage stream
                        node(b, b"Vertices", 1, &p_arr(b'd', 3, 1, b"nonsense"), None);
                        node(b, b"PolygonVertexIndex", 1, &p_i32_arr(&[0, 1, -3]), None);
                    }),
                );
            }),
        );
    });
    assert_eq!(load(&data).unwrap_err(), Error::Decompress);
}

#[test]
fn test_inflated_size_mismatch_fails() {
    // the stream inflates fine but disagrees with the declared count
    let payload: Vec<u8> = [1.0f64, 2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
    let data = doc(|b| {
        node(
            b,
            b"Objects",
            0,
            &[],
            Some(&|b: &mut Vec<u8>| {
                let mut props = p_i64(100);
                props.extend(p_str(b"X\x00\x01Geometry"));
                props.extend(p_str(b"Mesh"));
                node(
                    b,
                    b"Geometry",
                    3,
                    &props,
                    Some(&|b: &mut Vec<u8>| {
                        node(
                            b,
                            b"Vertices",
                            1,
                            &p_arr(b'd', 3, 1, &zlib_stored(&payload)),
                            None,
                        );
                        node(b, b"PolygonVertexIndex", 1, &p_i32_arr(&[0, 1, -3]), None);
                    }),
                );
            }),
        );
    });
    assert_eq!(load(&data).unwrap_err(), Error::BufferTooSmall);
}

#[test]
fn test_unknown_property_type_fails() {
    let data = doc(|b| {
        node(b, b"Weird", 1, &[b'Q', 0, 0], None);
    });
    assert_eq!(load(&data).unwrap_err(), Error::UnknownPropertyType(b'Q'));
}

#[test]
fn test_hostile_string_length_fails() {
    // a long-string property claiming u32::MAX bytes must die cleanly
    let mut props = vec![b'S'];
    props.extend(u32::MAX.to_le_bytes());
    let data = doc(|b| {
        node(b, b"Evil", 1, &props, None);
    });
    assert_eq!(load(&data).unwrap_err(), Error::OutOfRange);
}
