//! Geometry resolution: polygon decoding, fan triangulation, and the
//! splat/remap machinery that expands layered vertex attributes onto the
//! triangulated buffers.

use crate::array::{parse_i32_array, parse_vec_array};
use crate::error::Error;
use crate::math::Vec3;
use crate::object::{Geometry, UV_MAX};
use crate::tree::{ElementId, Tree};

/// How a layer's values map onto the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexDataMapping {
    ByPolygonVertex,
    ByPolygon,
    ByVertex,
}

/// Undoes the FBX end-of-polygon convention: the last index of each polygon
/// is stored negated-minus-one.
fn decode_index(raw: i32) -> usize {
    if raw < 0 {
        (-raw - 1) as usize
    } else {
        raw as usize
    }
}

/// Fan-triangulates the polygon-vertex-index array.
///
/// Returns `(to_old_vertices, to_old_indices)`: for every emitted
/// triangulated slot, the control-point index it refers to and the original
/// polygon-vertex slot it came from. An n-gon emits n-2 triangles; this is
/// plain fan triangulation, concave polygons are a known limitation.
pub(crate) fn triangulate(old_indices: &[i32]) -> (Vec<usize>, Vec<usize>) {
    let mut to_old_vertices = Vec::new();
    let mut to_old_indices = Vec::new();
    let mut in_polygon_idx = 0usize;
    for (i, &raw) in old_indices.iter().enumerate() {
        let idx = decode_index(raw);
        if in_polygon_idx <= 2 {
            to_old_vertices.push(idx);
            to_old_indices.push(i);
        } else {
            let first = i - in_polygon_idx;
            to_old_vertices.push(decode_index(old_indices[first]));
            to_old_indices.push(first);
            to_old_vertices.push(decode_index(old_indices[i - 1]));
            to_old_indices.push(i - 1);
            to_old_vertices.push(idx);
            to_old_indices.push(i);
        }
        in_polygon_idx += 1;
        if raw < 0 {
            in_polygon_idx = 0;
        }
    }
    (to_old_vertices, to_old_indices)
}

/// Number of triangles produced by the polygon starting at `*idx`, advancing
/// `*idx` to the next polygon. Runs of the same walk the material layer uses
/// to replicate per-polygon indices per triangle.
pub(crate) fn tri_count_from_poly(indices: &[i32], idx: &mut usize) -> usize {
    let mut count = 1;
    while indices.get(*idx + 1 + count).is_some_and(|&v| v >= 0) {
        count += 1;
    }
    *idx = *idx + 2 + count;
    count
}

/// An out-of-range file-supplied index: zero-valued entry by default,
/// a hard error under the `strict` feature.
fn clamped<const N: usize>(what: &str) -> Result<[f64; N], Error> {
    #[cfg(feature = "strict")]
    {
        let _ = what;
        Err(Error::OutOfRange)
    }
    #[cfg(not(feature = "strict"))]
    {
        log::warn!("out-of-range {what} index, substituting default");
        Ok([0.; N])
    }
}

/// Reads one layer's data array, optional index array, and mapping mode.
/// The layer element must carry the named data child; reference mode
/// `IndexToDirect` pulls in the auxiliary index array.
pub(crate) fn parse_vertex_data<'a, const N: usize>(
    tree: &Tree<'a>,
    layer: ElementId,
    name: &'static str,
    index_name: &'static str,
) -> Result<(Vec<[f64; N]>, Vec<i32>, VertexDataMapping), Error> {
    let data_prop = tree
        .child_property(layer, name)
        .ok_or(Error::MissingData(name))?;

    let mut mapping = VertexDataMapping::ByPolygonVertex;
    if let Some(p) = tree.child_property(layer, "MappingInformationType") {
        mapping = if p.value == "ByPolygonVertex" {
            VertexDataMapping::ByPolygonVertex
        } else if p.value == "ByPolygon" {
            VertexDataMapping::ByPolygon
        } else if p.value == "ByVertice" || p.value == "ByVertex" {
            VertexDataMapping::ByVertex
        } else {
            return Err(Error::UnsupportedMapping);
        };
    }

    let mut indices = Vec::new();
    if let Some(p) = tree.child_property(layer, "ReferenceInformationType") {
        if p.value == "IndexToDirect" {
            if let Some(ip) = tree.child_property(layer, index_name) {
                indices = parse_i32_array(ip)?;
            }
        } else if p.value != "Direct" {
            return Err(Error::UnsupportedMapping);
        }
    }

    let data = parse_vec_array::<N>(data_prop)?;
    Ok((data, indices, mapping))
}

/// Expands a layer buffer to one entry per original polygon-vertex slot.
pub(crate) fn splat<const N: usize>(
    data: &[[f64; N]],
    mapping: VertexDataMapping,
    indices: &[i32],
    original_indices: &[i32],
) -> Result<Vec<[f64; N]>, Error> {
    debug_assert!(!data.is_empty());
    match mapping {
        VertexDataMapping::ByPolygonVertex => {
            if indices.is_empty() {
                Ok(data.to_vec())
            } else {
                indices
                    .iter()
                    .map(|&i| match usize::try_from(i).ok().and_then(|i| data.get(i)) {
                        Some(v) => Ok(*v),
                        None => clamped("attribute"),
                    })
                    .collect()
            }
        }
        //  v0  v1 ...
        // uv0 uv1 ...
        VertexDataMapping::ByVertex => original_indices
            .iter()
            .map(|&raw| match data.get(decode_index(raw)) {
                Some(v) => Ok(*v),
                None => clamped("attribute"),
            })
            .collect(),
        VertexDataMapping::ByPolygon => Err(Error::UnsupportedMapping),
    }
}

/// Reorders a per-original-slot buffer into triangulated-slot order.
pub(crate) fn remap<T: Copy + Default>(out: &mut Vec<T>, map: &[usize]) {
    if out.is_empty() {
        return;
    }
    let old = std::mem::take(out);
    out.extend(map.iter().map(|&m| old.get(m).copied().unwrap_or_default()));
}

/// Parses a `Geometry` element of class `Mesh` into triangulated buffers.
pub(crate) fn parse_geometry(tree: &Tree<'_>, element: ElementId) -> Result<Geometry, Error> {
    let vertices_prop = tree
        .child_property(element, "Vertices")
        .ok_or(Error::MissingData("Vertices"))?;
    let polys_prop = tree
        .child_property(element, "PolygonVertexIndex")
        .ok_or(Error::MissingData("PolygonVertexIndex"))?;

    let control_points: Vec<Vec3> = parse_vec_array::<3>(vertices_prop)?;
    let original_indices = parse_i32_array(polys_prop)?;

    let (to_old_vertices, to_old_indices) = triangulate(&original_indices);

    let mut geom = Geometry::default();
    geom.vertices = to_old_vertices
        .iter()
        .map(|&old| match control_points.get(old) {
            Some(v) => Ok(*v),
            None => clamped("vertex"),
        })
        .collect::<Result<_, _>>()?;

    // some control points can be unused, so this is not necessarily the
    // same size as to_old_vertices
    geom.to_new_vertices = vec![Vec::new(); control_points.len()];
    for (new, &old) in to_old_vertices.iter().enumerate() {
        if let Some(slots) = geom.to_new_vertices.get_mut(old) {
            slots.push(new);
        }
    }
    geom.to_old_vertices = to_old_vertices;

    if let Some(layer) = tree.find_child(element, "LayerElementMaterial") {
        let mapping = tree
            .child_property(layer, "MappingInformationType")
            .ok_or(Error::MissingData("MappingInformationType"))?;
        let reference = tree
            .child_property(layer, "ReferenceInformationType")
            .ok_or(Error::MissingData("ReferenceInformationType"))?;
        if mapping.value == "ByPolygon" && reference.value == "IndexToDirect" {
            let indices_prop = tree
                .child_property(layer, "Materials")
                .ok_or(Error::MissingData("Materials"))?;
            let per_poly = parse_i32_array(indices_prop)?;
            // each polygon's material index repeats for every triangle the
            // fan produced from it
            let mut at = 0usize;
            for &mat in &per_poly {
                let tri_count = tri_count_from_poly(&original_indices, &mut at);
                geom.materials.extend(std::iter::repeat(mat).take(tri_count));
            }
        } else if mapping.value != "AllSame" {
            return Err(Error::UnsupportedMapping);
        }
    }

    for layer in tree.children(element) {
        if tree.get(layer).id != "LayerElementUV" {
            continue;
        }
        let uv_index = tree
            .get(layer)
            .first_property()
            .map_or(0, |p| p.value.to_i32());
        if uv_index < 0 || uv_index >= UV_MAX as i32 {
            // out-of-range channel slot: ignored, not an error
            continue;
        }
        let (data, indices, mapping) = parse_vertex_data::<2>(tree, layer, "UV", "UVIndex")?;
        if data.is_empty() {
            continue;
        }
        let mut uvs = splat(&data, mapping, &indices, &original_indices)?;
        remap(&mut uvs, &to_old_indices);
        geom.uvs[uv_index as usize] = uvs;
    }

    if let Some(layer) = tree.find_child(element, "LayerElementTangents") {
        let (name, index_name) = if tree.find_child(layer, "Tangents").is_some() {
            ("Tangents", "TangentsIndex")
        } else {
            ("Tangent", "TangentIndex")
        };
        let (data, indices, mapping) = parse_vertex_data::<3>(tree, layer, name, index_name)?;
        if !data.is_empty() {
            geom.tangents = splat(&data, mapping, &indices, &original_indices)?;
            remap(&mut geom.tangents, &to_old_indices);
        }
    }

    if let Some(layer) = tree.find_child(element, "LayerElementColor") {
        let (data, indices, mapping) = parse_vertex_data::<4>(tree, layer, "Colors", "ColorIndex")?;
        if !data.is_empty() {
            geom.colors = splat(&data, mapping, &indices, &original_indices)?;
            remap(&mut geom.colors, &to_old_indices);
        }
    }

    if let Some(layer) = tree.find_child(element, "LayerElementNormal") {
        let (data, indices, mapping) =
            parse_vertex_data::<3>(tree, layer, "Normals", "NormalsIndex")?;
        if !data.is_empty() {
            geom.normals = splat(&data, mapping, &indices, &original_indices)?;
            remap(&mut geom.normals, &to_old_indices);
        }
    }

    Ok(geom)
}

#[test]
fn test_triangulate_counts() {
    // tri, quad, pentagon: 1 + 2 + 3 triangles
    let polys = [0, 1, -3, 3, 4, 5, -7, 7, 8, 9, 10, -12];
    let (to_old_vertices, to_old_indices) = triangulate(&polys);
    assert_eq!(to_old_vertices.len(), (1 + 2 + 3) * 3);
    assert_eq!(to_old_vertices.len(), to_old_indices.len());
}

#[test]
fn test_triangulate_fan_order() {
    // quad 0,1,2,3 fans into (0,1,2) and (0,2,3)
    let polys = [0, 1, 2, -4];
    let (to_old_vertices, to_old_indices) = triangulate(&polys);
    assert_eq!(to_old_vertices, vec![0, 1, 2, 0, 2, 3]);
    assert_eq!(to_old_indices, vec![0, 1, 2, 0, 2, 3]);
}

#[test]
fn test_tri_count_walk() {
    let polys = [0, 1, -3, 3, 4, 5, -7];
    let mut at = 0;
    assert_eq!(tri_count_from_poly(&polys, &mut at), 1);
    assert_eq!(at, 3);
    assert_eq!(tri_count_from_poly(&polys, &mut at), 2);
    assert_eq!(at, 7);
}

#[test]
fn test_splat_direct_is_identity() {
    // Direct + ByPolygonVertex with matching lengths must pass data through
    let data = vec![[0., 1.], [2., 3.], [4., 5.]];
    let original = [0, 1, -3];
    let out = splat(&data, VertexDataMapping::ByPolygonVertex, &[], &original).unwrap();
    assert_eq!(out, data);
}

#[cfg(not(feature = "strict"))]
#[test]
fn test_splat_clamps_bad_indices() {
    let data = vec![[1., 1.], [2., 2.]];
    let original = [0, 1, -3];
    let out = splat(
        &data,
        VertexDataMapping::ByPolygonVertex,
        &[1, 9, 0],
        &original,
    )
    .unwrap();
    assert_eq!(out, vec![[2., 2.], [0., 0.], [1., 1.]]);
}

#[test]
fn test_splat_by_vertex() {
    let data = vec![[10.], [20.], [30.], [40.]];
    let original = [0, 2, -4];
    let out = splat(&data, VertexDataMapping::ByVertex, &[], &original).unwrap();
    assert_eq!(out, vec![[10.], [30.], [40.]]);
}

#[test]
fn test_splat_by_polygon_unsupported() {
    let data = vec![[1.]];
    assert_eq!(
        splat(&data, VertexDataMapping::ByPolygon, &[], &[]),
        Err(Error::UnsupportedMapping)
    );
}

#[test]
fn test_remap() {
    let mut v = vec![1i32, 2, 3];
    remap(&mut v, &[2, 0, 0, 9]);
    assert_eq!(v, vec![3, 1, 1, 0]);
}
