//! Two-pass object resolution and connection linking.
//!
//! Pass 1 enumerates the `Objects` subtree into the id map. Pass 2
//! instantiates one typed object per id, dispatching on the element
//! identifier and class tag. Linking then walks the connections in file
//! order and wires the resolved objects together; clusters get a final
//! postprocessing step that expands their control-point weights onto the
//! triangulated vertex buffers.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use log::debug;

use crate::array::{parse_f32_array, parse_f64_array, parse_i32_array, parse_i64_array};
use crate::error::Error;
use crate::geometry::parse_geometry;
use crate::math::{Color, Matrix};
use crate::object::{
    AnimationCurve, AnimationCurveNode, AnimationLayer, Cluster, CurveSlot, Material, Mesh,
    NodeAttribute, Object, ObjectId, ObjectKind, Skin, Texture, ROOT_ID,
};
use crate::scene::{
    fbx_time_to_seconds, framerate_from_time_mode, Connection, ConnectionKind, FrameRate,
    GlobalSettings, ObjectEntry, Scene, TakeInfo,
};
use crate::tree::{Element, ElementId, Tree};

/// Resolves a tokenized tree into a scene, in the original pipeline order:
/// connections, takes, objects (instantiate + link + postprocess), then
/// global settings.
pub(crate) fn into_scene(tree: Tree<'_>) -> Result<Scene<'_>, Error> {
    let connections = parse_connections(&tree)?;
    let take_infos = parse_takes(&tree)?;

    let (mut object_map, order) = enumerate_objects(&tree)?;

    let mut objects = Vec::with_capacity(order.len() + 1);
    objects.push(Object::new(
        ROOT_ID,
        "RootNode".into(),
        Tree::ROOT,
        ObjectKind::Root,
    ));
    object_map.get_mut(&ROOT_ID).unwrap().object = Some(0);

    let mut meshes = Vec::new();
    let mut animation_stacks = Vec::new();
    instantiate_objects(
        &tree,
        &order,
        &mut object_map,
        &mut objects,
        &mut meshes,
        &mut animation_stacks,
    )?;

    link_connections(&connections, &object_map, &mut objects)?;
    postprocess_clusters(&tree, &mut objects)?;

    let (settings, frame_rate) = parse_global_settings(&tree);

    Ok(Scene {
        tree,
        objects,
        object_map,
        connections,
        meshes,
        animation_stacks,
        take_infos,
        settings,
        frame_rate,
    })
}

/// Pass 1: register every object element by its id.
///
/// Id 0 is reserved: the root entry is seeded first and a file object
/// claiming id 0 cannot displace it. Without an `Objects` node the
/// top-level children are scanned instead, skipping anything that does not
/// start with an integer id (headers, definitions and the like).
fn enumerate_objects(
    tree: &Tree<'_>,
) -> Result<(HashMap<ObjectId, ObjectEntry>, Vec<ObjectId>), Error> {
    let mut map = HashMap::new();
    map.insert(
        ROOT_ID,
        ObjectEntry {
            element: Tree::ROOT,
            object: None,
        },
    );
    let mut order = Vec::new();

    let (container, is_objects) = match tree.find_child(Tree::ROOT, "Objects") {
        Some(o) => (o, true),
        None => (Tree::ROOT, false),
    };
    for child in tree.children(container) {
        match tree.get(child).first_property() {
            Some(p) if p.is_long() => {
                let id = p.value.to_u64();
                match map.entry(id) {
                    Entry::Vacant(v) => {
                        v.insert(ObjectEntry {
                            element: child,
                            object: None,
                        });
                        order.push(id);
                    }
                    Entry::Occupied(mut o) => {
                        // duplicate id: the last element wins, except that
                        // nothing may displace the reserved root entry
                        if id != ROOT_ID {
                            o.get_mut().element = child;
                        }
                    }
                }
            }
            _ if is_objects => return Err(Error::InvalidObjectId),
            _ => {}
        }
    }
    Ok((map, order))
}

/// Display name: the element's 2nd property, cut at the `\x00\x01`
/// name/class separator binary files use.
fn object_name(el: &Element<'_>) -> String {
    let Some(p) = el.property(1) else {
        return String::new();
    };
    let bytes = p.value.bytes;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Pass 2: instantiate one typed object per enumerated id.
fn instantiate_objects<'a>(
    tree: &Tree<'a>,
    order: &[ObjectId],
    object_map: &mut HashMap<ObjectId, ObjectEntry>,
    objects: &mut Vec<Object<'a>>,
    meshes: &mut Vec<ObjectId>,
    animation_stacks: &mut Vec<ObjectId>,
) -> Result<(), Error> {
    for &id in order {
        let element = object_map[&id].element;
        let el = tree.get(element);

        let kind = if el.id == "Geometry" {
            if el.last_property().is_some_and(|p| p.value == "Mesh") {
                Some(ObjectKind::Geometry(parse_geometry(tree, element)?))
            } else {
                None
            }
        } else if el.id == "Material" {
            Some(ObjectKind::Material(parse_material(tree, element)))
        } else if el.id == "AnimationStack" {
            Some(ObjectKind::AnimationStack)
        } else if el.id == "AnimationLayer" {
            Some(ObjectKind::AnimationLayer(AnimationLayer::default()))
        } else if el.id == "AnimationCurve" {
            Some(ObjectKind::AnimationCurve(parse_animation_curve(
                tree, element,
            )?))
        } else if el.id == "AnimationCurveNode" {
            Some(ObjectKind::AnimationCurveNode(AnimationCurveNode::default()))
        } else if el.id == "Deformer" {
            match el.property(2) {
                Some(p) if p.value == "Cluster" => {
                    Some(ObjectKind::Cluster(parse_cluster(tree, element)?))
                }
                Some(p) if p.value == "Skin" => Some(ObjectKind::Skin(Skin::default())),
                _ => None,
            }
        } else if el.id == "NodeAttribute" {
            Some(ObjectKind::NodeAttribute(NodeAttribute {
                attribute_type: tree.child_property(element, "TypeFlags").map(|p| p.value),
            }))
        } else if el.id == "Model" {
            match el.property(2) {
                Some(p) if p.value == "Mesh" => {
                    validate_model_class(el, "Mesh")?;
                    Some(ObjectKind::Mesh(Mesh::default()))
                }
                Some(p) if p.value == "LimbNode" => {
                    validate_model_class(el, "LimbNode")?;
                    Some(ObjectKind::LimbNode)
                }
                Some(p) if p.value == "Null" || p.value == "Root" => Some(ObjectKind::NullNode),
                _ => None,
            }
        } else if el.id == "Texture" {
            Some(ObjectKind::Texture(Texture {
                filename: tree.child_property(element, "FileName").map(|p| p.value),
                relative_filename: tree
                    .child_property(element, "RelativeFilename")
                    .map(|p| p.value),
            }))
        } else {
            debug!("no parser for object element {}", el.id.to_string_lossy());
            None
        };

        let Some(kind) = kind else { continue };
        match kind {
            ObjectKind::Mesh(_) => meshes.push(id),
            ObjectKind::AnimationStack => animation_stacks.push(id),
            _ => {}
        }
        let idx = objects.len();
        objects.push(Object::new(id, object_name(el), element, kind));
        object_map.get_mut(&id).unwrap().object = Some(idx);
    }
    Ok(())
}

/// A `Model` of class `Mesh`/`LimbNode` must carry that exact tag as its
/// 3rd property.
fn validate_model_class(el: &Element<'_>, tag: &str) -> Result<(), Error> {
    match el.property(2) {
        Some(p) if p.value == tag => Ok(()),
        _ => Err(Error::InvalidModel),
    }
}

fn parse_material(tree: &Tree<'_>, element: ElementId) -> Material {
    let mut diffuse = Color::WHITE;
    if let Some(props) = tree.find_child(element, "Properties70") {
        for child in tree.children(props) {
            let el = tree.get(child);
            if el.id == "P" && el.first_property().is_some_and(|p| p.value == "DiffuseColor") {
                diffuse.r = el.property(4).map_or(1., |p| p.value.to_f64() as f32);
                diffuse.g = el.property(5).map_or(1., |p| p.value.to_f64() as f32);
                diffuse.b = el.property(6).map_or(1., |p| p.value.to_f64() as f32);
            }
        }
    }
    Material {
        diffuse_color: diffuse,
        textures: [None; 2],
    }
}

fn parse_animation_curve(tree: &Tree<'_>, element: ElementId) -> Result<AnimationCurve, Error> {
    let mut curve = AnimationCurve::default();
    if let Some(p) = tree.child_property(element, "KeyTime") {
        curve.times = parse_i64_array(p)?;
    }
    if let Some(p) = tree.child_property(element, "KeyValueFloat") {
        curve.values = parse_f32_array(p)?;
    }
    if curve.times.len() != curve.values.len() {
        return Err(Error::InvalidCurve);
    }
    Ok(curve)
}

fn parse_cluster(tree: &Tree<'_>, element: ElementId) -> Result<Cluster, Error> {
    let mut cluster = Cluster::default();
    if let Some(p) = tree.child_property(element, "TransformLink") {
        cluster.transform_link = Matrix::from_slice(&parse_f64_array(p)?);
    }
    if let Some(p) = tree.child_property(element, "Transform") {
        cluster.transform = Matrix::from_slice(&parse_f64_array(p)?);
    }
    Ok(cluster)
}

fn parse_connections<'a>(tree: &Tree<'a>) -> Result<Vec<Connection<'a>>, Error> {
    let mut out = Vec::new();
    let Some(conns) = tree.find_child(Tree::ROOT, "Connections") else {
        return Ok(out);
    };
    for child in tree.children(conns) {
        let el = tree.get(child);
        let (Some(tag), Some(from), Some(to)) = (el.property(0), el.property(1), el.property(2))
        else {
            return Err(Error::MissingData("connection properties"));
        };
        if !tag.is_string() || !from.is_long() || !to.is_long() {
            return Err(Error::MissingData("connection properties"));
        }
        let (from, to) = (from.value.to_u64(), to.value.to_u64());
        let conn = if tag.value == "OO" {
            Connection {
                from,
                to,
                kind: ConnectionKind::ObjectObject,
                property: None,
            }
        } else if tag.value == "OP" {
            let prop = el
                .property(3)
                .ok_or(Error::MissingData("connection property name"))?;
            Connection {
                from,
                to,
                kind: ConnectionKind::ObjectProperty,
                property: Some(prop.value),
            }
        } else {
            return Err(Error::UnsupportedConnection);
        };
        out.push(conn);
    }
    Ok(out)
}

fn parse_takes<'a>(tree: &Tree<'a>) -> Result<Vec<TakeInfo<'a>>, Error> {
    let mut out = Vec::new();
    let Some(takes) = tree.find_child(Tree::ROOT, "Takes") else {
        return Ok(out);
    };
    for child in tree.children(takes) {
        let el = tree.get(child);
        if el.id != "Take" {
            continue;
        }
        let name = match el.first_property() {
            Some(p) if p.is_string() => p.value,
            _ => return Err(Error::MissingData("take name")),
        };
        let filename = match tree.find_child(child, "FileName") {
            Some(f) => match tree.get(f).first_property() {
                Some(p) if p.is_string() => Some(p.value),
                _ => return Err(Error::MissingData("take filename")),
            },
            None => None,
        };
        out.push(TakeInfo {
            name,
            filename,
            local_time: parse_time_span(tree, child, "LocalTime")?,
            reference_time: parse_time_span(tree, child, "ReferenceTime")?,
        });
    }
    Ok(out)
}

fn parse_time_span(
    tree: &Tree<'_>,
    take: ElementId,
    name: &'static str,
) -> Result<Option<(f64, f64)>, Error> {
    let Some(span) = tree.find_child(take, name) else {
        return Ok(None);
    };
    let el = tree.get(span);
    match (el.property(0), el.property(1)) {
        (Some(from), Some(to)) if from.is_long() && to.is_long() => Ok(Some((
            fbx_time_to_seconds(from.value.to_i64()),
            fbx_time_to_seconds(to.value.to_i64()),
        ))),
        _ => Err(Error::MissingData("take time")),
    }
}

/// Kind tag used to key the linking rules without borrowing the payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Root,
    LimbNode,
    NullNode,
    Mesh,
    Geometry,
    Material,
    Texture,
    NodeAttribute,
    Skin,
    Cluster,
    Stack,
    Layer,
    Curve,
    CurveNode,
}

fn tag(kind: &ObjectKind<'_>) -> Tag {
    match kind {
        ObjectKind::Root => Tag::Root,
        ObjectKind::LimbNode => Tag::LimbNode,
        ObjectKind::NullNode => Tag::NullNode,
        ObjectKind::Mesh(_) => Tag::Mesh,
        ObjectKind::Geometry(_) => Tag::Geometry,
        ObjectKind::Material(_) => Tag::Material,
        ObjectKind::Texture(_) => Tag::Texture,
        ObjectKind::NodeAttribute(_) => Tag::NodeAttribute,
        ObjectKind::Skin(_) => Tag::Skin,
        ObjectKind::Cluster(_) => Tag::Cluster,
        ObjectKind::AnimationStack => Tag::Stack,
        ObjectKind::AnimationLayer(_) => Tag::Layer,
        ObjectKind::AnimationCurve(_) => Tag::Curve,
        ObjectKind::AnimationCurveNode(_) => Tag::CurveNode,
    }
}

/// Single pass over the connections in file order, applying the
/// type-specific linking rules. Edges touching an unresolved id are
/// skipped; cardinality violations abort the load.
fn link_connections<'a>(
    connections: &[Connection<'a>],
    object_map: &HashMap<ObjectId, ObjectEntry>,
    objects: &mut [Object<'a>],
) -> Result<(), Error> {
    for con in connections {
        let child = object_map.get(&con.from).and_then(|e| e.object);
        let parent = object_map.get(&con.to).and_then(|e| e.object);
        let (Some(ci), Some(pi)) = (child, parent) else {
            debug!(
                "skipping connection with unresolved endpoint {} -> {}",
                con.from, con.to
            );
            continue;
        };

        let ct = tag(&objects[ci].kind);
        let pt = tag(&objects[pi].kind);

        match ct {
            Tag::NodeAttribute => {
                if objects[pi].node_attribute.is_some() {
                    return Err(Error::DuplicateAttribute);
                }
                objects[pi].node_attribute = Some(con.from);
            }
            Tag::CurveNode if objects[pi].is_node => {
                let parent_id = objects[pi].id;
                if let ObjectKind::AnimationCurveNode(node) = &mut objects[ci].kind {
                    node.bone = Some(parent_id);
                    node.bone_link_property = con.property;
                }
            }
            _ => {}
        }

        match (pt, ct) {
            (Tag::Mesh, Tag::Geometry) => {
                let ObjectKind::Mesh(mesh) = &mut objects[pi].kind else {
                    unreachable!()
                };
                if mesh.geometry.is_some() {
                    return Err(Error::DuplicateGeometry);
                }
                mesh.geometry = Some(con.from);
            }
            (Tag::Mesh, Tag::Material) => {
                let ObjectKind::Mesh(mesh) = &mut objects[pi].kind else {
                    unreachable!()
                };
                mesh.materials.push(con.from);
            }
            (Tag::Skin, Tag::Cluster) => {
                let ObjectKind::Skin(skin) = &mut objects[pi].kind else {
                    unreachable!()
                };
                skin.clusters.push(con.from);
                let ObjectKind::Cluster(cluster) = &mut objects[ci].kind else {
                    unreachable!()
                };
                if cluster.skin.is_some() {
                    return Err(Error::DuplicateOwner);
                }
                cluster.skin = Some(con.to);
            }
            (Tag::Material, Tag::Texture) => {
                let slot = match con.property {
                    Some(p) if p == "NormalMap" => Some(1),
                    Some(p) if p == "DiffuseColor" => Some(0),
                    _ => None,
                };
                if let Some(slot) = slot {
                    let ObjectKind::Material(mat) = &mut objects[pi].kind else {
                        unreachable!()
                    };
                    if mat.textures[slot].is_some() {
                        // happens in the wild, e.g. two normal maps in use
                        debug!("duplicate texture connection ignored");
                    } else {
                        mat.textures[slot] = Some(con.from);
                    }
                }
            }
            (Tag::Geometry, Tag::Skin) => {
                let ObjectKind::Geometry(geom) = &mut objects[pi].kind else {
                    unreachable!()
                };
                geom.skin = Some(con.from);
            }
            (Tag::Cluster, Tag::LimbNode | Tag::Mesh | Tag::NullNode) => {
                let ObjectKind::Cluster(cluster) = &mut objects[pi].kind else {
                    unreachable!()
                };
                if cluster.link.is_some() {
                    return Err(Error::DuplicateLink);
                }
                cluster.link = Some(con.from);
            }
            (Tag::Layer, Tag::CurveNode) => {
                let ObjectKind::AnimationLayer(layer) = &mut objects[pi].kind else {
                    unreachable!()
                };
                layer.curve_nodes.push(con.from);
            }
            (Tag::CurveNode, Tag::Curve) => {
                let ObjectKind::AnimationCurveNode(node) = &mut objects[pi].kind else {
                    unreachable!()
                };
                let slot = node
                    .curves
                    .iter_mut()
                    .find(|s| s.is_none())
                    .ok_or(Error::TooManyCurves)?;
                *slot = Some(CurveSlot {
                    curve: con.from,
                    property: con.property,
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Expands every cluster's control-point indices and weights onto the
/// triangulated vertex slots of its skin's geometry.
fn postprocess_clusters(tree: &Tree<'_>, objects: &mut [Object<'_>]) -> Result<(), Error> {
    for i in 0..objects.len() {
        let Some(cluster) = objects[i].as_cluster() else {
            continue;
        };
        let element = objects[i].element;
        let skin_id = cluster
            .skin
            .ok_or(Error::PostprocessFailed("cluster has no skin"))?;

        let (indices, weights) = {
            let geom = objects
                .iter()
                .find_map(|o| o.as_geometry().filter(|g| g.skin == Some(skin_id)))
                .ok_or(Error::PostprocessFailed("no geometry for the skin"))?;

            let mut old_indices = Vec::new();
            if let Some(p) = tree.child_property(element, "Indexes") {
                old_indices = parse_i32_array(p)?;
            }
            let mut old_weights = Vec::new();
            if let Some(p) = tree.child_property(element, "Weights") {
                old_weights = parse_f64_array(p)?;
            }
            if old_indices.len() != old_weights.len() {
                return Err(Error::PostprocessFailed("index/weight count mismatch"));
            }

            let mut indices = Vec::with_capacity(old_indices.len());
            let mut weights = Vec::with_capacity(old_indices.len());
            for (&old, &w) in old_indices.iter().zip(&old_weights) {
                let slots = usize::try_from(old)
                    .ok()
                    .and_then(|o| geom.to_new_vertices.get(o));
                // control points never referenced by a triangle are skipped
                let Some(slots) = slots else { continue };
                for &new in slots {
                    indices.push(new);
                    weights.push(w);
                }
            }
            (indices, weights)
        };

        let ObjectKind::Cluster(cluster) = &mut objects[i].kind else {
            unreachable!()
        };
        cluster.indices = indices;
        cluster.weights = weights;
    }
    Ok(())
}

fn parse_global_settings(tree: &Tree<'_>) -> (GlobalSettings, f32) {
    let mut s = GlobalSettings::default();
    let mut frame_rate = -1.;
    let Some(settings) = tree.find_child(Tree::ROOT, "GlobalSettings") else {
        return (s, frame_rate);
    };
    let Some(props) = tree.find_child(settings, "Properties70") else {
        return (s, frame_rate);
    };
    for node in tree.children(props) {
        let el = tree.get(node);
        let Some(first) = el.first_property() else {
            continue;
        };
        if let Some(p) = el.property(4) {
            let v = p.value;
            if first.value == "UpAxis" {
                s.up_axis = v.to_i32();
            } else if first.value == "UpAxisSign" {
                s.up_axis_sign = v.to_i32();
            } else if first.value == "FrontAxis" {
                s.front_axis = v.to_i32();
            } else if first.value == "FrontAxisSign" {
                s.front_axis_sign = v.to_i32();
            } else if first.value == "CoordAxis" {
                s.coord_axis = v.to_i32();
            } else if first.value == "CoordAxisSign" {
                s.coord_axis_sign = v.to_i32();
            } else if first.value == "OriginalUpAxis" {
                s.original_up_axis = v.to_i32();
            } else if first.value == "OriginalUpAxisSign" {
                s.original_up_axis_sign = v.to_i32();
            } else if first.value == "UnitScaleFactor" {
                s.unit_scale_factor = v.to_f64();
            } else if first.value == "OriginalUnitScaleFactor" {
                s.original_unit_scale_factor = v.to_f64();
            } else if first.value == "TimeSpanStart" {
                s.time_span_start = v.to_i64();
            } else if first.value == "TimeSpanStop" {
                s.time_span_stop = v.to_i64();
            } else if first.value == "TimeMode" {
                s.time_mode = FrameRate::from_i32(v.to_i32());
            } else if first.value == "CustomFrameRate" {
                s.custom_frame_rate = v.to_f32();
            }
        }
        frame_rate = framerate_from_time_mode(s.time_mode, s.custom_frame_rate);
    }
    (s, frame_rate)
}
