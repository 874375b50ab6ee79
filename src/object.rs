//! Resolved scene objects.
//!
//! One flat `Object` record per FBX object id, with the per-kind payload in
//! [`ObjectKind`]. Objects never own each other; every cross reference is an
//! object id looked up through the scene table, so the reference cycles of
//! the format (mesh -> geometry -> skin -> cluster -> mesh) stay cycles of
//! plain ids.

use crate::data::DataView;
use crate::math::{Color, Matrix, Vec2, Vec3, Vec4};
use crate::tree::ElementId;

pub type ObjectId = u64;

/// The id every document reserves for the synthetic root object.
pub const ROOT_ID: ObjectId = 0;

/// Number of UV channels a geometry can carry.
pub const UV_MAX: usize = 4;

#[derive(Debug)]
pub struct Object<'a> {
    /// Stable id from the file's own object-id space.
    pub id: ObjectId,
    /// Display name: the part of the 2nd property before the
    /// `\x00\x01` class separator.
    pub name: String,
    /// The generic element this object was built from.
    pub element: ElementId,
    /// True for objects that take part in the node hierarchy.
    pub is_node: bool,
    /// Attached node attribute, if any.
    pub node_attribute: Option<ObjectId>,
    pub kind: ObjectKind<'a>,
}

#[derive(Debug)]
pub enum ObjectKind<'a> {
    Root,
    LimbNode,
    NullNode,
    Mesh(Mesh),
    Geometry(Geometry),
    Material(Material),
    Texture(Texture<'a>),
    NodeAttribute(NodeAttribute<'a>),
    Skin(Skin),
    Cluster(Cluster),
    AnimationStack,
    AnimationLayer(AnimationLayer),
    AnimationCurve(AnimationCurve),
    AnimationCurveNode(AnimationCurveNode<'a>),
}

#[derive(Debug, Default)]
pub struct Mesh {
    pub geometry: Option<ObjectId>,
    pub materials: Vec<ObjectId>,
}

/// Triangulated geometry buffers, one entry per triangulated vertex slot
/// except `materials` (one entry per triangle).
#[derive(Debug, Default)]
pub struct Geometry {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: [Vec<Vec2>; UV_MAX],
    pub colors: Vec<Vec4>,
    pub tangents: Vec<Vec3>,
    pub materials: Vec<i32>,
    pub skin: Option<ObjectId>,
    /// `to_old_vertices[new] = old` control-point index.
    pub to_old_vertices: Vec<usize>,
    /// Reverse multimap: control point -> every triangulated slot that
    /// references it. Used to splat per-control-point cluster weights.
    pub(crate) to_new_vertices: Vec<Vec<usize>>,
}

/// Texture slots a material can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    Diffuse = 0,
    Normal = 1,
}

#[derive(Debug)]
pub struct Material {
    pub diffuse_color: Color,
    pub textures: [Option<ObjectId>; 2],
}

impl Material {
    pub fn texture(&self, kind: TextureKind) -> Option<ObjectId> {
        self.textures[kind as usize]
    }
}

#[derive(Debug, Default)]
pub struct Texture<'a> {
    pub filename: Option<DataView<'a>>,
    pub relative_filename: Option<DataView<'a>>,
}

#[derive(Debug, Default)]
pub struct NodeAttribute<'a> {
    pub attribute_type: Option<DataView<'a>>,
}

#[derive(Debug, Default)]
pub struct Skin {
    pub clusters: Vec<ObjectId>,
}

#[derive(Debug, Default)]
pub struct Cluster {
    /// The node (limb, mesh or null) this cluster deforms with.
    pub link: Option<ObjectId>,
    /// Owning skin; a cluster belongs to exactly one.
    pub skin: Option<ObjectId>,
    /// Triangulated vertex slots, expanded from control-point indices.
    pub indices: Vec<usize>,
    pub weights: Vec<f64>,
    pub transform: Matrix,
    pub transform_link: Matrix,
}

#[derive(Debug, Default)]
pub struct AnimationLayer {
    pub curve_nodes: Vec<ObjectId>,
}

#[derive(Debug, Default)]
pub struct AnimationCurve {
    /// Key times in FBX ticks.
    pub times: Vec<i64>,
    pub values: Vec<f32>,
}

/// One of the up-to-three component curves of a curve node, together with
/// the connection property that routed it there.
#[derive(Debug, Clone, Copy)]
pub struct CurveSlot<'a> {
    pub curve: ObjectId,
    pub property: Option<DataView<'a>>,
}

#[derive(Debug, Default)]
pub struct AnimationCurveNode<'a> {
    /// X/Y/Z component slots, filled in connection file order.
    pub curves: [Option<CurveSlot<'a>>; 3],
    /// The node this curve node animates, when connected to one.
    pub bone: Option<ObjectId>,
    /// The animated property name from the `OP` connection
    /// (e.g. `Lcl Translation`).
    pub bone_link_property: Option<DataView<'a>>,
}

impl<'a> Object<'a> {
    pub(crate) fn new(id: ObjectId, name: String, element: ElementId, kind: ObjectKind<'a>) -> Self {
        let is_node = matches!(
            kind,
            ObjectKind::Root | ObjectKind::LimbNode | ObjectKind::NullNode | ObjectKind::Mesh(_)
        );
        Object {
            id,
            name,
            element,
            is_node,
            node_attribute: None,
            kind,
        }
    }

    pub fn as_geometry(&self) -> Option<&Geometry> {
        match &self.kind {
            ObjectKind::Geometry(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            ObjectKind::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_material(&self) -> Option<&Material> {
        match &self.kind {
            ObjectKind::Material(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_cluster(&self) -> Option<&Cluster> {
        match &self.kind {
            ObjectKind::Cluster(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_skin(&self) -> Option<&Skin> {
        match &self.kind {
            ObjectKind::Skin(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_animation_curve(&self) -> Option<&AnimationCurve> {
        match &self.kind {
            ObjectKind::AnimationCurve(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_animation_curve_node(&self) -> Option<&AnimationCurveNode<'a>> {
        match &self.kind {
            ObjectKind::AnimationCurveNode(n) => Some(n),
            _ => None,
        }
    }
}
