//! Read-only FBX scene loading.
//!
//! Feed [`load`] a whole document buffer (binary container or the legacy
//! ASCII dialect, auto-detected) and get back a [`Scene`] to traverse:
//! meshes with triangulated geometry buffers, materials and textures,
//! skin/cluster deformers, and animation stacks/layers/curves, all wired
//! together through the file's object-id connection graph.

/// Borrowed byte spans and scalar conversion.
pub mod data;

/// The load error taxonomy.
pub mod error;

/// Plain vector/matrix/color aggregates.
pub mod math;

/// Resolved scene objects.
pub mod object;

/// Scene aggregate root and scene-level metadata.
pub mod scene;

/// Byte buffer -> generic element tree.
pub mod tokenize;

/// The generic element tree both tokenizers produce.
pub mod tree;

mod array;
mod cursor;
mod geometry;
mod resolve;

pub use data::DataView;
pub use error::Error;
pub use object::{Object, ObjectId, ObjectKind};
pub use scene::{
    fbx_time_to_seconds, framerate_from_time_mode, FrameRate, GlobalSettings, Scene, TakeInfo,
};

/// Loads a scene from a whole in-memory document.
///
/// The scene borrows from `data` for its entire lifetime; nothing is read
/// lazily afterwards and nothing global is touched, so concurrent loads of
/// different buffers are independent.
pub fn load(data: &[u8]) -> Result<Scene<'_>, Error> {
    let tree = tokenize::tokenize(data)?;
    resolve::into_scene(tree)
}

#[test]
fn test_minimal_text_model() {
    // a lone Model element resolves to a mesh object with no geometry
    // attached, and that is not an error
    let scene = load(b"Model: 123, \"Model::Cube\", \"Mesh\" {\n}\n").unwrap();
    assert_eq!(scene.mesh_count(), 1);
    let mesh = scene.mesh(0).unwrap();
    assert_eq!(mesh.id, 123);
    assert_eq!(mesh.name, "Model::Cube");
    assert!(mesh.is_node);
    assert_eq!(mesh.as_mesh().unwrap().geometry, None);
}

#[test]
fn test_root_is_always_id_zero() {
    let scene = load(b"Objects:  {\n\tModel: 0, \"Model::Evil\", \"Mesh\" {\n\t}\n}\n").unwrap();
    // a file object claiming id 0 cannot displace the reserved root
    assert!(matches!(scene.root().kind, ObjectKind::Root));
    assert_eq!(scene.root().name, "RootNode");
    assert_eq!(scene.mesh_count(), 0);
}

#[test]
fn test_format_detection() {
    assert!(!tokenize::is_binary(b"; FBX 6.1.0 project file\n"));
    assert!(tokenize::is_binary(b"Kaydara FBX Binary  \x00\x1a\x00rest"));
}
