use fbxscene::object::ObjectKind;
use fbxscene::{load, Error};

#[test]
fn test_full_text_scene() {
    let _ = env_logger::builder().is_test(true).try_init();
    let src = br#"; FBX project file
GlobalSettings:  {
    Version: 1000
    Properties70:  {
        P: "UpAxis", "int", "Integer", "", 1
        P: "UpAxisSign", "int", "Integer", "", 1
        P: "UnitScaleFactor", "double", "Number", "", 2.5
        P: "TimeMode", "enum", "", "", 11
    }
}
Objects:  {
    Geometry: 100, "Geometry::Plane", "Mesh" {
        Vertices: *12 {
            a: 0,0,0,1,0,0,1,1,0,0,1,0
        }
        PolygonVertexIndex: *4 {
            a: 0,1,2,-4
        }
        LayerElementNormal: 0 {
            MappingInformationType: "ByPolygonVertex"
            ReferenceInformationType: "Direct"
            Normals: *12 {
                a: 0,0,1,0,0,1,0,0,1,0,0,1
            }
        }
        LayerElementUV: 0 {
            MappingInformationType: "ByPolygonVertex"
            ReferenceInformationType: "IndexToDirect"
            UV: *4 {
                a: 0,0,1,1.0
            }
            UVIndex: *4 {
                a: 0,1,1,0
            }
        }
        LayerElementMaterial: 0 {
            MappingInformationType: "ByPolygon"
            ReferenceInformationType: "IndexToDirect"
            Materials: *1 {
                a: 7
            }
        }
    }
    Model: 200, "Model::Plane", "Mesh" {
    }
    Material: 300, "Material::Red" {
        Properties70:  {
            P: "DiffuseColor", "Color", "", "A", 0.8,0.25,0.125
        }
    }
    Texture: 400, "Texture::Tex" {
        FileName: "C:/tex.png"
        RelativeFilename: "tex.png"
    }
}
Connections:  {
    C: "OO", 100, 200
    C: "OO", 300, 200
    C: "OP", 400, 300, "DiffuseColor"
}
Takes:  {
    Current: "Take 001"
    Take: "Take 001" {
        FileName: "Take_001.tak"
        LocalTime: 0, 46186158000
        ReferenceTime: 0, 92372316000
    }
}
"#;
    let scene = load(src).unwrap();

    // mesh <- geometry <- layers
    assert_eq!(scene.mesh_count(), 1);
    let mesh = scene.mesh(0).unwrap();
    assert_eq!(mesh.name, "Model::Plane");
    let mesh_data = mesh.as_mesh().unwrap();
    assert_eq!(mesh_data.geometry, Some(100));
    assert_eq!(mesh_data.materials, vec![300]);

    let geom = scene.object(100).unwrap().as_geometry().unwrap();
    // one quad fans into two triangles
    assert_eq!(geom.vertices.len(), 6);
    assert_eq!(geom.to_old_vertices, vec![0, 1, 2, 0, 2, 3]);
    assert_eq!(geom.vertices[3], [0., 0., 0.]);
    assert_eq!(geom.vertices[5], [0., 1., 0.]);
    assert_eq!(geom.normals.len(), 6);
    assert!(geom.normals.iter().all(|&n| n == [0., 0., 1.]));
    assert_eq!(
        geom.uvs[0],
        vec![[0., 0.], [1., 1.], [1., 1.], [0., 0.], [1., 1.], [0., 0.]]
    );
    // the per-polygon material index repeats for both triangles
    assert_eq!(geom.materials, vec![7, 7]);

    // material color and its diffuse texture slot
    let mat = scene.object(300).unwrap().as_material().unwrap();
    assert!((mat.diffuse_color.r - 0.8).abs() < 1e-6);
    assert!((mat.diffuse_color.g - 0.25).abs() < 1e-6);
    assert!((mat.diffuse_color.b - 0.125).abs() < 1e-6);
    assert_eq!(mat.textures[0], Some(400));
    assert_eq!(mat.textures[1], None);

    let ObjectKind::Texture(tex) = &scene.object(400).unwrap().kind else {
        panic!("not a texture");
    };
    assert!(tex.filename.unwrap() == "C:/tex.png");
    assert!(tex.relative_filename.unwrap() == "tex.png");

    // global settings and the derived frame rate
    assert_eq!(scene.settings().up_axis, 1);
    assert_eq!(scene.settings().unit_scale_factor, 2.5);
    assert_eq!(scene.frame_rate(), 24.);

    // takes
    let take = scene.take_info("Take 001").unwrap();
    assert!(take.filename.unwrap() == "Take_001.tak");
    assert_eq!(take.local_time, Some((0., 1.)));
    assert_eq!(take.reference_time, Some((0., 2.)));
    assert!(scene.take_info("Nope").is_none());
}

#[test]
fn test_skinning_and_animation() {
    let src = br#"Objects:  {
    Geometry: 100, "Geometry::Skinned", "Mesh" {
        Vertices: *9 {
            a: 0,0,0,1,0,0,0,1,0
        }
        PolygonVertexIndex: *3 {
            a: 0,1,-3
        }
    }
    Model: 200, "Model::Skinned", "Mesh" {
    }
    Model: 210, "Model::Bone", "LimbNode" {
    }
    NodeAttribute: 215, "NodeAttribute::", "LimbNode" {
        TypeFlags: "Skeleton"
    }
    Deformer: 300, "Deformer::", "Skin" {
    }
    Deformer: 310, "SubDeformer::", "Cluster" {
        Indexes: *2 {
            a: 0,2
        }
        Weights: *2 {
            a: 0.5,1.0
        }
        Transform: *16 {
            a: 1,0,0,0,0,1,0,0,0,0,1,0,0,0,0,1
        }
        TransformLink: *16 {
            a: 1,0,0,0,0,1,0,0,0,0,1,0,5,6,7,1
        }
    }
    AnimationStack: 400, "AnimStack::Take 001", "" {
    }
    AnimationLayer: 410, "AnimLayer::BaseLayer", "" {
    }
    AnimationCurveNode: 420, "AnimCurveNode::T", "" {
    }
    AnimationCurve: 430, "AnimCurve::", "" {
        KeyTime: *2 {
            a: 0,46186158000
        }
        KeyValueFloat: *2 {
            a: 0,1.5
        }
    }
}
Connections:  {
    C: "OO", 100, 200
    C: "OO", 300, 100
    C: "OO", 310, 300
    C: "OO", 210, 310
    C: "OO", 215, 210
    C: "OO", 410, 400
    C: "OO", 420, 410
    C: "OP", 420, 210, "Lcl Translation"
    C: "OP", 430, 420, "d|X"
}
"#;
    let scene = load(src).unwrap();

    let geom = scene.object(100).unwrap().as_geometry().unwrap();
    assert_eq!(geom.skin, Some(300));

    let skin = scene.object(300).unwrap().as_skin().unwrap();
    assert_eq!(skin.clusters, vec![310]);

    let cluster = scene.object(310).unwrap().as_cluster().unwrap();
    assert_eq!(cluster.skin, Some(300));
    assert_eq!(cluster.link, Some(210));
    // control-point weights expanded onto triangulated slots
    assert_eq!(cluster.indices, vec![0, 2]);
    assert_eq!(cluster.weights, vec![0.5, 1.0]);
    assert_eq!(&cluster.transform_link.m[12..15], &[5., 6., 7.]);

    // node attribute attachment
    let bone = scene.object(210).unwrap();
    assert!(bone.is_node);
    assert_eq!(bone.node_attribute, Some(215));

    // animation chain: stack, layer, curve node, curve
    assert_eq!(scene.animation_stack_count(), 1);
    assert_eq!(scene.animation_stack(0).unwrap().id, 400);
    let ObjectKind::AnimationLayer(layer) = &scene.object(410).unwrap().kind else {
        panic!("not a layer");
    };
    assert_eq!(layer.curve_nodes, vec![420]);

    let node = scene.object(420).unwrap().as_animation_curve_node().unwrap();
    assert_eq!(node.bone, Some(210));
    assert!(node.bone_link_property.unwrap() == "Lcl Translation");
    let slot = node.curves[0].unwrap();
    assert_eq!(slot.curve, 430);
    assert!(slot.property.unwrap() == "d|X");
    assert!(node.curves[1].is_none());

    let curve = scene.object(430).unwrap().as_animation_curve().unwrap();
    assert_eq!(curve.times, vec![0, 46_186_158_000]);
    assert_eq!(curve.values, vec![0., 1.5]);
    assert_eq!(fbxscene::fbx_time_to_seconds(curve.times[1]), 1.0);
}

#[test]
fn test_duplicate_geometry_fails() {
    let src = br#"Objects:  {
    Geometry: 100, "Geometry::A", "Mesh" {
        Vertices: *3 {
            a: 0,0,0
        }
        PolygonVertexIndex: *3 {
            a: 0,0,-1
        }
    }
    Geometry: 101, "Geometry::B", "Mesh" {
        Vertices: *3 {
            a: 0,0,0
        }
        PolygonVertexIndex: *3 {
            a: 0,0,-1
        }
    }
    Model: 200, "Model::M", "Mesh" {
    }
}
Connections:  {
    C: "OO", 100, 200
    C: "OO", 101, 200
}
"#;
    assert_eq!(load(src).unwrap_err(), Error::DuplicateGeometry);
}

#[test]
fn test_fourth_curve_fails() {
    let src = br#"Objects:  {
    AnimationCurveNode: 1, "AnimCurveNode::T", "" {
    }
    AnimationCurve: 2, "AnimCurve::", "" {
    }
    AnimationCurve: 3, "AnimCurve::", "" {
    }
    AnimationCurve: 4, "AnimCurve::", "" {
    }
    AnimationCurve: 5, "AnimCurve::", "" {
    }
}
Connections:  {
    C: "OP", 2, 1, "d|X"
    C: "OP", 3, 1, "d|Y"
    C: "OP", 4, 1, "d|Z"
    C: "OP", 5, 1, "d|W"
}
"#;
    assert_eq!(load(src).unwrap_err(), Error::TooManyCurves);
}

#[test]
fn test_cluster_owned_twice_fails() {
    let src = br#"Objects:  {
    Deformer: 1, "Deformer::", "Skin" {
    }
    Deformer: 2, "Deformer::", "Skin" {
    }
    Deformer: 3, "SubDeformer::", "Cluster" {
    }
}
Connections:  {
    C: "OO", 3, 1
    C: "OO", 3, 2
}
"#;
    assert_eq!(load(src).unwrap_err(), Error::DuplicateOwner);
}

#[test]
fn test_duplicate_node_attribute_fails() {
    let src = br#"Objects:  {
    Model: 1, "Model::Bone", "LimbNode" {
    }
    NodeAttribute: 2, "NodeAttribute::", "" {
    }
    NodeAttribute: 3, "NodeAttribute::", "" {
    }
}
Connections:  {
    C: "OO", 2, 1
    C: "OO", 3, 1
}
"#;
    assert_eq!(load(src).unwrap_err(), Error::DuplicateAttribute);
}

#[test]
fn test_unknown_connection_tag_fails() {
    let src = br#"Connections:  {
    C: "PP", 1, 2
}
"#;
    assert_eq!(load(src).unwrap_err(), Error::UnsupportedConnection);
}

#[test]
fn test_unresolved_connection_endpoints_are_skipped() {
    // edges touching ids that never resolved are soft-skipped
    let src = br#"Objects:  {
    Model: 200, "Model::M", "Mesh" {
    }
    Pose: 900, "Pose::", "BindPose" {
    }
}
Connections:  {
    C: "OO", 999, 200
    C: "OO", 900, 200
}
"#;
    let scene = load(src).unwrap();
    assert_eq!(scene.mesh_count(), 1);
    // the Pose element enumerates but produces no object
    assert!(scene.object(900).is_none());
    assert!(scene.object(999).is_none());
}

#[test]
fn test_invalid_object_id_fails() {
    let src = br#"Objects:  {
    Model: "notanid", "Model::M", "Mesh" {
    }
}
"#;
    assert_eq!(load(src).unwrap_err(), Error::InvalidObjectId);
}

#[test]
fn test_curve_count_mismatch_fails() {
    let src = br#"Objects:  {
    AnimationCurve: 2, "AnimCurve::", "" {
        KeyTime: *2 {
            a: 0,100
        }
        KeyValueFloat: *3 {
            a: 0,1,2
        }
    }
}
"#;
    assert_eq!(load(src).unwrap_err(), Error::InvalidCurve);
}

#[test]
fn test_missing_vertices_fails() {
    let src = br#"Objects:  {
    Geometry: 100, "Geometry::A", "Mesh" {
        PolygonVertexIndex: *3 {
            a: 0,0,-1
        }
    }
}
"#;
    assert_eq!(load(src).unwrap_err(), Error::MissingData("Vertices"));
}
