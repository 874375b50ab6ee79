//! The aggregate root a successful load returns, plus the scene-level
//! metadata records: connections, take (animation clip) info, global
//! settings, and the time-mode frame-rate table.

use std::collections::HashMap;

use crate::data::DataView;
use crate::object::{Object, ObjectId, ROOT_ID};
use crate::tree::{Element, ElementId, Tree};

/// FBX ticks per second; time values divide by this to become seconds.
const TICKS_PER_SECOND: f64 = 46_186_158_000.;

/// Converts an FBX-internal 64-bit tick count to seconds.
pub fn fbx_time_to_seconds(value: i64) -> f64 {
    value as f64 / TICKS_PER_SECOND
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    ObjectObject,
    ObjectProperty,
}

/// A directed `from -> to` edge from the `Connections` node, in file order.
/// File order matters: it decides which of the up-to-three curve slots of a
/// curve node each `AnimationCurve` lands in.
#[derive(Debug, Clone, Copy)]
pub struct Connection<'a> {
    pub from: ObjectId,
    pub to: ObjectId,
    pub kind: ConnectionKind,
    /// Target property name, present on `OP` edges.
    pub property: Option<DataView<'a>>,
}

/// Named animation clip metadata from the `Takes` node.
#[derive(Debug, Clone, Copy)]
pub struct TakeInfo<'a> {
    pub name: DataView<'a>,
    pub filename: Option<DataView<'a>>,
    /// Local time range, in seconds.
    pub local_time: Option<(f64, f64)>,
    /// Reference time range, in seconds.
    pub reference_time: Option<(f64, f64)>,
}

/// Standard frame-rate modes of the format's time system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameRate {
    #[default]
    Default,
    Fps120,
    Fps100,
    Fps60,
    Fps50,
    Fps48,
    Fps30,
    Fps30Drop,
    NtscDropFrame,
    NtscFullFrame,
    Pal,
    Cinema,
    Fps1000,
    CinemaNd,
    Custom,
}

impl FrameRate {
    pub fn from_i32(v: i32) -> FrameRate {
        use FrameRate::*;
        match v {
            0 => Default,
            1 => Fps120,
            2 => Fps100,
            3 => Fps60,
            4 => Fps50,
            5 => Fps48,
            6 => Fps30,
            7 => Fps30Drop,
            8 => NtscDropFrame,
            9 => NtscFullFrame,
            10 => Pal,
            11 => Cinema,
            12 => Fps1000,
            13 => CinemaNd,
            14 => Custom,
            _ => Default,
        }
    }
}

/// Effective frames-per-second for a time mode; `custom` only applies to
/// [`FrameRate::Custom`].
pub fn framerate_from_time_mode(mode: FrameRate, custom: f32) -> f32 {
    use FrameRate::*;
    match mode {
        Default => 1.,
        Fps120 => 120.,
        Fps100 => 100.,
        Fps60 => 60.,
        Fps50 => 50.,
        Fps48 => 48.,
        Fps30 | Fps30Drop => 30.,
        NtscDropFrame | NtscFullFrame => 29.970_026,
        Pal => 25.,
        Cinema => 24.,
        Fps1000 => 1000.,
        CinemaNd => 23.976,
        Custom => custom,
    }
}

/// Axis, unit and time configuration from `GlobalSettings/Properties70`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalSettings {
    pub up_axis: i32,
    pub up_axis_sign: i32,
    pub front_axis: i32,
    pub front_axis_sign: i32,
    pub coord_axis: i32,
    pub coord_axis_sign: i32,
    pub original_up_axis: i32,
    pub original_up_axis_sign: i32,
    pub unit_scale_factor: f64,
    pub original_unit_scale_factor: f64,
    /// Time span bounds in FBX ticks.
    pub time_span_start: i64,
    pub time_span_stop: i64,
    pub time_mode: FrameRate,
    pub custom_frame_rate: f32,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        GlobalSettings {
            up_axis: 1,
            up_axis_sign: 1,
            front_axis: 0,
            front_axis_sign: 1,
            coord_axis: 2,
            coord_axis_sign: 1,
            original_up_axis: 1,
            original_up_axis_sign: 1,
            unit_scale_factor: 1.,
            original_unit_scale_factor: 1.,
            time_span_start: 0,
            time_span_stop: 0,
            time_mode: FrameRate::Default,
            custom_frame_rate: -1.,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ObjectEntry {
    pub element: ElementId,
    /// Index into the scene's object list, once pass 2 resolved one.
    pub object: Option<usize>,
}

/// The read-only result of loading a document. Owns the element tree, every
/// resolved object, and the scene-level metadata; everything hands out
/// borrows only.
#[derive(Debug)]
pub struct Scene<'a> {
    pub(crate) tree: Tree<'a>,
    pub(crate) objects: Vec<Object<'a>>,
    pub(crate) object_map: HashMap<ObjectId, ObjectEntry>,
    pub(crate) connections: Vec<Connection<'a>>,
    pub(crate) meshes: Vec<ObjectId>,
    pub(crate) animation_stacks: Vec<ObjectId>,
    pub(crate) take_infos: Vec<TakeInfo<'a>>,
    pub(crate) settings: GlobalSettings,
    pub(crate) frame_rate: f32,
}

impl<'a> Scene<'a> {
    /// The generic element tree the scene was resolved from.
    pub fn root_element(&self) -> &Element<'a> {
        self.tree.get(Tree::ROOT)
    }

    pub fn tree(&self) -> &Tree<'a> {
        &self.tree
    }

    /// The synthetic root object (id 0).
    pub fn root(&self) -> &Object<'a> {
        self.object(ROOT_ID).unwrap()
    }

    /// Object lookup by file id.
    pub fn object(&self, id: ObjectId) -> Option<&Object<'a>> {
        let entry = self.object_map.get(&id)?;
        entry.object.map(|i| &self.objects[i])
    }

    /// Every resolved object, in resolution order.
    pub fn objects(&self) -> &[Object<'a>] {
        &self.objects
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn mesh(&self, idx: usize) -> Option<&Object<'a>> {
        self.meshes.get(idx).and_then(|&id| self.object(id))
    }

    pub fn animation_stack_count(&self) -> usize {
        self.animation_stacks.len()
    }

    pub fn animation_stack(&self, idx: usize) -> Option<&Object<'a>> {
        self.animation_stacks
            .get(idx)
            .and_then(|&id| self.object(id))
    }

    pub fn connections(&self) -> &[Connection<'a>] {
        &self.connections
    }

    pub fn take_infos(&self) -> &[TakeInfo<'a>] {
        &self.take_infos
    }

    /// Take metadata lookup by clip name.
    pub fn take_info(&self, name: &str) -> Option<&TakeInfo<'a>> {
        self.take_infos.iter().find(|t| t.name == name)
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    /// Effective scene frame rate; -1 when the document does not set one.
    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }
}

#[test]
fn test_tick_conversion() {
    assert_eq!(fbx_time_to_seconds(46_186_158_000), 1.0);
    assert_eq!(fbx_time_to_seconds(0), 0.0);
    assert_eq!(fbx_time_to_seconds(23_093_079_000), 0.5);
}

#[test]
fn test_framerate_table() {
    assert_eq!(framerate_from_time_mode(FrameRate::Pal, -1.), 25.);
    assert_eq!(framerate_from_time_mode(FrameRate::Cinema, -1.), 24.);
    assert_eq!(framerate_from_time_mode(FrameRate::Custom, 12.5), 12.5);
    assert_eq!(framerate_from_time_mode(FrameRate::from_i32(6), -1.), 30.);
    // unknown modes fall back to the default mode
    assert_eq!(framerate_from_time_mode(FrameRate::from_i32(99), -1.), 1.);
}
