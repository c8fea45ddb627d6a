//! The Cornell box test scene.

use anyhow::{Context, Result};
use pathview_math::Vec3;
use pathview_scene::{
    GeometryHandle, MaterialKind, ParamValue, PrimitiveKind, SceneEditor,
};
use std::path::Path;

const WHITE: Vec3 = Vec3::new(0.9, 0.9, 0.9);
const GREEN: Vec3 = Vec3::new(0.05, 0.8, 0.05);
const RED: Vec3 = Vec3::new(0.8, 0.05, 0.05);
const LIGHT: Vec3 = Vec3::new(15.0, 15.0, 5.0);

/// Box interior extents.
const WIDTH: f32 = 556.0;
const HEIGHT: f32 = 548.8;
const DEPTH: f32 = 559.2;

struct Panel {
    name: &'static str,
    position: Vec3,
    rotation: Vec3,
    color: Vec3,
}

/// Add the walls, the light and optionally an imported mesh. Returns the
/// handles in insertion order.
pub fn build(editor: &mut SceneEditor, mesh: Option<&Path>) -> Result<Vec<GeometryHandle>> {
    let panels = [
        Panel {
            name: "floor",
            position: Vec3::new(WIDTH / 2.0, 0.0, DEPTH / 2.0),
            rotation: Vec3::ZERO,
            color: WHITE,
        },
        Panel {
            name: "ceiling",
            position: Vec3::new(WIDTH / 2.0, HEIGHT, DEPTH / 2.0),
            rotation: Vec3::ZERO,
            color: WHITE,
        },
        Panel {
            name: "back",
            position: Vec3::new(WIDTH / 2.0, DEPTH / 2.0, DEPTH),
            rotation: Vec3::new(90.0, 0.0, 0.0),
            color: WHITE,
        },
        Panel {
            name: "right",
            position: Vec3::new(0.0, HEIGHT / 2.0, DEPTH / 2.0),
            rotation: Vec3::new(0.0, 0.0, 90.0),
            color: GREEN,
        },
        Panel {
            name: "left",
            position: Vec3::new(WIDTH, HEIGHT / 2.0, DEPTH / 2.0),
            rotation: Vec3::new(0.0, 0.0, 90.0),
            color: RED,
        },
    ];

    let mut handles = Vec::with_capacity(panels.len() + 2);
    for panel in &panels {
        let handle = editor.add_geometry(PrimitiveKind::Parallelogram)?;
        editor.rename(handle, panel.name);
        editor.set_pose(handle, panel.position, panel.rotation, Vec3::new(WIDTH, 1.0, DEPTH))?;
        editor.set_param(handle, "diffuse_color", ParamValue::Float3(panel.color))?;
        handles.push(handle);
    }

    let light = editor.add_geometry(PrimitiveKind::Parallelogram)?;
    editor.rename(light, "light");
    editor.set_pose(
        light,
        Vec3::new(WIDTH / 2.0, 548.6, DEPTH / 2.0),
        Vec3::ZERO,
        Vec3::new(260.0, 1.0, 210.0),
    )?;
    editor.set_material(light, MaterialKind::DiffuseEmitter)?;
    editor.set_param(light, "emission_color", ParamValue::Float3(LIGHT))?;
    handles.push(light);

    if let Some(path) = mesh {
        let handle = editor
            .import_mesh(path)
            .with_context(|| format!("failed to add mesh {}", path.display()))?;
        editor.set_pose(
            handle,
            Vec3::new(WIDTH / 2.0, 0.0, DEPTH / 3.0),
            Vec3::ZERO,
            Vec3::splat(15.0),
        )?;
        editor.set_param(handle, "diffuse_color", ParamValue::Float3(WHITE))?;
        handles.push(handle);
    }

    log::info!("Cornell box ready: {} nodes", handles.len());
    Ok(handles)
}
