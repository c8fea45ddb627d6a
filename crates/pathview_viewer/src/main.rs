mod app;
mod cornell;
mod settings;

use anyhow::{Context, Result};
use app::{App, Flow};
use pathview_engine::{CpuEngine, RenderSettings};
use pathview_scene::{CoordinatorSettings, EditorSettings, RenderContext, SceneEditor};
use settings::ViewerSettings;
use std::time::Instant;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let settings = ViewerSettings::from_args(std::env::args().skip(1))?;
    log::info!(
        "Starting path tracer {}x{} ({} spp, depth {})",
        settings.width,
        settings.height,
        settings.sqrt_samples * settings.sqrt_samples,
        settings.max_depth
    );

    let engine = CpuEngine::new(
        RenderSettings::default()
            .with_sqrt_samples(settings.sqrt_samples)
            .with_max_depth(settings.max_depth),
    );
    let editor_settings = EditorSettings {
        coordinator: CoordinatorSettings::default()
            .with_size(settings.width, settings.height)
            .with_timeout(settings.timeout()),
        device_pixel_ratio: settings.device_pixel_ratio,
        ..EditorSettings::default()
    };
    let mut editor = SceneEditor::new(RenderContext::new(engine), editor_settings)
        .context("failed to set up the scene")?;
    cornell::build(&mut editor, settings.mesh.as_deref())?;

    let mut app = App::new(editor, settings.output.clone());
    let start = Instant::now();

    let mut exited = false;
    for event in &settings.events {
        log::debug!("Event {:?}", event);
        if app.handle_event(event)? == Flow::Exit {
            exited = true;
            break;
        }
    }
    if !exited {
        app.render(settings.frames)?;
    }

    let stats = app.editor().stats();
    log::info!(
        "Traced {} frames in {:.2?} ({} nodes, {} primitives)",
        app.traced(),
        start.elapsed(),
        stats.nodes,
        stats.primitives
    );

    if app.saved().is_empty() {
        app.save()?;
    }
    app.shutdown();
    Ok(())
}
