//! Headless application state: routes input events to the scene editor and
//! runs the progressive render loop.

use crate::settings::{InputEvent, Key, MouseButton};
use anyhow::{Context, Result};
use log::{error, info, warn};
use pathview_scene::{DragMode, SceneEditor, SceneError, TickStatus};
use std::path::PathBuf;

/// Whether the session should keep going after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct App {
    editor: SceneEditor,
    output: PathBuf,
    /// Button currently held, if it started a drag
    held: Option<MouseButton>,
    traced: u64,
    saved: Vec<PathBuf>,
}

impl App {
    pub fn new(editor: SceneEditor, output: PathBuf) -> Self {
        Self {
            editor,
            output,
            held: None,
            traced: 0,
            saved: Vec::new(),
        }
    }

    pub fn editor(&self) -> &SceneEditor {
        &self.editor
    }

    /// Frames traced so far.
    pub fn traced(&self) -> u64 {
        self.traced
    }

    pub fn saved(&self) -> &[PathBuf] {
        &self.saved
    }

    pub fn handle_event(&mut self, event: &InputEvent) -> Result<Flow> {
        match *event {
            InputEvent::Press { button, x, y } => {
                let mode = match button {
                    MouseButton::Left => DragMode::Orbit,
                    MouseButton::Right => DragMode::Pan,
                };
                if self.editor.begin_drag(mode, x, y) {
                    self.held = Some(button);
                }
            }
            InputEvent::Move { x, y } => {
                if self.held.is_some() {
                    self.editor.drag_to(x, y)?;
                }
            }
            InputEvent::Release { button } => {
                if self.held == Some(button) {
                    self.editor.end_drag();
                    self.held = None;
                }
            }
            InputEvent::Wheel { delta } => self.editor.zoom(delta)?,
            InputEvent::Key { key } => match key {
                Key::Space => {
                    let rendering = self.editor.toggle_rendering();
                    info!("Rendering {}", if rendering { "resumed" } else { "paused" });
                }
                Key::S => {
                    self.save()?;
                }
                Key::C => {
                    self.editor.clear_scene()?;
                }
                Key::R => {
                    if let Some(button) = self.held.take() {
                        info!("Dropping {:?} drag", button);
                    }
                    self.editor.reset_global_transform()?;
                }
                Key::Escape => {
                    info!("Exit requested");
                    return Ok(Flow::Exit);
                }
            },
            InputEvent::Render { count } => self.render(count)?,
        }
        Ok(Flow::Continue)
    }

    /// Tick the render loop up to `count` times. Stops early once paused or
    /// timed out. Only resource errors end the session.
    pub fn render(&mut self, count: u32) -> Result<()> {
        for _ in 0..count {
            match self.editor.tick() {
                Ok(TickStatus::Traced { .. }) => self.traced += 1,
                Ok(TickStatus::Paused) => break,
                Ok(TickStatus::TimedOut) => {
                    info!("Time budget spent after {} frames", self.editor.coordinator().frame());
                    break;
                }
                Err(err) if err.is_fatal() => {
                    return Err(err).context("render loop failed");
                }
                Err(err) => {
                    error!("{err}");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Save the current frame next to the configured output, numbering
    /// repeated saves.
    pub fn save(&mut self) -> Result<PathBuf> {
        let path = if self.saved.is_empty() {
            self.output.clone()
        } else {
            numbered(&self.output, self.saved.len())
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }

        match self.editor.save_frame(&path, None) {
            Ok(()) => {
                info!("Saved {}", path.display());
                self.saved.push(path.clone());
                Ok(path)
            }
            Err(err @ SceneError::Export { .. }) => {
                warn!("{err}");
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn shutdown(self) {
        self.editor.shutdown();
    }
}

/// `dir/name.png` -> `dir/name-<n>.png`
fn numbered(path: &std::path::Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("render");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-{n}.{ext}"),
        None => format!("{stem}-{n}"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathview_engine::{CpuEngine, RenderSettings};
    use pathview_math::Mat4;
    use pathview_scene::{CoordinatorSettings, EditorSettings, PrimitiveKind, RenderContext};
    use std::path::Path;

    fn app(output: PathBuf) -> App {
        let settings = EditorSettings {
            coordinator: CoordinatorSettings::default().with_size(16, 16),
            ..EditorSettings::default()
        };
        let engine = CpuEngine::new(RenderSettings::default().with_sqrt_samples(1));
        let mut editor = SceneEditor::new(RenderContext::new(engine), settings).unwrap();
        editor.add_geometry(PrimitiveKind::Sphere).unwrap();
        App::new(editor, output)
    }

    #[test]
    fn test_numbered_paths() {
        assert_eq!(
            numbered(Path::new("images/render.png"), 2),
            PathBuf::from("images/render-2.png")
        );
        assert_eq!(numbered(Path::new("out"), 1), PathBuf::from("out-1"));
    }

    #[test]
    fn test_drag_reduces_then_restores_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path().join("frame.png"));

        app.handle_event(&InputEvent::Press {
            button: MouseButton::Left,
            x: 0.0,
            y: 0.0,
        })
        .unwrap();
        assert_eq!(app.editor().coordinator().size(), (4, 4));

        app.handle_event(&InputEvent::Move { x: 10.0, y: 5.0 }).unwrap();
        app.handle_event(&InputEvent::Render { count: 1 }).unwrap();
        assert_eq!(app.traced(), 1);

        // Releasing a button that is not held changes nothing.
        app.handle_event(&InputEvent::Release {
            button: MouseButton::Right,
        })
        .unwrap();
        assert_eq!(app.editor().coordinator().size(), (4, 4));

        app.handle_event(&InputEvent::Release {
            button: MouseButton::Left,
        })
        .unwrap();
        assert_eq!(app.editor().coordinator().size(), (16, 16));
    }

    #[test]
    fn test_space_pauses_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path().join("frame.png"));

        app.handle_event(&InputEvent::Key { key: Key::Space }).unwrap();
        app.handle_event(&InputEvent::Render { count: 3 }).unwrap();
        assert_eq!(app.traced(), 0);

        app.handle_event(&InputEvent::Key { key: Key::Space }).unwrap();
        app.handle_event(&InputEvent::Render { count: 3 }).unwrap();
        assert_eq!(app.traced(), 3);
    }

    #[test]
    fn test_save_and_escape() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path().join("shots").join("frame.png"));
        app.render(1).unwrap();

        assert_eq!(
            app.handle_event(&InputEvent::Key { key: Key::S }).unwrap(),
            Flow::Continue
        );
        app.handle_event(&InputEvent::Key { key: Key::S }).unwrap();
        assert_eq!(app.saved().len(), 2);
        assert!(app.saved().iter().all(|p| p.exists()));
        assert_eq!(app.saved()[1], dir.path().join("shots").join("frame-1.png"));

        assert_eq!(
            app.handle_event(&InputEvent::Key { key: Key::Escape }).unwrap(),
            Flow::Exit
        );
        app.shutdown();
    }

    #[test]
    fn test_wheel_moves_scene() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path().join("frame.png"));
        let before = app.editor().graph().revision();
        app.handle_event(&InputEvent::Wheel { delta: 120.0 }).unwrap();
        assert_ne!(app.editor().graph().revision(), before);
    }

    #[test]
    fn test_reset_and_clear_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path().join("frame.png"));

        app.handle_event(&InputEvent::Press {
            button: MouseButton::Right,
            x: 0.0,
            y: 0.0,
        })
        .unwrap();
        app.handle_event(&InputEvent::Move { x: 8.0, y: 3.0 }).unwrap();
        app.handle_event(&InputEvent::Key { key: Key::Space }).unwrap();
        assert_ne!(app.editor().graph().global_matrix(), Mat4::IDENTITY);

        app.handle_event(&InputEvent::Key { key: Key::R }).unwrap();
        assert_eq!(app.editor().graph().global_matrix(), Mat4::IDENTITY);
        assert_eq!(app.editor().coordinator().size(), (16, 16));
        app.handle_event(&InputEvent::Render { count: 1 }).unwrap();
        assert_eq!(app.traced(), 1);

        app.handle_event(&InputEvent::Key { key: Key::C }).unwrap();
        assert_eq!(app.editor().stats().nodes, 0);
        app.handle_event(&InputEvent::Render { count: 1 }).unwrap();
        assert_eq!(app.traced(), 2);
    }
}
