//! Viewer settings: defaults, an optional JSON file, then command-line overrides.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Mouse buttons the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
}

/// Keys with a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    /// Pause or resume tracing
    Space,
    /// Save the current frame
    S,
    /// Remove every node
    C,
    /// Undo orbit, pan and zoom
    R,
    /// Quit
    Escape,
}

/// One step of a scripted session, in window coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    Press { button: MouseButton, x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Release { button: MouseButton },
    Wheel { delta: f32 },
    Key { key: Key },
    /// Run the render loop for up to `count` ticks.
    Render { count: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    /// Logical window size
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f32,
    /// Per-axis samples per pixel per launch
    pub sqrt_samples: u32,
    pub max_depth: u32,
    /// Ticks rendered after the scripted events
    pub frames: u32,
    /// Stop accumulating after this many seconds without a scene change
    pub timeout_secs: Option<f64>,
    /// OBJ placed in the box
    pub mesh: Option<PathBuf>,
    pub output: PathBuf,
    pub events: Vec<InputEvent>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            device_pixel_ratio: 1.0,
            sqrt_samples: 2,
            max_depth: 5,
            frames: 16,
            timeout_secs: None,
            mesh: None,
            output: PathBuf::from("images/render.png"),
            events: Vec::new(),
        }
    }
}

impl ViewerSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse settings {}", path.display()))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Build settings from command-line arguments (without the program name).
    ///
    /// `--settings FILE` is read first wherever it appears; every other flag
    /// overrides what the file set.
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();

        let mut settings = match args.iter().position(|a| a == "--settings") {
            Some(i) => {
                let path = args
                    .get(i + 1)
                    .context("--settings needs a file path")?;
                Self::load(Path::new(path))?
            }
            None => Self::default(),
        };

        let mut iter = args.iter();
        while let Some(flag) = iter.next() {
            let mut value = || {
                iter.next()
                    .with_context(|| format!("{flag} needs a value"))
            };
            match flag.as_str() {
                "--settings" => {
                    value()?;
                }
                "--mesh" => settings.mesh = Some(PathBuf::from(value()?)),
                "--output" | "-o" => settings.output = PathBuf::from(value()?),
                "--size" => {
                    let (w, h) = parse_size(value()?)?;
                    settings.width = w;
                    settings.height = h;
                }
                "--frames" => settings.frames = parse_number(flag, value()?)?,
                "--samples" => settings.sqrt_samples = parse_number(flag, value()?)?,
                "--depth" => settings.max_depth = parse_number(flag, value()?)?,
                "--dpr" => settings.device_pixel_ratio = parse_number(flag, value()?)?,
                "--timeout" => settings.timeout_secs = Some(parse_number(flag, value()?)?),
                other => bail!("unknown argument '{other}'"),
            }
        }

        Ok(settings)
    }
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T> {
    value
        .parse()
        .ok()
        .with_context(|| format!("invalid value '{value}' for {flag}"))
}

/// `WIDTHxHEIGHT`, both non-zero.
fn parse_size(value: &str) -> Result<(u32, u32)> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .with_context(|| format!("size '{value}' is not WIDTHxHEIGHT"))?;
    let w: u32 = parse_number("--size", w)?;
    let h: u32 = parse_number("--size", h)?;
    if w == 0 || h == 0 {
        bail!("size '{value}' has a zero dimension");
    }
    Ok((w, h))
}
