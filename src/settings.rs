use std::path::PathBuf;

use crate::error::Result;
use crate::log_warn;

const SETTINGS_FILE: &str = "pixelframe_settings.cfg";

/// Editor-wide preferences, stored as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Per-layer history limit. 0 = unbounded.
    pub max_undo_steps: usize,
    pub animation_fps: f32,
    /// Palette size for GIF export (2..=256).
    pub gif_max_colors: u16,
    pub default_width: u32,
    pub default_height: u32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            max_undo_steps: 0,
            animation_fps: 10.0,
            gif_max_colors: 256,
            default_width: 64,
            default_height: 64,
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/pixelframe/pixelframe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PixelFrame\pixelframe_settings.cfg
    /// On macOS:   ~/Library/Application Support/PixelFrame/pixelframe_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("PixelFrame").join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("PixelFrame")
                    .join(SETTINGS_FILE),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = match std::env::var("XDG_CONFIG_HOME") {
                Ok(xdg) => PathBuf::from(xdg),
                Err(_) => PathBuf::from(std::env::var("HOME").ok()?).join(".config"),
            };
            Some(config_dir.join("pixelframe").join(SETTINGS_FILE))
        }
    }

    /// Load settings from disk (defaults if the file is missing or corrupt).
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::parse(&content)
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::settings_path() else { return Ok(()) };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }

    /// Parse `key=value` lines. Unknown keys are skipped; values that fail to
    /// parse keep their defaults.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "max_undo_steps" => {
                    if let Ok(v) = val.parse() {
                        s.max_undo_steps = v;
                    }
                }
                "animation_fps" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                        && v > 0.0
                    {
                        s.animation_fps = v;
                    }
                }
                "gif_max_colors" => {
                    if let Ok(v) = val.parse::<u16>() {
                        s.gif_max_colors = v.clamp(2, 256);
                    }
                }
                "default_width" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.default_width = v.max(1);
                    }
                }
                "default_height" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.default_height = v.max(1);
                    }
                }
                _ => log_warn!("Settings: ignoring unknown key '{}'", key),
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "max_undo_steps={}\n\
             animation_fps={}\n\
             gif_max_colors={}\n\
             default_width={}\n\
             default_height={}\n",
            self.max_undo_steps, self.animation_fps, self.gif_max_colors, self.default_width, self.default_height,
        )
    }
}
