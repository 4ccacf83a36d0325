//! Scene persistence (RON)
//!
//! Scenes save as pretty-printed RON. Derived data and textures are not
//! serialized; callers run `Scene::init` and reattach texture resources
//! after loading.

use super::Scene;
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub enum SceneError {
    Io(std::io::Error),
    Parse(ron::error::SpannedError),
    Serialize(ron::Error),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::Io(e) => write!(f, "scene io error: {}", e),
            SceneError::Parse(e) => write!(f, "scene parse error: {}", e),
            SceneError::Serialize(e) => write!(f, "scene serialize error: {}", e),
        }
    }
}

impl std::error::Error for SceneError {}

impl From<std::io::Error> for SceneError {
    fn from(e: std::io::Error) -> Self {
        SceneError::Io(e)
    }
}

impl From<ron::error::SpannedError> for SceneError {
    fn from(e: ron::error::SpannedError) -> Self {
        SceneError::Parse(e)
    }
}

impl From<ron::Error> for SceneError {
    fn from(e: ron::Error) -> Self {
        SceneError::Serialize(e)
    }
}

/// Load a scene from a RON file. The result still needs `init` (and any
/// textures reattached) before rendering.
pub fn load_scene<P: AsRef<Path>>(path: P) -> Result<Scene, SceneError> {
    let text = fs::read_to_string(path)?;
    let scene = ron::from_str(&text)?;
    Ok(scene)
}

/// Save a scene as pretty-printed RON.
pub fn save_scene<P: AsRef<Path>>(scene: &Scene, path: P) -> Result<(), SceneError> {
    let text = ron::ser::to_string_pretty(scene, ron::ser::PrettyConfig::default())?;
    fs::write(path, text)?;
    Ok(())
}
