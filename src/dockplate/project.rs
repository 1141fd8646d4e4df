// Purpose: Inspect a model project and turn what is found into a manifest.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use pathdiff::diff_paths;
use serde_json::Value;
use walkdir::WalkDir;

use super::error::GenError;
use super::manifest::{Manifest, BASE_IMAGE, EXAMPLES_COPY};
use super::template::{TemplateDocument, TemplateStore};
use super::templates::Flavor;

pub const REQUIRED_FILES: [&str; 3] = ["gogogo.py", "mc.json", "requirements.txt"];
pub const MODEL_DIR: &str = "model";
pub const EXAMPLES_DIR: &str = "examples";
pub const META_DIR: &str = ".dockplate";
pub const OUTPUT_NAME: &str = "Dockerfile.dockplate";
pub const EXAMPLES_COPY_LINE: &str = "COPY examples/ ./examples/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub root: PathBuf,
    pub model_name: String,
    pub has_examples: bool,
}

fn invalid(msg: impl Into<String>) -> GenError {
    GenError::InvalidProject(msg.into())
}

// A directory whose only entry is a directory of the same name, e.g.
// model/model/, is almost always an unpacking mistake.
pub fn has_redundant_nesting(dir: &Path, name: &str) -> bool {
    let entries: Vec<_> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .collect();
    if entries.len() != 1 {
        return false;
    }
    let only = &entries[0];
    if only.file_type().is_dir() && only.file_name() == name {
        warn!(
            "Redundant nested directory: {}. Move its contents up into {}",
            only.path().display(),
            dir.display()
        );
        return true;
    }
    false
}

fn is_empty_dir(dir: &Path) -> bool {
    WalkDir::new(dir).min_depth(1).max_depth(1).into_iter().next().is_none()
}

pub fn read_model_name(mc_json: &Path) -> Result<String, GenError> {
    let raw = std::fs::read_to_string(mc_json)
        .map_err(|e| invalid(format!("cannot read mc.json: {}", e)))?;
    let config: Value =
        serde_json::from_str(&raw).map_err(|e| invalid(format!("mc.json is not valid JSON: {}", e)))?;

    let root = config
        .as_object()
        .ok_or_else(|| invalid("mc.json root must be an object"))?;
    let model_info = root
        .get("model_info")
        .ok_or_else(|| invalid("mc.json is missing the model_info field"))?
        .as_object()
        .ok_or_else(|| invalid("mc.json model_info must be an object"))?;
    let name = model_info
        .get("name")
        .ok_or_else(|| invalid("mc.json is missing the model_info.name field"))?
        .as_str()
        .map(str::trim)
        .unwrap_or_default();
    if name.is_empty() {
        return Err(invalid("mc.json model_info.name must be a non-empty string"));
    }
    Ok(name.to_string())
}

pub fn validate_project(project_root: &Path) -> Result<ProjectInfo, GenError> {
    info!("Validating project structure: {}", project_root.display());

    let missing: Vec<String> = REQUIRED_FILES
        .iter()
        .filter_map(|file| {
            let path = project_root.join(file);
            if !path.exists() {
                Some(file.to_string())
            } else if !path.is_file() {
                Some(format!("{} (not a file)", file))
            } else {
                None
            }
        })
        .collect();
    if !missing.is_empty() {
        return Err(invalid(format!(
            "missing required files: {}",
            missing.join(", ")
        )));
    }

    let model_dir = project_root.join(MODEL_DIR);
    if !model_dir.exists() {
        return Err(invalid("missing the model directory"));
    }
    if !model_dir.is_dir() {
        return Err(invalid("model is not a directory"));
    }
    if is_empty_dir(&model_dir) {
        warn!("The model directory is empty");
    }
    if has_redundant_nesting(&model_dir, MODEL_DIR) {
        return Err(invalid("the model directory contains a redundant nested model directory"));
    }

    let examples_dir = project_root.join(EXAMPLES_DIR);
    let mut has_examples = false;
    if examples_dir.exists() {
        if !examples_dir.is_dir() {
            warn!("examples exists but is not a directory, ignoring it");
        } else {
            if has_redundant_nesting(&examples_dir, EXAMPLES_DIR) {
                return Err(invalid(
                    "the examples directory contains a redundant nested examples directory",
                ));
            }
            has_examples = true;
            info!("Found examples directory, it will be copied into the image");
        }
    }

    let model_name = read_model_name(&project_root.join("mc.json"))?;
    info!("Project is valid: model {}, examples {}", model_name, has_examples);

    Ok(ProjectInfo {
        root: project_root.to_path_buf(),
        model_name,
        has_examples,
    })
}

/// Picks the template for a project. A template checked into the project's
/// `.dockplate/` directory wins over the built-in one of the same flavor.
pub fn select_template(
    store: &TemplateStore,
    project_root: &Path,
    flavor: Flavor,
) -> Result<Arc<TemplateDocument>, GenError> {
    let project_template = project_root
        .join(META_DIR)
        .join(flavor.project_template_name());
    if project_template.exists() {
        let shown = diff_paths(&project_template, project_root).unwrap_or_else(|| project_template.clone());
        info!("Using project template: {}", shown.display());
        return store.load(&project_template);
    }
    debug!("Using built-in {:?} template", flavor);
    store.builtin(flavor)
}

pub fn manifest_for(info: &ProjectInfo, base_image: &str) -> Result<Manifest, GenError> {
    Manifest::new()
        .fixed(BASE_IMAGE, base_image)?
        .conditional(EXAMPLES_COPY, info.has_examples, EXAMPLES_COPY_LINE, "")
}

pub fn default_output(project_root: &Path) -> PathBuf {
    project_root.join(OUTPUT_NAME)
}
