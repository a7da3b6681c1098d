//! `make:model` scaffolding
//!
//! Renders a model struct from a stub. A stub directory may override the
//! built-in templates with `model.stub` and `model.pivot.stub`.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

const MODEL_STUB: &str = include_str!("../stubs/model.stub");
const PIVOT_STUB: &str = include_str!("../stubs/model.pivot.stub");

#[derive(Error, Debug)]
pub enum ScaffoldError {
    #[error("Invalid model name: {0}. Use a PascalCase identifier such as UserProfile")]
    InvalidName(String),

    #[error("{0} already exists. Use --force to overwrite")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ModelOptions {
    pub name: String,
    pub pivot: bool,
    /// Directory the model file is written to
    pub path: PathBuf,
    /// Directory searched for custom stubs
    pub stubs: Option<PathBuf>,
    pub force: bool,
}

fn stub_file_name(pivot: bool) -> &'static str {
    if pivot {
        "model.pivot.stub"
    } else {
        "model.stub"
    }
}

/// Custom stub from `stubs` when present, otherwise the built-in one
pub fn resolve_stub(stubs: Option<&Path>, pivot: bool) -> Result<String, ScaffoldError> {
    if let Some(dir) = stubs {
        let custom = dir.join(stub_file_name(pivot));
        if custom.is_file() {
            tracing::debug!(stub = %custom.display(), "Using custom model stub");
            return Ok(fs::read_to_string(custom)?);
        }
    }
    Ok(if pivot { PIVOT_STUB } else { MODEL_STUB }.to_string())
}

pub fn render(stub: &str, class: &str, table: &str) -> String {
    stub.replace("{{ class }}", class)
        .replace("{{ table }}", table)
}

fn validate_name(name: &str) -> Result<(), ScaffoldError> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(ScaffoldError::InvalidName(name.to_string()))
    }
}

/// `UserProfile` -> `user_profile`
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev_lower = i > 0 && !chars[i - 1].is_ascii_uppercase();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if i > 0 && (prev_lower || next_lower) {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Write the rendered model and return its path
pub fn make_model(options: &ModelOptions) -> Result<PathBuf, ScaffoldError> {
    validate_name(&options.name)?;

    let snake = to_snake_case(&options.name);
    let target = options.path.join(format!("{}.rs", snake));
    if target.exists() && !options.force {
        return Err(ScaffoldError::AlreadyExists(target));
    }

    let stub = resolve_stub(options.stubs.as_deref(), options.pivot)?;
    let contents = render(&stub, &options.name, &format!("{}s", snake));

    fs::create_dir_all(&options.path)?;
    fs::write(&target, contents)?;

    tracing::info!(model = %options.name, path = %target.display(), "Model created");
    Ok(target)
}
