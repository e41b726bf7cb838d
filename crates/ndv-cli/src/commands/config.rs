//! `ndv config`: show or initialize the viewer configuration.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::info;

use ndv_view::ViewerConfig;

use super::load_config;
use crate::ConfigArgs;

pub fn run(args: ConfigArgs, config: Option<&Path>) -> Result<()> {
    let path = match config {
        Some(p) => p.to_owned(),
        None => ViewerConfig::default_path().context("Cannot locate config directory")?,
    };

    if args.path {
        println!("{}", path.display());
        return Ok(());
    }
    if args.init {
        return init(&path);
    }

    let current = load_config(Some(&path))?;
    println!("{}", current.to_ron()?);
    Ok(())
}

fn init(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    ViewerConfig::default()
        .save(path)
        .with_context(|| format!("Failed to write config: {}", path.display()))?;
    info!(path = %path.display(), "wrote default config");
    println!("{}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ndv").join("viewer.ron");
        init(&path).unwrap();
        assert_eq!(ViewerConfig::load(&path).unwrap(), ViewerConfig::default());
        assert!(init(&path).is_err());
    }
}
