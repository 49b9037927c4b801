//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 配置校验命令。

use crate::cli::ValidateArgs;
use crate::config::GroupConfig;
use anyhow::{Context, Result};

pub fn execute(args: &ValidateArgs) -> Result<()> {
    let config = match &args.path {
        Some(path) => GroupConfig::from_file(path)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?,
        None => GroupConfig::default(),
    };

    match &args.path {
        Some(path) => println!("# {}: OK", path.display()),
        None => println!("# default configuration"),
    }
    print!("{}", config.to_toml_string()?);
    Ok(())
}
