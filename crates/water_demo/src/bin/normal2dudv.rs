//! Convert a tileable normal map into a dudv map.
//!
//! Usage: normal2dudv <normal.png> [dudv.png]

use std::path::PathBuf;

use anyhow::{bail, Result};
use procgen::{normal_to_dudv, TextureData};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args_os().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        bail!("usage: normal2dudv <normal.png> [dudv.png]");
    };
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| input.with_file_name("dudv.png"));

    let normal = TextureData::load(&input)?;
    log::info!("Read {} ({}x{})", input.display(), normal.width, normal.height);
    normal_to_dudv(&normal).save(&output)?;
    log::info!("Wrote {}", output.display());
    Ok(())
}
