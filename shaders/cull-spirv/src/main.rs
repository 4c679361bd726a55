use std::{env, fs, path::PathBuf};

use eyre::eyre;

fn main() -> eyre::Result<()> {
    stable_eyre::install()?;
    let path = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| eyre!("usage: cull-spirv <OUTPUT>"))?;
    fs::write(&path, cull_spirv::CODE)?;
    println!("wrote {} bytes to {}", cull_spirv::CODE.len(), path.display());
    Ok(())
}
