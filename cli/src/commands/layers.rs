use anyhow::Result;

use crate::{
    cli::{Cli, SourceArgs},
    commands::{apply_source, load_config},
};

/// Print every layer of the default population group, marking the one the selector picks.
pub fn run(cli: &Cli, args: &SourceArgs) -> Result<()> {
    let mut config = load_config(cli)?;
    apply_source(&mut config, args);

    let store = popest::open_store(&config)?;
    let layers = store.describe_default_layers()?;
    let selector = &config.default_source.selector;
    let chosen = selector.select(&layers).ok();

    for (i, layer) in layers.iter().enumerate() {
        let mark = if chosen == Some(i) { "*" } else { " " };
        println!("{mark} {}\t{} fields", layer.name, layer.fields.len());
        if cli.verbose > 0 {
            println!("    {}", layer.fields.join(", "));
        }
    }
    if chosen.is_none() {
        tracing::warn!(%selector, "no layer matches the selector");
    }
    Ok(())
}
