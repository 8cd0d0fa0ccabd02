use anyhow::Result;

use crate::{
    cli::{Cli, EstimateArgs},
    commands::{apply_source, load_config},
};

pub fn run(cli: &Cli, args: &EstimateArgs) -> Result<()> {
    let mut config = load_config(cli)?;

    if let Some(path) = &args.study_area { config.study_area = Some(path.clone()) }
    if let Some(path) = &args.output { config.output = Some(path.clone()) }
    if let Some(field) = &args.dissolve { config.dissolve_field = Some(field.clone()) }
    if let Some(path) = &args.population_layer { config.population_layer = Some(path.clone()) }
    if let Some(field) = &args.population_field { config.population_field = Some(field.clone()) }
    if let Some(path) = &args.tabulation { config.tabulation = Some(path.clone()) }
    if let Some(path) = &args.geojson { config.geojson = Some(path.clone()) }
    if let Some(rule) = args.key_rule { config.naming.rule = rule.into() }
    config.round |= args.round;
    config.parallel |= args.parallel;
    apply_source(&mut config, &args.source);

    // Fail on bad parameters before any store is opened.
    config.validate()?;
    let mut store = popest::open_store(&config)?;
    let result = popest::run(&config, store.as_mut())?;

    let table = &result.table;
    println!("{}\t{}", table.key_column(), table.sum_column());
    for row in table.rows() {
        println!("{}\t{}", row.key, row.pop_total);
    }
    tracing::info!(report = %result.report, "estimate finished");
    Ok(())
}
