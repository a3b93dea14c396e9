use std::fs;

use anyhow::{bail, Context};
use bassadorn::{score_song, AdaptationConfig, ComplexityScorer, RevisionEngine, Song, DEFAULT_WEIGHTS};
use log::info;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = std::env::args().collect::<Vec<_>>();
    if args.len() < 2 || args.len() > 3 {
        bail!("Usage: {} song.json [config.json]", args[0]);
    }

    let song: Song = serde_json::from_str(&fs::read_to_string(&args[1]).with_context(|| format!("reading {}", args[1]))?)
        .with_context(|| format!("parsing song {}", args[1]))?;
    let config = match args.get(2) {
        Some(path) => AdaptationConfig::from_json(&fs::read_to_string(path).with_context(|| format!("reading {path}"))?)
            .with_context(|| format!("parsing configuration {path}"))?,
        None => AdaptationConfig::default(),
    };
    info!("loaded {} measures, {} notes from {}", song.measures().len(), song.num_notes(), args[1]);

    let revised = RevisionEngine::from_config(&config).revise_song(&song)?;
    info!("revised {} measures", revised.measures().len());

    let scorer = ComplexityScorer::new(&*DEFAULT_WEIGHTS, config.weight_mode, config.aggregation);
    let report = score_song(&revised, &scorer)?;
    for (i, measure) in report.measures.iter().enumerate() {
        eprintln!("measure {i}: complexity {:.3} difficulty {:.3}", measure.complexity, measure.difficulty);
    }
    info!("song complexity {:.3}, difficulty {:.3}", report.complexity, report.difficulty);

    println!("{}", serde_json::to_string_pretty(&revised)?);
    Ok(())
}
