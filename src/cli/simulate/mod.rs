//! Simulate command - splits synthetic visitors and scores some of them

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::experiment::{
    AttributeIdentityProvider, ExperimentName, RequestAttributes, VariantSpec, DEFAULT_WEIGHT,
};
use crate::infrastructure::experiment::{
    RandomSource, SeededRandomSource, StorageExperimentBackend, ThreadRandomSource,
};
use crate::infrastructure::logging;
use crate::infrastructure::services::ExperimentService;
use crate::infrastructure::storage::StorageFactory;

/// Request attribute the simulated visitors are identified by
const VISITOR_ATTRIBUTE: &str = "visitor_id";

/// Arguments for the simulate command
#[derive(Args, Clone, Debug)]
pub struct SimulateArgs {
    /// Experiment name
    pub experiment: String,

    /// Variant as `key` or `key:weight`; repeat for each variant.
    /// Without any, a True/False flag split is simulated
    #[arg(long = "variant", short = 'v', value_parser = parse_variant_arg)]
    pub variants: Vec<VariantSpec>,

    /// Number of synthetic visitors
    #[arg(long, default_value_t = 1000)]
    pub visitors: u32,

    /// Fraction of visitors that convert, between 0 and 1
    #[arg(long, default_value_t = 0.1, value_parser = parse_rate)]
    pub score_rate: f64,

    /// Seed for reproducible runs (overrides config)
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Per-variant tallies for one run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Tally {
    assigned: usize,
    converted: usize,
}

/// Run the simulation
pub async fn run(args: SimulateArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging)?;

    let storage_config = config.storage.to_storage_config()?;
    let factory = StorageFactory::connect(&storage_config).await?;
    let backend = Arc::new(StorageExperimentBackend::from_factory(&factory).await?);

    let seed = args.seed.or(config.engine.seed);
    let random: Arc<dyn RandomSource> = match seed {
        Some(seed) => Arc::new(SeededRandomSource::new(seed)),
        None => Arc::new(ThreadRandomSource),
    };
    let mut conversions = match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };

    let service = ExperimentService::new(
        Arc::clone(&backend),
        Arc::new(AttributeIdentityProvider::new(VISITOR_ATTRIBUTE)),
    )
    .with_random_source(random);

    info!(
        experiment = %args.experiment,
        visitors = args.visitors,
        score_rate = args.score_rate,
        seed = ?seed,
        storage = ?factory.storage_type(),
        "Starting simulation"
    );

    let run_id = uuid::Uuid::new_v4().simple().to_string();
    let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();

    for i in 0..args.visitors {
        let visitor = RequestAttributes::new()
            .with(VISITOR_ATTRIBUTE, format!("sim-{}-{}", run_id, i));

        let value = service
            .split(&visitor, &args.experiment, args.variants.clone())
            .await
            .with_context(|| format!("Split failed for visitor {}", i))?;
        let tally = tallies.entry(value_label(&value)).or_default();
        tally.assigned += 1;

        if conversions.gen_bool(args.score_rate) {
            service
                .score(&visitor, &args.experiment)
                .await
                .with_context(|| format!("Scoring failed for visitor {}", i))?;
            tally.converted += 1;
        }
    }

    let name = ExperimentName::new(args.experiment.as_str());
    println!("Experiment '{}' ({} visitors)", name, args.visitors);
    println!(
        "{:<20} {:>10} {:>10} {:>10} {:>14} {:>14}",
        "variant", "assigned", "share", "converted", "stored visits", "stored convs"
    );

    let stored_visits = backend.participant_counts(&name).await?;
    let stored_conversions = backend.conversion_counts(&name).await?;

    for (label, tally) in &tallies {
        let share = tally.assigned as f64 / f64::from(args.visitors.max(1));

        println!(
            "{:<20} {:>10} {:>9.1}% {:>10} {:>14} {:>14}",
            label,
            tally.assigned,
            share * 100.0,
            tally.converted,
            stored_visits.get(label).copied().unwrap_or(0),
            stored_conversions.get(label).copied().unwrap_or(0)
        );
    }

    Ok(())
}

/// Variant keys double as their values, so the returned value names the variant
fn variant_from_parts(key: &str, weight: u32) -> VariantSpec {
    VariantSpec::new(key).with_value(key).with_weight(weight)
}

/// Label a returned value with the variant key it came from
fn value_label(value: &Value) -> String {
    match value {
        Value::String(key) => key.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}

fn parse_variant_arg(raw: &str) -> Result<VariantSpec, String> {
    match raw.rsplit_once(':') {
        Some((key, weight)) => {
            let weight = weight
                .parse::<u32>()
                .map_err(|_| format!("invalid weight '{}' in '{}'", weight, raw))?;
            Ok(variant_from_parts(key, weight))
        }
        None => Ok(variant_from_parts(raw, DEFAULT_WEIGHT)),
    }
}

fn parse_rate(raw: &str) -> Result<f64, String> {
    let rate: f64 = raw
        .parse()
        .map_err(|_| format!("'{}' is not a number", raw))?;

    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("score rate must be between 0 and 1, got {}", rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: SimulateArgs,
    }

    #[test]
    fn test_parse_variant_with_weight() {
        let spec = parse_variant_arg("blue:3").unwrap();

        assert_eq!(spec.key, "blue");
        assert_eq!(spec.value, json!("blue"));
        assert_eq!(spec.weight, 3);
    }

    #[test]
    fn test_parse_variant_without_weight() {
        let spec = parse_variant_arg("red").unwrap();

        assert_eq!(spec.key, "red");
        assert_eq!(spec.weight, DEFAULT_WEIGHT);
    }

    #[test]
    fn test_parse_variant_bad_weight() {
        assert!(parse_variant_arg("red:heavy").is_err());
        assert!(parse_variant_arg("red:-1").is_err());
    }

    #[test]
    fn test_parse_rate_bounds() {
        assert_eq!(parse_rate("0.25").unwrap(), 0.25);
        assert!(parse_rate("1.5").is_err());
        assert!(parse_rate("often").is_err());
    }

    #[test]
    fn test_value_label() {
        assert_eq!(value_label(&json!("blue")), "blue");
        assert_eq!(value_label(&json!(true)), "True");
        assert_eq!(value_label(&json!(false)), "False");
    }

    #[test]
    fn test_args_parse() {
        let cli = TestCli::parse_from([
            "simulate",
            "text_color",
            "--variant",
            "red:1",
            "-v",
            "blue:3",
            "--visitors",
            "50",
            "--seed",
            "9",
        ]);

        assert_eq!(cli.args.experiment, "text_color");
        assert_eq!(cli.args.variants.len(), 2);
        assert_eq!(cli.args.variants[1].weight, 3);
        assert_eq!(cli.args.visitors, 50);
        assert_eq!(cli.args.seed, Some(9));
        assert_eq!(cli.args.score_rate, 0.1);
    }
}
