use alsrec::algorithms::AlternatingLeastSquares;
use alsrec::models::{Hyperparameters, RawInteraction};
use alsrec::services::recommendation::RecommendationService;
use alsrec::utils::metrics::MetricsCalculator;
use alsrec::{ingest, init_tracing, store, Config};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Events CSV with user_id,item_id,weight columns
    #[arg(short, long, default_value = "data/events.csv")]
    events: PathBuf,

    /// Output path for the trained model
    #[arg(short, long)]
    model_out: Option<PathBuf>,

    #[arg(long)]
    factors: Option<usize>,

    #[arg(long)]
    regularization: Option<f32>,

    #[arg(long)]
    iterations: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Fraction of each user's interactions held out for evaluation
    #[arg(long)]
    holdout: Option<f64>,

    /// Cutoff for the holdout metrics report
    #[arg(long, default_value_t = 10)]
    eval_k: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing().await;

    info!("starting batch training run");

    let config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("config file not found, using default configuration");
        Config::default()
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.training.threads)
        .build_global()?;

    let params = Hyperparameters {
        factors: args.factors.unwrap_or(config.training.factors),
        regularization: args
            .regularization
            .unwrap_or(config.training.regularization),
        iterations: args.iterations.unwrap_or(config.training.iterations),
        seed: args.seed.or(config.training.seed),
    };
    let model_out = args
        .model_out
        .unwrap_or_else(|| config.model.path.clone());

    let (records, holdout) = read_events(&args.events, args.holdout)?;
    let (matrix, summary) = ingest::accumulate(records);
    info!(
        "training input: {} users, {} items, {} accepted records, {} skipped",
        summary.n_users, summary.n_items, summary.accepted, summary.skipped
    );

    let als = AlternatingLeastSquares::new(params)?;
    let model = als.fit(&matrix)?;

    if !holdout.is_empty() {
        evaluate_holdout(&model, &holdout, args.eval_k);
    }

    store::save(&model, &model_out)?;
    info!("training run complete, model at {}", model_out.display());

    Ok(())
}

/// Reads the events file and optionally splits off a per-user holdout
/// tail for evaluation. The split happens before accumulation so held-out
/// interactions never leak into the trained matrix.
fn read_events(
    path: &PathBuf,
    holdout: Option<f64>,
) -> Result<(Vec<RawInteraction>, Vec<(u32, u32)>)> {
    let (records, unparsed) = ingest::read_raw_events(path)?;
    if unparsed > 0 {
        warn!("{} rows did not parse and were skipped", unparsed);
    }

    let fraction = match holdout {
        Some(f) if f > 0.0 && f < 1.0 => f,
        Some(f) => {
            warn!("holdout fraction {} out of (0, 1), ignoring", f);
            return Ok((records, Vec::new()));
        }
        None => return Ok((records, Vec::new())),
    };

    // Hold out the tail of each user's record list.
    let mut by_user: std::collections::BTreeMap<i64, Vec<usize>> = Default::default();
    for (idx, r) in records.iter().enumerate() {
        by_user.entry(r.user_id).or_default().push(idx);
    }

    let mut held = vec![false; records.len()];
    let mut holdout_pairs = Vec::new();
    for (_, indices) in by_user {
        let keep = indices.len() - (indices.len() as f64 * fraction).floor() as usize;
        for &idx in &indices[keep..] {
            let r = records[idx];
            if let Ok(valid) = r.validate() {
                held[idx] = true;
                holdout_pairs.push((valid.user_id, valid.item_id));
            }
        }
    }

    let train: Vec<RawInteraction> = records
        .into_iter()
        .enumerate()
        .filter(|&(idx, _)| !held[idx])
        .map(|(_, r)| r)
        .collect();

    info!(
        "holdout split: {} training records, {} held out",
        train.len(),
        holdout_pairs.len()
    );
    Ok((train, holdout_pairs))
}

fn evaluate_holdout(model: &alsrec::FactorModel, holdout: &[(u32, u32)], k: usize) {
    let service = RecommendationService::new(Arc::new(model.clone()));
    let calc = MetricsCalculator::new(k);

    let mut by_user: std::collections::BTreeMap<u32, Vec<u32>> = Default::default();
    for &(user, item) in holdout {
        by_user.entry(user).or_default().push(item);
    }

    let mut precision_sum = 0.0;
    let mut recall_sum = 0.0;
    let mut ndcg_sum = 0.0;
    let mut evaluated = 0usize;
    for (user, relevant) in by_user {
        let recs = match service.recommend_for_user(user, k, true) {
            Ok(recs) => recs,
            // Users whose every interaction landed in the holdout are
            // unknown to the model; they cannot be scored.
            Err(_) => continue,
        };
        let recommended: Vec<u32> = recs.iter().map(|r| r.item_id).collect();
        let relevance: std::collections::HashMap<u32, f64> =
            relevant.iter().map(|&item| (item, 1.0)).collect();
        precision_sum += calc.precision_at_k(&recommended, &relevant);
        recall_sum += calc.recall_at_k(&recommended, &relevant);
        ndcg_sum += calc.ndcg_at_k(&recommended, &relevance);
        evaluated += 1;
    }

    if evaluated == 0 {
        warn!("holdout evaluation had no scorable users");
        return;
    }

    info!(
        "holdout metrics over {} users: precision@{} {:.4}, recall@{} {:.4}, ndcg@{} {:.4}",
        evaluated,
        k,
        precision_sum / evaluated as f64,
        k,
        recall_sum / evaluated as f64,
        k,
        ndcg_sum / evaluated as f64
    );
}
