//! Metapop CLI - Run program searches over regression problems.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use metapop::expr::{
    Dataset, Expr, ExprSpace, RegressionBscorer, RegressionScorer,
};
use metapop::optimize::HillClimber;
use metapop::schema::SearchConfig;
use metapop::search::Metapopulation;

/// A problem file: the search configuration, a training table and the
/// seed expressions the pool starts from.
#[derive(Debug, Serialize, Deserialize)]
struct Problem {
    #[serde(default)]
    config: SearchConfig,
    dataset: Dataset,
    seeds: Vec<Expr>,
    /// Complexity coefficient for the behavioral score's trailing entry.
    #[serde(default)]
    bscore_complexity_coef: f64,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "run" => cmd_run(&args[2..]),
        "--example" => print_example_problem(),
        "--help" | "-h" => print_usage(&args[0]),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Metapop - Metapopulation Program Search");
    eprintln!();
    eprintln!("Usage: {} <command> [options]", program);
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  run <problem.json> [max_evals]  Run a search");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --example                       Print an example problem file");
    eprintln!("  --help, -h                      Show this help message");
}

fn cmd_run(args: &[String]) {
    if args.is_empty() {
        eprintln!("Usage: metapop run <problem.json> [max_evals]");
        std::process::exit(1);
    }

    let problem_path = PathBuf::from(&args[0]);
    let max_evals: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(100_000);

    let problem = load_problem(&problem_path);

    println!("Metapop Search");
    println!("==============");
    println!(
        "Dataset: {} rows, {} inputs",
        problem.dataset.len(),
        problem.dataset.arity()
    );
    println!("Seeds: {}", problem.seeds.len());
    println!("Max evaluations: {}", max_evals);
    println!();

    let dataset = Arc::new(problem.dataset);
    let optimizer_seed = problem.config.random_seed.unwrap_or(1);

    let mut engine = Metapopulation::new(
        ExprSpace::new(dataset.arity()),
        RegressionScorer::new(Arc::clone(&dataset)),
        RegressionBscorer::new(
            Arc::clone(&dataset),
            problem.bscore_complexity_coef,
        ),
        HillClimber::new(optimizer_seed),
        problem.seeds,
        problem.config,
    )
    .unwrap_or_else(|e| {
        eprintln!("Error setting up the search: {}", e);
        std::process::exit(1);
    });

    println!("Searching...");
    let start = Instant::now();
    let result = engine.run(max_evals);
    let elapsed = start.elapsed();

    println!();
    println!("Stopped: {:?}", result.stop_reason);
    println!(
        "Expansions: {} ({} evaluations, {:.1} evals/s)",
        result.expansions,
        result.evaluations,
        result.evaluations as f64 / elapsed.as_secs_f64().max(1e-9)
    );
    println!("Pool size: {}", result.metapop_size);
    println!("Best score: {}", result.best_score);
    for program in &result.best_programs {
        println!("  {}", program);
    }

    println!();
    println!("Top candidates:");
    let mut out = std::io::stdout().lock();
    engine
        .write_candidates(&mut out, Some(10), true)
        .unwrap_or_else(|e| {
            eprintln!("Error writing candidates: {}", e);
            std::process::exit(1);
        });
}

fn load_problem(path: &PathBuf) -> Problem {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading problem file: {}", e);
        std::process::exit(1);
    });

    let problem: Problem = serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("Error parsing problem file: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = problem.config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }
    if problem.dataset.is_empty() {
        eprintln!("The dataset must contain at least one row");
        std::process::exit(1);
    }
    if problem.seeds.is_empty() {
        eprintln!("At least one seed expression is required");
        std::process::exit(1);
    }

    problem
}

fn print_example_problem() {
    // Fit y = 2x + 1 starting from the bare input variable.
    let problem = Problem {
        config: SearchConfig {
            random_seed: Some(42),
            complexity_weight: 0.01,
            ..SearchConfig::default()
        },
        dataset: Dataset {
            rows: (-5..=5).map(|x| vec![x as f64]).collect(),
            targets: (-5..=5).map(|x| 2.0 * x as f64 + 1.0).collect(),
        },
        seeds: vec![Expr::Add(
            Box::new(Expr::Mul(
                Box::new(Expr::Num(1.0)),
                Box::new(Expr::Var(0)),
            )),
            Box::new(Expr::Num(0.5)),
        )],
        bscore_complexity_coef: 0.0,
    };

    println!("Example problem (problem.json):");
    println!("{}", serde_json::to_string_pretty(&problem).unwrap());
}
