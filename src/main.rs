use anyhow::Context;
use getopts::Options;
use std::env;
use std::path::Path;

use implicit::{fit, items_purchased, mean_auc, recommend, split};
use implicit_rs::config::RunConfig;
use implicit_rs::retail;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt(
        "i",
        "inputfile",
        "Input file name (required). A CSV export of retail transactions with at least the \
        StockCode, Description, Quantity and CustomerID columns.",
        "PATH",
    );
    opts.optopt(
        "c",
        "config",
        "Run configuration in JSON (optional, library defaults otherwise).",
        "PATH",
    );
    opts.optopt(
        "u",
        "customer",
        "Customer to recommend for (optional, defaults to the customer with the lowest id).",
        "ID",
    );
    opts.optopt(
        "n",
        "num-items",
        "Number of products to recommend (optional, overrides the configuration).",
        "NUMBER",
    );
    opts.optflag("h", "help", "Print this help menu");

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(failure) => {
            print_usage(&program, &opts, Some(&failure.to_string()));
            std::process::exit(1);
        }
    };

    if matches.opt_present("h") {
        print_usage(&program, &opts, None);
        return Ok(());
    }

    let Some(input_path) = matches.opt_str("i") else {
        print_usage(
            &program,
            &opts,
            Some("Please specify an inputfile via --inputfile."),
        );
        std::process::exit(1);
    };

    let mut config = match matches.opt_str("c") {
        Some(path) => RunConfig::from_path(Path::new(&path))?,
        None => RunConfig::default(),
    };
    if let Some(num_items) = matches
        .opt_get::<usize>("n")
        .context("problem with option 'n'")?
    {
        config.num_recommendations = num_items;
    }
    let customer = matches
        .opt_get::<u64>("u")
        .context("problem with option 'u'")?;

    run(Path::new(&input_path), &config, customer)
}

fn print_usage(program: &str, opts: &Options, hint: Option<&str>) {
    if let Some(hint) = hint {
        eprintln!("\n{}\n", hint);
    }

    let brief = format!("Usage: {} [options]", program);
    eprint!("{}", opts.usage(&brief));
}

/// Loads the transactions, evaluates a model trained on part of them and prints what it
/// recommends to one customer.
fn run(input_path: &Path, config: &RunConfig, customer: Option<u64>) -> anyhow::Result<()> {
    let data = retail::load(input_path)?;
    println!(
        "Found {} purchases between {} customers and {} products (sparsity {:.3}%).",
        data.interactions.nnz(),
        data.customers.len(),
        data.products.len(),
        data.sparsity(),
    );

    let split = split(&data.interactions, config.pct_test, config.seed)?;
    let model = fit(&split.training, &config.hyperparameters)?;
    if model.report().fallback_rows > 0 {
        tracing::warn!(
            fallback_rows = model.report().fallback_rows,
            "some factors were reset to zero, consider a larger lambda"
        );
    }

    let report = mean_auc(&split.training, &split.altered_users, &model, &split.test)?;
    println!(
        "Mean AUC over {} customers: {} for the model, {} for the most popular products.",
        report.evaluated_users, report.model_auc, report.popularity_auc,
    );

    let customer = match customer.or_else(|| data.customers.id(0).copied()) {
        Some(customer) => customer,
        None => anyhow::bail!("no customer to recommend for"),
    };

    println!("\nCustomer {} bought:", customer);
    for item in items_purchased(
        &customer,
        &split.training,
        &data.customers,
        &data.products,
        &data.descriptions,
    )? {
        println!("{:>10}  {:>6}  {}", item.item_id, item.quantity, item.description);
    }

    println!("\nRecommended for customer {}:", customer);
    for recommendation in recommend(
        &customer,
        &split.training,
        &model,
        &data.customers,
        &data.products,
        &data.descriptions,
        config.num_recommendations,
    )? {
        println!(
            "{:>10}  {:.3}  {}",
            recommendation.item_id, recommendation.score, recommendation.description
        );
    }

    Ok(())
}
