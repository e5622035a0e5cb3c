use clap::{arg, value_parser, ArgMatches, Command};
use colored::Colorize;

use imbrl::charts::metric_chart;
use imbrl::constants;
use imbrl::data::{generate_gaussian, get_train_test_val, load_creditcard, DataSplit};
use imbrl::env::{BanditEnv, ClassifyEnv};
use imbrl::metrics::rounded;
use imbrl::train::{BanditConfig, ClassifierHooks, DdqnConfig, TrainBandit, TrainDdqn};

fn main() {
    if let Err(error) = run() {
        eprintln!("{}", error.to_string().red().bold());
        std::process::exit(1);
    }
}

fn run() -> imbrl::Result<()> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("ddqn", sub)) => train_ddqn(sub),
        Some(("bandit", sub)) => train_bandit(sub),
        Some(("check", _)) => check(),
        _ => unreachable!("subcommand is required"),
    }
}

fn cli() -> Command {
    let data_args = [
        arg!(--train <FILE> "Train csv in the credit-card fraud layout")
            .default_value("./data/credit0.csv"),
        arg!(--test <FILE> "Test csv in the credit-card fraud layout")
            .default_value("./data/credit1.csv"),
        arg!(--"imb-rate" <RATE> "Target minority/majority ratio")
            .value_parser(value_parser!(f64))
            .default_value("0.1"),
        arg!(--normalize "Min-max normalize the features"),
    ];

    Command::new("imbrl")
        .about("Imbalanced classification with deep reinforcement learning")
        .subcommand_required(true)
        .subcommand(
            Command::new("ddqn")
                .about("Train the double-DQN agent on a csv dataset")
                .args(data_args.clone())
                .arg(
                    arg!(--episodes <N> "Training episodes")
                        .value_parser(value_parser!(u32))
                        .default_value("2000"),
                ),
        )
        .subcommand(
            Command::new("bandit")
                .about("Train the contextual-bandit agent on a csv dataset")
                .args(data_args)
                .arg(
                    arg!(--loops <N> "Training loops")
                        .value_parser(value_parser!(u32))
                        .default_value("1000"),
                ),
        )
        .subcommand(Command::new("check").about("Short synthetic run of both trainers"))
}

fn load_split(matches: &ArgMatches) -> imbrl::Result<(DataSplit, f64)> {
    let fp_train = matches.get_one::<String>("train").expect("has default");
    let fp_test = matches.get_one::<String>("test").expect("has default");
    let imb_rate = *matches.get_one::<f64>("imb-rate").expect("has default");
    let normalize = matches.get_flag("normalize");

    let (x_train, y_train, x_test, y_test) = load_creditcard(fp_train, fp_test, normalize)?;
    let split = get_train_test_val(
        &x_train,
        &y_train,
        &x_test,
        &y_test,
        imb_rate,
        &[1],
        &[0],
        constants::data::VAL_FRAC,
        constants::data::SPLIT_SEED,
    )?;
    print_stats(&split);

    Ok((split, imb_rate))
}

fn print_stats(split: &DataSplit) {
    let [train, test, val] = split.stats();
    println!("{}", "imbalance ratio p:".bold());
    println!("\ttrain:      n={}, p={:.6}", train.0, train.1);
    println!("\ttest:       n={}, p={:.6}", test.0, test.1);
    println!("\tvalidation: n={}, p={:.6}", val.0, val.1);
}

fn train_ddqn(matches: &ArgMatches) -> imbrl::Result<()> {
    let (split, imb_rate) = load_split(matches)?;
    let episodes = *matches.get_one::<u32>("episodes").expect("has default");

    let env = ClassifyEnv::new(split.x_train.clone(), split.y_train.clone(), imb_rate)?;
    let config = DdqnConfig {
        episodes,
        ..DdqnConfig::default()
    };

    let mut trainer = TrainDdqn::new(config, ClassifierHooks)?;
    trainer.compile_model(env, None, Some(&constants::net::DENSE_LAYERS), None)?;
    trainer.train(&split.x_val, &split.y_val)?;

    let stats = trainer.evaluate(&split.x_test, &split.y_test)?;
    println!("{}", rounded(&stats).green());

    trainer.save_model()?;
    println!("model saved to {}", trainer.model_dir().bold());

    for metric in ["Gmean", "F1"] {
        if let Some(series) = trainer.metric_history(metric) {
            metric_chart(trainer.log_dir(), metric, series)?;
        }
    }

    Ok(())
}

fn train_bandit(matches: &ArgMatches) -> imbrl::Result<()> {
    let (split, imb_rate) = load_split(matches)?;
    let training_loops = *matches.get_one::<u32>("loops").expect("has default");

    let config = BanditConfig {
        training_loops,
        ..BanditConfig::default()
    };
    let env = BanditEnv::new(
        split.x_train.clone(),
        split.y_train.clone(),
        imb_rate,
        config.batch_size,
    )?;

    let mut trainer = TrainBandit::new(config, ClassifierHooks)?;
    trainer.compile_model(env, None, Some(&constants::net::DENSE_LAYERS), None)?;
    trainer.train(&split.x_val, &split.y_val)?;

    let stats = trainer.evaluate(&split.x_test, &split.y_test)?;
    println!("{}", rounded(&stats).green());

    trainer.save_model()?;
    println!("model saved to {}", trainer.model_dir().bold());

    for metric in ["Gmean", "F1"] {
        if let Some(series) = trainer.metric_history(metric) {
            metric_chart(trainer.log_dir(), metric, series)?;
        }
    }

    Ok(())
}

/// Small end-to-end run on synthetic blobs, no dataset files needed.
fn check() -> imbrl::Result<()> {
    let imb_rate = 0.2;
    let (x, y) = generate_gaussian(400, 80, 8, constants::data::SPLIT_SEED);
    let split = get_train_test_val(
        &x,
        &y,
        &x,
        &y,
        imb_rate,
        &[1],
        &[0],
        constants::data::VAL_FRAC,
        constants::data::SPLIT_SEED,
    )?;
    print_stats(&split);

    println!("{}", "ddqn:".bold());
    let env = ClassifyEnv::new(split.x_train.clone(), split.y_train.clone(), imb_rate)?;
    let config = DdqnConfig {
        episodes: 200,
        decay_episodes: 100,
        warmup_steps: 200,
        val_every: 50,
        log_every: 50,
        ..DdqnConfig::default()
    };
    let mut ddqn = TrainDdqn::new(config, ClassifierHooks)?;
    ddqn.compile_model(env, None, Some(&[32]), None)?;
    ddqn.train(&split.x_val, &split.y_val)?;
    println!("{}", rounded(&ddqn.evaluate(&split.x_test, &split.y_test)?).green());

    println!("{}", "bandit:".bold());
    let config = BanditConfig {
        training_loops: 100,
        decay_steps: 50,
        steps_per_loop: 8,
        val_every: 25,
        log_every: 25,
        ..BanditConfig::default()
    };
    let env = BanditEnv::new(
        split.x_train.clone(),
        split.y_train.clone(),
        imb_rate,
        config.batch_size,
    )?;
    let mut bandit = TrainBandit::new(config, ClassifierHooks)?;
    bandit.compile_model(env, None, Some(&[32]), None)?;
    bandit.train(&split.x_val, &split.y_val)?;
    println!("{}", rounded(&bandit.evaluate(&split.x_test, &split.y_test)?).green());

    Ok(())
}
