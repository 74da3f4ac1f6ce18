// Walks through the Factory Method and the four singleton variants, then
// stress-tests the lazy holders.
//
// Usage: patterns [config.toml]

use colored::Colorize;
use design_patterns::config::StressConfig;
use design_patterns::factory::{ConcreteFactory, Factory};
use design_patterns::singleton::{self, double_checked, eager, locked, once, Instance};
use design_patterns::stress;
use std::process;

fn factory_example() {
    let factory = ConcreteFactory;
    let alice = factory.factory_method("alice");
    let bob = factory.factory_method("bob");

    println!("  {}", alice.use_product());
    println!("  {}", bob.use_product());
}

fn describe(
    name: &str,
    get_instance: fn() -> &'static dyn Instance,
    construction_count: Option<fn() -> usize>,
) {
    let first = get_instance();
    let second = get_instance();
    first.work();

    let built = match construction_count {
        Some(count) => count().to_string(),
        None => "before main".to_string(),
    };
    println!(
        "  {:<15} same instance: {}  constructions: {}",
        name,
        singleton::same_instance(first, second),
        built
    );
}

fn singleton_example() {
    describe("eager", eager::get_instance, None);
    describe("locked", locked::get_instance, Some(locked::construction_count));
    describe(
        "double_checked",
        double_checked::get_instance,
        Some(double_checked::construction_count),
    );
    describe("once", once::get_instance, Some(once::construction_count));
}

fn stress_example(config: &StressConfig) -> bool {
    let mut all_passed = true;

    for &variant in &config.variants {
        let outcome = stress::run(variant, config).and_then(|report| {
            report.verify()?;
            Ok(report)
        });

        match outcome {
            Ok(report) => println!(
                "  {} {:<15} {} rounds x {} callers in {:?}",
                "PASS".green().bold(),
                variant.to_string(),
                report.rounds,
                report.callers,
                report.elapsed
            ),
            Err(err) => {
                all_passed = false;
                println!("  {} {:<15} {}", "FAIL".red().bold(), variant.to_string(), err);
            }
        }
    }

    all_passed
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => StressConfig::load(&path),
        None => Ok(StressConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            process::exit(1);
        }
    };

    println!("Creational Patterns");
    println!("===================\n");

    println!("=== Factory Method ===");
    factory_example();
    println!();

    println!("=== Singletons ===");
    singleton_example();
    println!();

    println!("=== Stress: first access under contention ===");
    if !stress_example(&config) {
        process::exit(1);
    }
}
