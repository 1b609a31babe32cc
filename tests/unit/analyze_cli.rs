//! Unit tests for CLI argument parsing

use clap::Parser;
use std::path::PathBuf;
use wholesale_profit_analyzer::cli::{Cli, Commands};

#[test]
fn test_analyze_defaults() {
    let cli = Cli::try_parse_from(["wholesale-profit-analyzer", "analyze", "products.csv"])
        .unwrap();

    assert_eq!(cli.checkpoint_dir, PathBuf::from(".checkpoints"));
    match cli.command {
        Commands::Analyze(args) => {
            assert_eq!(args.input, PathBuf::from("products.csv"));
            assert_eq!(args.output, PathBuf::from("report.csv"));
            assert_eq!(args.batch_id, None);
            assert_eq!(args.fan_out, 8);
            assert_eq!(args.per_product_timeout_secs, 60);
            assert_eq!(args.max_batch_size, None);
            assert!(!args.damp_by_competitor_count);
            assert_eq!(args.metrics_addr, None);
        }
        other => panic!("expected analyze command, got {other:?}"),
    }
}

#[test]
fn test_analyze_custom_arguments() {
    let cli = Cli::try_parse_from([
        "wholesale-profit-analyzer",
        "--checkpoint-dir",
        "/var/lib/analyzer",
        "analyze",
        "products.csv",
        "--output",
        "out.csv",
        "--batch-id",
        "spring-order",
        "--fan-out",
        "16",
        "--per-product-timeout-secs",
        "120",
        "--max-batch-size",
        "500",
        "--damp-by-competitor-count",
    ])
    .unwrap();

    assert_eq!(cli.checkpoint_dir, PathBuf::from("/var/lib/analyzer"));
    match cli.command {
        Commands::Analyze(args) => {
            assert_eq!(args.output, PathBuf::from("out.csv"));
            assert_eq!(args.batch_id.as_deref(), Some("spring-order"));
            assert_eq!(args.fan_out, 16);
            assert_eq!(args.per_product_timeout_secs, 120);
            assert_eq!(args.max_batch_size, Some(500));
            assert!(args.damp_by_competitor_count);
        }
        other => panic!("expected analyze command, got {other:?}"),
    }
}

#[test]
fn test_fan_out_zero_is_rejected() {
    let result = Cli::try_parse_from([
        "wholesale-profit-analyzer",
        "analyze",
        "products.csv",
        "--fan-out",
        "0",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_fan_out_above_maximum_is_rejected() {
    let result = Cli::try_parse_from([
        "wholesale-profit-analyzer",
        "analyze",
        "products.csv",
        "--fan-out",
        "33",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_per_product_timeout_out_of_range_is_rejected() {
    let result = Cli::try_parse_from([
        "wholesale-profit-analyzer",
        "analyze",
        "products.csv",
        "--per-product-timeout-secs",
        "0",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_validate_jan_subcommand_parses() {
    let cli = Cli::try_parse_from([
        "wholesale-profit-analyzer",
        "validate",
        "jan",
        "4901234567894",
    ])
    .unwrap();
    assert!(matches!(cli.command, Commands::Validate(_)));
}

#[test]
fn test_sources_list_subcommand_parses() {
    let cli =
        Cli::try_parse_from(["wholesale-profit-analyzer", "sources", "list"]).unwrap();
    assert!(matches!(cli.command, Commands::Sources(_)));
}

#[test]
fn test_missing_input_fails() {
    let result = Cli::try_parse_from(["wholesale-profit-analyzer", "analyze"]);
    assert!(result.is_err());
}
