use leadscan_core::{ScanConfig, Source};

use super::*;

fn base_config() -> ScanConfig {
    ScanConfig {
        city: "Szczecin".to_owned(),
        industries: vec!["kawiarnie".to_owned()],
        sources: vec![Source::DirectoryA, Source::DirectoryB],
        max_results_per_industry: 20,
        request_delay_min_ms: 2_000,
        request_delay_max_ms: 5_000,
        page_delay_min_ms: 3_000,
        page_delay_max_ms: 6_000,
        throttle_cooldown_secs: 30,
        max_cooldown_secs: 120,
        max_retries: 3,
        retry_backoff_ms: 1_000,
        request_timeout_secs: 30,
        verify_websites: true,
        verify_timeout_secs: 8,
        detect_parked_domains: false,
        domain_guess_tlds: vec!["pl".to_owned()],
        max_concurrent_sources: 1,
        user_agents: Vec::new(),
        maps_api_key: None,
        maps_quota: 100,
        directory_a_url: "https://panoramafirm.pl".to_owned(),
        directory_b_url: "https://www.pkt.pl".to_owned(),
        maps_url: "https://maps.googleapis.com".to_owned(),
        log_level: "info".to_owned(),
    }
}

fn scan_args(args: &[&str]) -> ScanArgs {
    let argv = ["leadscan-cli", "scan"].iter().chain(args.iter()).copied();
    match Cli::try_parse_from(argv).expect("expected valid cli args").command {
        Some(Commands::Scan(args)) => args,
        None => panic!("expected scan command"),
    }
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["leadscan-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn bare_scan_has_no_overrides() {
    let args = scan_args(&[]);
    assert!(args.industries.is_none());
    assert!(args.sources.is_none());
    assert!(args.max_results.is_none());
    assert!(!args.no_verify);
    assert!(!args.all);
}

#[test]
fn parses_comma_separated_lists() {
    let args = scan_args(&[
        "--industries",
        "kawiarnie,fryzjerzy",
        "--sources",
        "pkt,google",
        "--max-results",
        "5",
    ]);
    assert_eq!(
        args.industries,
        Some(vec!["kawiarnie".to_owned(), "fryzjerzy".to_owned()])
    );
    assert_eq!(args.sources, Some(vec![Source::DirectoryB, Source::Maps]));
    assert_eq!(args.max_results, Some(5));
}

#[test]
fn unknown_source_is_rejected() {
    let result = Cli::try_parse_from(["leadscan-cli", "scan", "--sources", "yelp"]);
    assert!(result.is_err());
}

#[test]
fn flags_override_config() {
    let args = scan_args(&[
        "--industries",
        "piekarnie",
        "--sources",
        "maps",
        "--city",
        "Police",
        "--max-results",
        "7",
        "--concurrency",
        "3",
        "--no-verify",
    ]);
    let mut config = base_config();
    args.apply(&mut config).expect("valid overrides");

    assert_eq!(config.industries, vec!["piekarnie"]);
    assert_eq!(config.sources, vec![Source::Maps]);
    assert_eq!(config.city, "Police");
    assert_eq!(config.max_results_per_industry, 7);
    assert_eq!(config.max_concurrent_sources, 3);
    assert!(!config.verify_websites);
}

#[test]
fn absent_flags_keep_config() {
    let mut config = base_config();
    scan_args(&[]).apply(&mut config).expect("valid overrides");
    assert_eq!(config.industries, vec!["kawiarnie"]);
    assert!(config.verify_websites);
    assert_eq!(config.max_results_per_industry, 20);
}

#[test]
fn zero_max_results_is_rejected() {
    let mut config = base_config();
    let err = scan_args(&["--max-results", "0"])
        .apply(&mut config)
        .expect_err("zero cap must fail");
    assert!(err.to_string().contains("--max-results"));
}

#[test]
fn concurrency_out_of_range_is_rejected() {
    let mut config = base_config();
    assert!(scan_args(&["--concurrency", "4"]).apply(&mut config).is_err());
    assert!(scan_args(&["--concurrency", "0"]).apply(&mut config).is_err());
    assert_eq!(config.max_concurrent_sources, 1);
}
