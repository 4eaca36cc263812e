use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Secrets (admin key, gateway credentials) are deliberately not listed here
    const DISPLAY_ENVS: [&str; 23] = [
        "RUST_LOG",
        "VPG_HOST",
        "VPG_PORT",
        "VPG_DATABASE_URL",
        "VPG_PUBLIC_URL",
        "VPG_STOREFRONT_URL",
        "VPG_COINS_PER_PAYMENT",
        "VPG_CASHBACK_PER_PAYMENT",
        "VPG_MIN_ORDER_AMOUNT",
        "VPG_PREMIUM_PERIOD_DAYS",
        "VPG_SETTLEMENT_CYCLES",
        "VPG_SETTLEMENT_UTC_OFFSET",
        "VPG_MIN_INSTANT_PAYOUT",
        "VPG_RETURN_POLL_ATTEMPTS",
        "VPG_RETURN_POLL_INTERVAL_MS",
        "VPG_REWARD_REPAIR_INTERVAL",
        "VPG_REWARD_REPAIR_MIN_AGE",
        "VPG_GATEWAY_TIMEOUT_SECS",
        "VPG_HOSTED_CHECKOUT_BASE_URL",
        "VPG_HOSTED_CHECKOUT_API_VERSION",
        "VPG_SEALED_FORM_MERCHANT_ID",
        "VPG_SEALED_FORM_ACTION_URL",
        "VPG_SEALED_FORM_STATUS_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
