use rpassword::read_password;
use std::io::{self, BufRead};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use tradeit_rs::api::filter::TransactionFilterType;
use tradeit_rs::{
    AuthenticationOutcome, LinkedBroker, LinkedBrokerConfig, LinkedLogin, TradeItConnector,
    TradeItEnvironment,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let (api_key, broker_name, user_id) = match (args.next(), args.next(), args.next()) {
        (Some(k), Some(b), Some(u)) => (k, b, u),
        _ => {
            eprintln!("Usage: linked-broker-status <api-key> <broker> <user-id>");
            process::exit(1);
        }
    };

    println!("Enter user token: ");
    let user_token = match read_password() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to read user token: {}", e);
            process::exit(1);
        }
    };

    let connector = match TradeItConnector::new(api_key, user_token, TradeItEnvironment::Sandbox) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create connector: {}", e);
            process::exit(1);
        }
    };

    let login = LinkedLogin::new(&broker_name, &broker_name, user_id, "");
    let config = LinkedBrokerConfig {
        refresh_timeout: Some(Duration::from_secs(30)),
    };
    let mut broker = LinkedBroker::with_config(Arc::new(connector), login, config);

    let mut outcome = broker.authenticate().await;
    while let Ok(AuthenticationOutcome::SecurityQuestion(question)) = outcome.clone() {
        println!(
            "Security question: {}",
            question.security_question.as_deref().unwrap_or("(none)")
        );
        for option in &question.security_question_options {
            println!("  - {}", option);
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            broker.cancel_security_question();
            break;
        }
        outcome = broker.answer_security_question(answer.trim()).await;
    }

    if let Some(error) = broker.error() {
        eprintln!("Authentication failed: {}", error);
        process::exit(1);
    }

    let summary = broker.refresh_account_balances().await;
    println!(
        "Refreshed {} of {} account(s)",
        summary.refreshed.len(),
        summary.total()
    );
    for failure in &summary.failures {
        println!("  {} failed: {}", failure.account_number, failure.error);
    }

    for account in broker.accounts() {
        println!("---");
        println!("Account: {} ({})", account.account_name, account.account_number);
        match &account.balance {
            Some(balance) => {
                println!(
                    "Total value: {} {}",
                    balance
                        .total_value
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "N/A".to_string()),
                    account.account_base_currency
                );
                println!("Buying power: {:?}", balance.buying_power);
            }
            None => println!("No balance available"),
        }
        for position in &account.positions {
            println!("  {} x {:?}", position.symbol, position.quantity);
        }

        match account.transaction_history().await {
            Ok(mut history) => {
                println!(
                    "Transactions in the last {} days: {}",
                    history.number_of_days(),
                    history.number_of_rows()
                );
                history.filter_transactions(TransactionFilterType::Trades);
                for row in (0..history.number_of_rows()).filter_map(|i| history.row(i)) {
                    println!(
                        "  {} {} {} {}",
                        row.date_label(),
                        row.type_label(),
                        row.symbol_label(),
                        row.amount_label()
                    );
                }
            }
            Err(e) => eprintln!("Failed to fetch transactions: {}", e),
        }
    }
}
