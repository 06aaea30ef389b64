use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use pocket_ledger::{
    Calendar, CategoryName, CurrencyCode, Frequency, RecurringRuleDetails, Timestamp, Transaction,
    TransactionKind, create_recurring_rule, create_transaction, initialize_db,
};

/// A utility for creating a test database for the pocket_ledger server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// The time zone the sample recurring rules are scheduled in.
    #[arg(long, default_value = "Etc/UTC")]
    timezone: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    let calendar = Calendar::new(&args.timezone)?;

    println!("Creating database at {output_path:#?}");
    let connection = Connection::open(output_path)?;

    initialize_db(&connection)?;

    println!("Creating sample transactions...");

    let now = OffsetDateTime::now_utc();
    let samples = [
        (12.5, TransactionKind::Expense, "Food", "Lunch", 1),
        (3.2, TransactionKind::Expense, "Transport", "Bus fare", 2),
        (64.0, TransactionKind::Expense, "Shopping", "Shoes", 9),
        (250.0, TransactionKind::Income, "Freelance", "Logo design", 20),
        (38.9, TransactionKind::Expense, "Food", "Groceries", 33),
        (18.0, TransactionKind::Expense, "Entertainment", "Cinema", 47),
    ];

    for (amount, kind, category, note, days_ago) in samples {
        create_transaction(
            Transaction::build(
                amount,
                kind,
                CategoryName::new(category)?,
                Timestamp::from(now - Duration::days(days_ago)),
            )
            .note(Some(note.to_owned())),
            &connection,
        )?;
    }

    println!("Creating sample recurring rules...");

    let rules = [
        (2400.0, TransactionKind::Income, "Salary", Frequency::Monthly, "Wages"),
        (450.0, TransactionKind::Expense, "Bills", Frequency::Monthly, "Rent"),
        (30.0, TransactionKind::Expense, "Transport", Frequency::Weekly, "Bus pass"),
    ];

    for (amount, kind, category, frequency, note) in rules {
        let created = create_recurring_rule(
            RecurringRuleDetails {
                amount,
                kind,
                category: CategoryName::new(category)?,
                frequency,
                note: Some(note.to_owned()),
                currency: CurrencyCode::default(),
            },
            Timestamp::from(now - Duration::days(60)),
            12,
            &calendar,
            &connection,
        )?;
        println!(
            "  {note}: {} transaction(s), next due {}",
            created.transactions.len(),
            created.rule.next_due_date
        );
    }

    println!("Success!");

    Ok(())
}
