//! Bulk task import/export binary. See `recurring_tasks::tasks::bulk` for docs.

use recurring_tasks::tasks::bulk;
use std::io::{self, Read};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        bulk::print_usage();
        std::process::exit(i32::from(args.len() < 2));
    }
    if let Err(e) = run(&args[1]) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cmd: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = bulk::open_default_store()?;
    let output = match cmd {
        "import" => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            serde_json::to_string_pretty(&bulk::import_from_json(&store, &input)?)?
        }
        "export" => bulk::export_to_json(&store)?,
        other => {
            eprintln!("Unknown command: {other}");
            bulk::print_usage();
            std::process::exit(1);
        }
    };
    println!("{output}");
    Ok(())
}
