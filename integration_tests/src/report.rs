//! Pass/fail bookkeeping shared by the test binaries.

use colored::Colorize;

struct Outcome {
    name: String,
    error: Option<String>,
}

/// Runs named checks, prints each verdict as it lands and a summary at the end.
#[derive(Default)]
pub struct Report {
    outcomes: Vec<Outcome>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one check; an `Err` marks it failed.
    pub fn check<F>(&mut self, name: &str, test: F)
    where
        F: FnOnce() -> anyhow::Result<()>,
    {
        print!("  {} ... ", name);
        std::io::Write::flush(&mut std::io::stdout()).ok();

        let error = test().err().map(|e| format!("{:#}", e));
        match &error {
            None => println!("{}", "PASS".green().bold()),
            Some(msg) => {
                println!("{}", "FAIL".red().bold());
                println!("    {}", msg.red());
            }
        }

        self.outcomes.push(Outcome {
            name: name.to_string(),
            error,
        });
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_some()).count()
    }

    /// Print the summary table.
    pub fn print_summary(&self) {
        let rule = "=".repeat(60);
        println!("\n{}\n{}\n{}", rule, "Test Results".bold(), rule);

        for outcome in &self.outcomes {
            match &outcome.error {
                None => println!("  {} {}", "[PASS]".green().bold(), outcome.name),
                Some(msg) => {
                    println!("  {} {}", "[FAIL]".red().bold(), outcome.name);
                    println!("         {}", msg.red());
                }
            }
        }

        let failed = self.failed();
        let passed = self.outcomes.len() - failed;
        let failed_text = if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        };
        println!("{}", "-".repeat(60));
        println!("  Total: {} passed, {} failed", passed.to_string().green(), failed_text);
        println!("{}", rule);
    }

    /// Exit non-zero when anything failed.
    pub fn exit(self) -> ! {
        self.print_summary();
        std::process::exit(if self.failed() > 0 { 1 } else { 0 })
    }
}
