//! Native installer packaging for JVM applications.
//!
//! Builds application images and platform installers from a compiled
//! application; run with `--help` for the options.

use kodegen_bundler_package::cli;
use kodegen_bundler_package::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            let output = OutputManager::new(false);
            output.error(&format!("Fatal error: {e}"));

            if let kodegen_bundler_package::PackagerError::Bundler(inner) = &e
                && let Some(tool_output) = inner.tool_output()
                && !tool_output.trim().is_empty()
            {
                output.error("Tool output:");
                for line in tool_output.lines() {
                    output.error(&format!("  {line}"));
                }
            }

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                let _ = output.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    let _ = output.indent(&suggestion);
                }
            }

            process::exit(1);
        }
    }
}
