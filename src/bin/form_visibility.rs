// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Simple CLI for visibility rules
//!
//! Evaluate or validate a condition tree, resolve computed fields against the
//! directory proxy, or list the registered computed fields.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use form_visibility::context::{EvaluationContext, QuestionnaireInfo, SessionInfo};
use form_visibility::{
    ComputedField, ContextResolverRegistry, Filter, HttpDirectoryClient, ResolvedValueMap,
    explain, is_visible, validate_filter,
};
use serde_json::Value as JsonValue;
use std::fs;
use std::io::{self, Read};
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "form-visibility")]
#[command(about = "Evaluate and validate questionnaire visibility rules")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a condition tree against a value map
    Evaluate {
        /// JSON file containing the condition tree
        #[arg(short, long)]
        filter: String,
        /// JSON object file with answers and computed fields (reads from stdin if not provided)
        #[arg(short, long)]
        values: Option<String>,
        /// Print the full evaluation trace as JSON
        #[arg(short, long)]
        explain: bool,
    },
    /// Validate the structure of a condition tree
    Validate {
        /// JSON file containing the condition tree
        #[arg(short, long)]
        filter: String,
        /// Suppress informational messages
        #[arg(short, long)]
        quiet: bool,
    },
    /// Resolve computed fields against the directory proxy
    Resolve {
        /// Comma-separated computed-field codes
        #[arg(short, long, value_delimiter = ',', required = true)]
        codes: Vec<String>,
        /// Organization id of the session
        #[arg(short, long)]
        organization: i64,
        /// User id of the session
        #[arg(short, long, default_value_t = 0)]
        user: i64,
        /// Questionnaire reference year
        #[arg(long)]
        year: Option<i32>,
        /// Questionnaire reference month
        #[arg(long)]
        month: Option<u32>,
    },
    /// List the registered computed fields
    Fields,
}

#[tokio::main]
async fn main() {
    // Setup human-panic for better error messages
    human_panic::setup_panic!();
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Evaluate {
            filter,
            values,
            explain,
        } => handle_evaluate(&filter, values.as_deref(), explain),
        Commands::Validate { filter, quiet } => handle_validate(&filter, quiet),
        Commands::Resolve {
            codes,
            organization,
            user,
            year,
            month,
        } => handle_resolve(codes, organization, user, year, month).await,
        Commands::Fields => {
            handle_fields();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn read_json(file: Option<&str>) -> Result<JsonValue> {
    let content = match file {
        Some(filename) => fs::read_to_string(filename)
            .with_context(|| format!("reading file '{filename}'"))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("reading from stdin")?;
            buffer
        }
    };
    serde_json::from_str(&content).context("parsing JSON")
}

fn handle_evaluate(filter_file: &str, values_file: Option<&str>, trace: bool) -> Result<()> {
    let filter = Filter::from_json(&read_json(Some(filter_file))?)?;
    let values = match read_json(values_file)? {
        JsonValue::Object(object) => ResolvedValueMap::from_json_object(&object),
        other => anyhow::bail!("values must be a JSON object, got {other}"),
    };

    if trace {
        let trace = explain(filter.as_ref(), &values);
        println!("{}", serde_json::to_string_pretty(&trace)?);
    } else if is_visible(filter.as_ref(), &values) {
        println!("visible");
    } else {
        println!("hidden");
    }
    Ok(())
}

fn handle_validate(filter_file: &str, quiet: bool) -> Result<()> {
    let report = validate_filter(&read_json(Some(filter_file))?);

    if quiet {
        println!("{}", if report.valid { "VALID" } else { "INVALID" });
    } else {
        for error in &report.errors {
            eprintln!("✗ {error}");
        }
        for warning in &report.warnings {
            eprintln!("! {warning}");
        }
        if report.valid {
            println!("✓ Filter is valid");
        }
    }

    if !report.valid {
        process::exit(1);
    }
    Ok(())
}

async fn handle_resolve(
    codes: Vec<String>,
    organization: i64,
    user: i64,
    year: Option<i32>,
    month: Option<u32>,
) -> Result<()> {
    let directory = HttpDirectoryClient::from_env().context("configuring directory client")?;
    let questionnaire = QuestionnaireInfo {
        reference_year: year,
        reference_month: month,
        ..QuestionnaireInfo::default()
    };
    let ctx = EvaluationContext::new(
        SessionInfo::new(user, organization),
        questionnaire,
        Arc::new(directory),
    );

    let values = ContextResolverRegistry::standard()
        .resolve_many(codes, &ctx)
        .await;
    println!("{}", serde_json::to_string_pretty(&values)?);

    for diagnostic in ctx.diagnostics() {
        eprintln!("{diagnostic}");
    }
    Ok(())
}

fn handle_fields() {
    for field in ComputedField::all() {
        println!("{:<16} {}", field.code(), field.description());
    }
}
