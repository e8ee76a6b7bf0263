//! Displays the SharePoint credential fields and the JSON schemas of trigger
//! options and document operations.

use anyhow::Result;
use clap::{Args, ValueEnum};
use console::style;
use graphwatch::schemars::{Schema, schema_for};
use sharepoint::{DocumentOperation, SharePointCredential, TriggerOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Topic {
    /// Fields of the `sharepoint` credential
    Credential,
    /// Options of a trigger in graphwatch.toml
    Trigger,
    /// Input of the `call` command
    Operations,
}

#[derive(Args)]
pub struct DescribeArgs {
    /// What to describe. Describes everything when omitted.
    #[arg(value_enum)]
    pub topic: Option<Topic>,
}

pub fn run(args: &DescribeArgs) -> Result<()> {
    let topics = args.topic.map_or_else(
        || vec![Topic::Credential, Topic::Trigger, Topic::Operations],
        |topic| vec![topic],
    );

    for (i, topic) in topics.into_iter().enumerate() {
        if i > 0 {
            println!();
        }
        match topic {
            Topic::Credential => print_credential(),
            Topic::Trigger => print_schema("Trigger Options", &schema_for!(TriggerOptions))?,
            Topic::Operations => {
                print_schema("Document Operations", &schema_for!(DocumentOperation))?;
            }
        }
    }
    Ok(())
}

fn print_credential() {
    println!(
        "{} [{}]",
        style("Credential").bold().underlined(),
        SharePointCredential::NAME
    );
    println!();
    println!("{}", SharePointCredential::DESCRIPTION.trim());
    println!();
    for (name, field) in SharePointCredential::FIELDS {
        let required = if field.required {
            style("required").red()
        } else {
            style("optional").dim()
        };
        println!(
            "  {} ({}): {}",
            style(name).cyan(),
            required,
            field.description.trim()
        );
    }
}

fn print_schema(title: &str, schema: &Schema) -> Result<()> {
    println!("{}", style(title).bold().underlined());
    println!();
    println!("{}", serde_json::to_string_pretty(schema)?);
    Ok(())
}
