//! Credential loading for CLI commands.

use std::{collections::HashMap, path::PathBuf};

use anyhow::{Context as _, Result, bail, ensure};
use clap::Args;
use graphwatch::Context;
use graphwatch_core::{CredentialsConfig, resolve_env_value};
use sharepoint::SharePointCredential;

pub type Credentials = HashMap<String, HashMap<String, String>>;

/// Where credentials come from.
#[derive(Debug, Clone, Default, Args)]
pub struct CredentialArgs {
    /// Credentials in the format `name:key=value;key2=value2`.
    /// Can be specified multiple times.
    /// Values starting with `env:` will be read from environment variables.
    /// Use `\;` and `\=` to escape data.
    #[arg(short = 'C', long = "creds")]
    pub credentials: Vec<String>,

    /// Path to a TOML file containing credentials.
    /// Defaults to `$GRAPHWATCH_CREDENTIALS_PATH` or
    /// `~/.config/graphwatch/credentials.toml`.
    #[arg(long = "creds-file")]
    pub credentials_file: Option<PathBuf>,
}

/// Loads credentials from the credentials file, then applies `-C` overrides
/// field by field.
pub fn load_credentials(args: &CredentialArgs) -> Result<Credentials> {
    let file = match &args.credentials_file {
        Some(path) => CredentialsConfig::load(path)
            .with_context(|| format!("failed to load credentials file: {}", path.display()))?,
        None => CredentialsConfig::load_resolved()
            .context("failed to load credentials file")?
            .unwrap_or_default(),
    };
    let mut credentials = file.resolve_env()?;

    for cred_str in &args.credentials {
        let (name, values) = parse_override(cred_str)?;
        let mut processed_values = HashMap::new();
        for (k, v) in values {
            processed_values.insert(k, resolve_env_value(&v)?);
        }

        credentials
            .entry(name)
            .or_default()
            .extend(processed_values);
    }

    Ok(credentials)
}

/// Installs the credential section `section` as the SharePoint credential of
/// `ctx`.
pub fn with_sharepoint_credential(
    ctx: Context,
    credentials: &Credentials,
    section: &str,
) -> Result<Context> {
    let values = credentials.get(section).with_context(|| {
        format!(
            "credential '{section}' is not configured; add a [{section}] table to \
             credentials.toml or pass -C {section}:key=value"
        )
    })?;
    Ok(ctx.with_credential(SharePointCredential::NAME, values.clone()))
}

/// Splits one `-C` argument into its section name and key/value pairs.
///
/// Pairs are separated by `;` and split at their first `=`. A backslash makes
/// the next character literal. Empty pairs (such as a trailing `;`) are skipped.
fn parse_override(arg: &str) -> Result<(String, HashMap<String, String>)> {
    let (name, pairs) = arg
        .split_once(':')
        .filter(|(name, _)| !name.trim().is_empty())
        .context("invalid credential format: missing name (expected name:key=value)")?;
    let name = name.trim();

    let mut values = HashMap::new();
    for pair in split_unescaped(pairs, ';') {
        if pair.trim().is_empty() {
            continue;
        }
        let Some(at) = find_unescaped(pair, '=') else {
            bail!("invalid credential entry {pair:?} for '{name}': expected key=value");
        };
        let key = unescape(pair[..at].trim());
        ensure!(!key.is_empty(), "invalid credential entry {pair:?} for '{name}': empty key");
        values.insert(key, unescape(&pair[at + 1..]));
    }

    Ok((name.to_string(), values))
}

/// Byte offset of the first `sep` in `text` that is not escaped.
fn find_unescaped(text: &str, sep: char) -> Option<usize> {
    let mut escaped = false;
    for (at, c) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            return Some(at);
        }
    }
    None
}

/// Splits `text` at every unescaped `sep`. Escapes stay in the pieces.
fn split_unescaped(mut text: &str, sep: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    while let Some(at) = find_unescaped(text, sep) {
        pieces.push(&text[..at]);
        text = &text[at + sep.len_utf8()..];
    }
    pieces.push(text);
    pieces
}

/// Drops escaping backslashes. A trailing lone backslash is kept.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next().unwrap_or('\\'));
        } else {
            out.push(c);
        }
    }
    out
}
