//! Folder path normalization.

use std::{borrow::Cow, fmt};

use crate::error::SharePointError;

/// Spellings that all mean "the library root", compared after decoding,
/// trimming and lowercasing.
const ROOT_ALIASES: &[&str] = &[
    "/",
    "",
    "/root",
    "/shared documents",
    "shared documents",
    "/shared%20documents",
    "shared%20documents",
];

/// Characters SharePoint rejects in folder names.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// A validated folder location inside a document library.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FolderPath {
    Root,
    /// Path relative to the library root, without leading or trailing `/`.
    Relative(String),
}

impl FolderPath {
    /// Normalizes user input into a folder path.
    ///
    /// Percent-encoding is decoded, surrounding whitespace and slashes are
    /// stripped (all of them, so `//a//` becomes `a`), and every root alias
    /// maps to [`FolderPath::Root`].
    /// Normalizing the display form of the result yields the same value.
    ///
    /// # Errors
    ///
    /// Returns [`SharePointError::InvalidPath`] if the path contains any of
    /// `< > : " | ? *`.
    pub fn parse(raw: &str) -> Result<Self, SharePointError> {
        let decoded = decode_fully(raw);
        if is_root_alias(&decoded) {
            return Ok(Self::Root);
        }

        let clean = decoded.trim_matches(|c: char| c == '/' || c.is_whitespace());
        if clean.is_empty() || is_root_alias(clean) {
            return Ok(Self::Root);
        }
        if clean.contains(INVALID_CHARS) {
            return Err(SharePointError::InvalidPath(raw.to_string()));
        }
        Ok(Self::Relative(clean.to_string()))
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }

    /// The child folder `name` of this folder.
    #[must_use]
    pub fn join(&self, name: &str) -> Self {
        match self {
            Self::Root => Self::Relative(name.to_string()),
            Self::Relative(path) => Self::Relative(format!("{path}/{name}")),
        }
    }

    /// Graph URL segments addressing this folder's children in `drive_id`.
    pub(crate) fn children_segments<'a>(&'a self, drive_id: &'a str) -> Vec<Cow<'a, str>> {
        let mut segments = vec![Cow::Borrowed("drives"), Cow::Borrowed(drive_id)];
        match self {
            Self::Root => segments.push(Cow::Borrowed("root")),
            Self::Relative(path) => {
                segments.push(Cow::Borrowed("root:"));
                let mut parts: Vec<Cow<'a, str>> =
                    path.split('/').map(Cow::Borrowed).collect();
                if let Some(last) = parts.last_mut() {
                    *last = Cow::Owned(format!("{last}:"));
                }
                segments.extend(parts);
            }
        }
        segments.push(Cow::Borrowed("children"));
        segments
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("/"),
            Self::Relative(path) => f.write_str(path),
        }
    }
}

/// Returns true if `path` names the library root.
pub fn is_root(path: &str) -> bool {
    is_root_alias(&decode_fully(path))
}

fn is_root_alias(path: &str) -> bool {
    let lowered = path.trim().to_lowercase();
    ROOT_ALIASES.contains(&lowered.as_str())
}

/// Percent-decodes until the text stops changing. Input that does not
/// decode to UTF-8 is kept as is.
fn decode_fully(raw: &str) -> String {
    let mut current = raw.to_string();
    while let Some(next) = decode_once(&current) {
        current = next;
    }
    current
}

fn decode_once(text: &str) -> Option<String> {
    match urlencoding::decode(text) {
        Ok(decoded) if decoded != text => Some(decoded.into_owned()),
        _ => None,
    }
}
