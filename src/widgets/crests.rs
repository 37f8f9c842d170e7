//! Team crest lookup.
//!
//! Team names arrive in whatever form the score provider uses ("Arsenal",
//! "Arsenal London FC", "West Ham United FC"), so lookups go through a
//! normalized key: lowercase, punctuation stripped, club suffixes dropped.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;
use url::Url;

use crate::refresh::{CrestLookup, ImageRef};

/// Normalized team name → crest file name
const KNOWN_CRESTS: &[(&str, &str)] = &[
    ("arsenal", "arsenal.png"),
    ("arsenal london", "arsenal.png"),
    ("chelsea", "chelsea.png"),
    ("everton", "everton.png"),
    ("leicester city", "leicester_city.png"),
    ("liverpool", "liverpool.png"),
    ("manchester city", "manchester_city.png"),
    ("manchester united", "manchester_united.png"),
    ("man united", "manchester_united.png"),
    ("stoke city", "stoke_city.png"),
    ("sunderland", "sunderland.png"),
    ("swansea city", "swansea_city.png"),
    ("tottenham hotspur", "tottenham_hotspur.png"),
    ("west bromwich albion", "west_bromwich_albion.png"),
    ("west ham united", "west_ham_united.png"),
];

const CLUB_SUFFIXES: &[&str] = &["fc", "afc", "cf"];

pub struct CrestCatalog {
    base: Url,
    files: HashMap<String, String>,
}

impl CrestCatalog {
    /// Catalog of the built-in crests served from `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base =
            Url::parse(base_url).with_context(|| format!("Invalid crest base URL '{}'", base_url))?;
        // Url::join replaces the last path segment unless the base ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let files = KNOWN_CRESTS
            .iter()
            .map(|(name, file)| (name.to_string(), file.to_string()))
            .collect();
        Ok(CrestCatalog { base, files })
    }

    /// Add or override a crest for a team.
    pub fn with_team(mut self, team_name: &str, file: &str) -> Self {
        self.files.insert(normalize_team(team_name), file.to_string());
        self
    }

    /// Forget crests whose file is missing from `dir`, so those teams render
    /// without an image instead of a broken link.
    pub fn available_in(mut self, dir: &Path) -> Self {
        let before = self.files.len();
        self.files.retain(|_, file| dir.join(file.as_str()).is_file());
        if self.files.len() < before {
            debug!(
                "{} of {} crest entries have no file in {}",
                before - self.files.len(),
                before,
                dir.display()
            );
        }
        self
    }
}

impl CrestLookup for CrestCatalog {
    fn resolve(&self, team_name: &str) -> Option<ImageRef> {
        let file = self.files.get(&normalize_team(team_name))?;
        let url = self.base.join(file).ok()?;
        Some(ImageRef(url.to_string()))
    }
}

fn normalize_team(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !CLUB_SUFFIXES.contains(t))
        .collect::<Vec<_>>()
        .join(" ")
}
