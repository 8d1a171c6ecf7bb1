use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;

const FIELDS_PER_LINE: usize = 5;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: String,
}

/// Identity map built once from the auth-store dump
/// (`login:passwordhash:Real Name:email:groups`, one record per line).
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: HashMap<String, User>,
}

impl UserDirectory {
    /// Load the directory from `users.auth.php`. A missing file yields an
    /// empty directory (the source may predate local auth); a structurally
    /// broken file is fatal.
    pub fn load(auth_path: &Path) -> Result<Self> {
        if !auth_path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(auth_path)
            .with_context(|| format!("failed to read {}", auth_path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("malformed auth store {}", auth_path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut users = HashMap::new();
        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = trimmed.split(':').collect();
            if fields.len() != FIELDS_PER_LINE {
                bail!(
                    "line {}: expected {FIELDS_PER_LINE} colon-separated fields, found {}",
                    index + 1,
                    fields.len()
                );
            }
            let user = User {
                id: fields[0].to_string(),
                display_name: fields[2].to_string(),
                email: fields[3].to_string(),
            };
            users.insert(user.id.clone(), user);
        }
        Ok(Self { users })
    }

    pub fn lookup(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
