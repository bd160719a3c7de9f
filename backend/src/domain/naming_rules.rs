//! Edgefile naming conventions that imply role ownership.
//!
//! Some configuration files are never referenced by a thread assignment but
//! still belong to a role by name, for example `crontab.gacq1.vdl` or the
//! reftek import files. Each convention is a [`NamingRule`]: a substring
//! trigger plus a way of resolving the owning role name. Rules are plain
//! data so they can be loaded from JSON.

use std::io;
use std::path::Path;

use cap_std::{ambient_authority, fs::Dir};
use serde::{Deserialize, Serialize};

/// How a matching edgefile name is resolved to a role name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleResolver {
    /// Always the named role.
    Fixed { role: String },
    /// Split the file name on any of `separators` and take the first token
    /// containing `needle`.
    FirstTokenContaining { separators: String, needle: String },
    /// The dot segment before the last one: `<prefix>.<role>.<account>`.
    PenultimateDotSegment,
}

impl RoleResolver {
    /// Resolve the role name for `file_name`, if the convention yields one.
    pub fn resolve(&self, file_name: &str) -> Option<String> {
        match self {
            Self::Fixed { role } => Some(role.clone()),
            Self::FirstTokenContaining { separators, needle } => file_name
                .split(|c: char| separators.contains(c))
                .find(|token| token.contains(needle.as_str()))
                .map(str::to_owned),
            Self::PenultimateDotSegment => {
                let (head, _account) = file_name.rsplit_once('.')?;
                let role = head.rsplit('.').next()?;
                (!role.is_empty()).then(|| role.to_owned())
            }
        }
    }
}

/// A single naming convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamingRule {
    /// Substring that must appear in the edgefile name.
    pub contains: String,
    /// Role resolution applied when the substring matches.
    pub resolver: RoleResolver,
}

impl NamingRule {
    /// Role named by this rule for `file_name`, or `None` if the rule does
    /// not fire.
    pub fn role_for(&self, file_name: &str) -> Option<String> {
        if !file_name.contains(self.contains.as_str()) {
            return None;
        }
        self.resolver.resolve(file_name)
    }
}

/// Errors raised while loading naming rules.
#[derive(Debug, thiserror::Error)]
pub enum NamingRulesError {
    /// The rules file could not be read.
    #[error("failed to read naming rules at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    /// The rules document is not valid JSON for [`NamingRules`].
    #[error("failed to parse naming rules: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Ordered, non-exclusive set of naming conventions.
///
/// # Examples
/// ```
/// use edgeconfig::domain::NamingRules;
///
/// let rules = NamingRules::default();
/// assert_eq!(rules.roles_for("etc.gacq4.~reftek.cfg"), ["gacq4"]);
/// assert_eq!(rules.roles_for("crontab.gacq1.vdl"), ["gacq1"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamingRules {
    rules: Vec<NamingRule>,
}

impl NamingRules {
    pub fn new(rules: Vec<NamingRule>) -> Self {
        Self { rules }
    }

    /// A rule set that never fires.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn rules(&self) -> &[NamingRule] {
        &self.rules
    }

    /// Every distinct role implied by `file_name`, in rule order.
    pub fn roles_for(&self, file_name: &str) -> Vec<String> {
        let mut roles: Vec<String> = Vec::new();
        for role in self.rules.iter().filter_map(|rule| rule.role_for(file_name)) {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
        roles
    }

    /// Parse a JSON rules document.
    pub fn from_json(json: &str) -> Result<Self, NamingRulesError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON rules document from disk.
    pub fn load(path: &Path) -> Result<Self, NamingRulesError> {
        let read_error = |source: io::Error| NamingRulesError::Read {
            path: path.display().to_string(),
            source,
        };
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = path.file_name().ok_or_else(|| {
            read_error(io::Error::new(
                io::ErrorKind::InvalidInput,
                "rules path must name a file",
            ))
        })?;
        let directory = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_error)?;
        let contents = directory
            .read_to_string(Path::new(file_name))
            .map_err(read_error)?;
        Self::from_json(&contents)
    }
}

impl Default for NamingRules {
    /// The conventions used by the acquisition fleet.
    fn default() -> Self {
        Self::new(vec![
            NamingRule {
                contains: "~reftek".to_owned(),
                resolver: RoleResolver::Fixed {
                    role: "gacq4".to_owned(),
                },
            },
            NamingRule {
                contains: "import_gacq".to_owned(),
                resolver: RoleResolver::FirstTokenContaining {
                    separators: "_.".to_owned(),
                    needle: "gacq".to_owned(),
                },
            },
            NamingRule {
                contains: "crontab".to_owned(),
                resolver: RoleResolver::PenultimateDotSegment,
            },
        ])
    }
}
