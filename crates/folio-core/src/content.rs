#![forbid(unsafe_code)]

//! Read-only portfolio content.
//!
//! Content is supplied once at startup by the data-loading collaborator as
//! JSON. Every field has a default so that a partially filled document still
//! loads: a missing string renders as nothing, a missing list as an empty
//! section. Only JSON that does not parse at all is an error.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error loading content.
#[derive(Debug)]
pub enum ContentError {
    /// The document is not valid JSON or has the wrong shape.
    Parse(serde_json::Error),
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentError::Parse(e) => write!(f, "invalid content: {e}"),
        }
    }
}

impl std::error::Error for ContentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContentError::Parse(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for ContentError {
    fn from(e: serde_json::Error) -> Self {
        ContentError::Parse(e)
    }
}

/// One technology inside a skill group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Technology {
    /// Display name.
    pub name: String,
    /// Icon reference (URL or asset path).
    #[serde(alias = "logo")]
    pub icon: String,
}

/// A titled group of technologies, shown as one revealable section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkillGroup {
    /// Stable numeric id; also names the group's visibility region.
    pub id: u32,
    /// Section heading.
    pub title: String,
    /// Short blurb under the heading.
    pub description: String,
    /// Technologies listed in the group, in display order.
    pub technologies: Vec<Technology>,
    /// Accent color token, e.g. `"#6366F1"`.
    #[serde(alias = "backgroundColor")]
    pub accent_color: Option<String>,
    /// Background image reference.
    pub background: Option<String>,
}

impl SkillGroup {
    /// Visibility region id for this group's reveal animation.
    #[must_use]
    pub fn region_id(&self) -> String {
        format!("project-{}", self.id)
    }

    /// Whether the group has anything to show.
    #[must_use]
    pub fn is_renderable(&self) -> bool {
        !self.title.trim().is_empty() || !self.technologies.is_empty()
    }
}

/// Contact links.
///
/// Stored at the top level of the content document next to `name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactLinks {
    /// Contact e-mail address.
    #[serde(rename = "contactEmail", alias = "email")]
    pub email: Option<String>,
    /// GitHub user name.
    pub github: Option<String>,
    /// Full LinkedIn profile URL.
    pub linkedin: Option<String>,
}

impl ContactLinks {
    /// `https://github.com/{user}` when a user name is present.
    #[must_use]
    pub fn github_url(&self) -> Option<String> {
        self.github
            .as_deref()
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .map(|user| format!("https://github.com/{user}"))
    }

    /// `mailto:` link when an address is present.
    #[must_use]
    pub fn mailto(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(|addr| format!("mailto:{addr}"))
    }
}

/// Everything the page shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioContent {
    pub name: String,
    /// Biography paragraph.
    pub about: String,
    #[serde(alias = "projects")]
    pub skill_groups: Vec<SkillGroup>,
    #[serde(flatten)]
    pub contact: ContactLinks,
}

impl PortfolioContent {
    /// Parse content from JSON.
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse content, falling back to empty content on error.
    #[must_use]
    pub fn from_json_or_default(json: &str) -> Self {
        match Self::from_json(json) {
            Ok(content) => content,
            Err(e) => {
                crate::warn!(error = %e, "content failed to parse, rendering empty page");
                Self::default()
            }
        }
    }

    /// Groups worth rendering, in document order.
    pub fn renderable_groups(&self) -> impl Iterator<Item = &SkillGroup> + '_ {
        self.skill_groups.iter().filter(|g| g.is_renderable())
    }
}
