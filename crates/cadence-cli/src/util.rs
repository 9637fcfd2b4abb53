use anyhow::Result;
use cadence_core::models::Template;
use cadence_core::repository::Repository;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("No template found matching '{0}'")]
    NotFound(String),
    #[error("Ambiguous template '{query}'")]
    Ambiguous {
        query: String,
        candidates: Vec<(String, String)>,
    },
    #[error("ID prefix must be at least 2 characters long")]
    TooShort,
}

/// Finds a template by exact title (ignoring case) or by ID prefix.
pub async fn resolve_template(repo: &impl Repository, query: &str) -> Result<Template> {
    let query = query.trim();
    if query.len() < 2 {
        return Err(LookupError::TooShort.into());
    }

    let templates = repo.find_templates().await?;
    let lowered = query.to_lowercase();

    let mut found: Vec<&Template> = templates
        .iter()
        .filter(|t| t.title.to_lowercase() == lowered)
        .collect();
    if found.is_empty() {
        found = templates
            .iter()
            .filter(|t| t.id.to_string().starts_with(&lowered))
            .collect();
    }

    match found.as_slice() {
        [template] => Ok((*template).clone()),
        [] => Err(LookupError::NotFound(query.to_string()).into()),
        matches => Err(LookupError::Ambiguous {
            query: query.to_string(),
            candidates: matches
                .iter()
                .map(|t| (t.id.to_string(), t.title.clone()))
                .collect(),
        }
        .into()),
    }
}
