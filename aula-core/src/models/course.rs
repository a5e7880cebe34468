use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A course listing as stored in the `courses` table. `content_text` holds
/// the syllabus text extracted upstream (PDF parsing happens before the API
/// is called); `embedding` is populated out of band by the embedder.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub is_active: bool,
    pub content_text: Option<String>,
    pub syllabus_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a course listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourse {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub content_text: Option<String>,
    pub syllabus_url: Option<String>,
}

fn default_active() -> bool {
    true
}

/// Text fed to the embedding model for a listing: title, description and
/// syllabus text concatenated, blank parts skipped. Retrieval serves the
/// same fields back as chat context, so query and corpus stay aligned.
pub fn embedding_text(title: &str, description: Option<&str>, content_text: Option<&str>) -> String {
    let mut parts = vec![title.trim()];
    if let Some(d) = description {
        if !d.trim().is_empty() {
            parts.push(d.trim());
        }
    }
    if let Some(c) = content_text {
        if !c.trim().is_empty() {
            parts.push(c.trim());
        }
    }
    parts.join("\n")
}

/// One retrieval hit: the course text the prompt will cite, plus the cosine
/// similarity reported by the store. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CourseMatch {
    pub title: String,
    pub content: String,
    pub similarity: f64,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_text_joins_present_parts() {
        let text = embedding_text(
            "Panadería Profesional",
            Some("Formación integral en panificación."),
            Some("Módulo 1: masas madre."),
        );

        assert_eq!(
            text,
            "Panadería Profesional\nFormación integral en panificación.\nMódulo 1: masas madre."
        );
    }

    #[test]
    fn test_embedding_text_skips_blank_parts() {
        assert_eq!(embedding_text("Pastelería", Some("   "), None), "Pastelería");
    }

    #[test]
    fn test_new_course_defaults_to_active() {
        let payload = serde_json::json!({"title": "Cocina Regional"});
        let course: NewCourse = serde_json::from_value(payload).expect("deserialize");
        assert!(course.is_active);
        assert!(course.description.is_none());
    }
}
