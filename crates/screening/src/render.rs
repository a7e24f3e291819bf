//! Report renderer contract (spec §6). A renderer turns one `CompiledResult`
//! into an artifact for a given persona; this crate only defines the
//! contract and the template/artifact shapes. Concrete renderers (PDF,
//! HTML, a customer's own template engine) are external collaborators --
//! the orchestrator never calls one, it only hands off a `CompiledResult`.

use crate::compile::CompiledResult;
use async_trait::async_trait;
use screening_core::error::Result;
use serde::{Deserialize, Serialize};

/// Which fields a persona is allowed to see, which get redacted rather than
/// omitted (so a reader knows something was withheld), and which disclosure
/// text is mandatory for that persona/jurisdiction pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportTemplate {
    pub persona: String,
    pub visible_fields: Vec<String>,
    pub redacted_fields: Vec<String>,
    pub aggregated_fields: Vec<String>,
    pub required_disclosures: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportFormat {
    Pdf,
    Html,
    Json,
}

/// What a renderer hands back: the artifact bytes plus enough metadata for
/// the caller to store and serve it without re-deriving anything from the
/// bytes themselves.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub format: ReportFormat,
    pub bytes: Vec<u8>,
    pub size_bytes: usize,
    pub checksum: String,
}

#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, compiled: &CompiledResult, template: &ReportTemplate) -> Result<RenderedReport>;
}
