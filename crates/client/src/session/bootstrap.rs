//! Parsing of the catalog's session handshake pages.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::error::SessionError;

static AJAX_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""ajaxIdentifier"\s*:\s*"PLUGIN=([^"]+)""#).expect("invalid ajax identifier regex")
});

/// Hidden form fields carried by the bootstrap page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapForm {
    pub session_id: String,
    pub submission_id: String,
    pub salt: Option<String>,
    pub items_protected: Option<String>,
}

impl BootstrapForm {
    /// Read the hidden inputs out of the bootstrap page.
    ///
    /// `pInstance` and `pPageSubmissionId` are required; `pSalt` and
    /// `pPageItemsProtected` are forwarded when present.
    pub fn parse(html: &str) -> Result<Self, SessionError> {
        let document = Html::parse_document(html);

        let session_id = hidden_value(&document, "pInstance")
            .ok_or_else(|| SessionError::Bootstrap("login page parsing failed: pInstance missing".into()))?;
        let submission_id = hidden_value(&document, "pPageSubmissionId")
            .ok_or_else(|| SessionError::Bootstrap("login page parsing failed: pPageSubmissionId missing".into()))?;

        Ok(Self {
            session_id,
            submission_id,
            salt: hidden_value(&document, "pSalt"),
            items_protected: hidden_value(&document, "pPageItemsProtected"),
        })
    }
}

fn hidden_value(document: &Html, id: &str) -> Option<String> {
    let selector = Selector::parse(&format!("input#{id}")).ok()?;
    document
        .select(&selector)
        .filter_map(|input| input.value().attr("value"))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Mine the ajax token from the follow-up page body.
///
/// The token is returned in the form the item endpoint expects (`PLUGIN=...`).
pub fn mine_ajax_token(body: &str) -> Result<String, SessionError> {
    AJAX_IDENTIFIER
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| format!("PLUGIN={}", m.as_str()))
        .ok_or_else(|| SessionError::Bootstrap("ajax identifier not found".into()))
}
