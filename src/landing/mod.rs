//! Static landing page.
//!
//! The page is rendered once from `templates/landing.hbs` whenever the
//! configuration is (re)loaded and then served from memory.

use handlebars::Handlebars;
use thiserror::Error;

use crate::config::LandingConfig;

const TEMPLATE_NAME: &str = "landing";
const TEMPLATE: &str = include_str!("../../templates/landing.hbs");

#[derive(Debug, Error)]
pub enum LandingError {
    #[error("Template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("Render error: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Rendered landing page HTML.
#[derive(Debug, Clone)]
pub struct LandingPage {
    html: String,
}

impl LandingPage {
    pub fn render(config: &LandingConfig) -> Result<Self, LandingError> {
        let mut templates = Handlebars::new();
        templates.set_strict_mode(true);
        templates.register_template_string(TEMPLATE_NAME, TEMPLATE)?;

        let html = templates.render(TEMPLATE_NAME, config)?;
        Ok(Self { html })
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}
