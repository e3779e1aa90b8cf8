//! `{{key}}` placeholder rendering for configuration templates.

use std::path::Path;

use crate::error::Result;
use crate::io;

pub struct TemplateVars;

impl TemplateVars {
    pub const SERVER_NAME: &'static str = "ServerName";
    pub const PORT_PHP: &'static str = "PortPhp";
    pub const PORT_NODE: &'static str = "PortNode";
    pub const REF_SLUG: &'static str = "RefSlug";
    pub const APP_URL: &'static str = "AppURL";
    pub const DB_DATABASE: &'static str = "DBDatabase";
    pub const DB_USERNAME: &'static str = "DBUserName";
    pub const DB_PASSWORD: &'static str = "DBPassword";
}

pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

/// Read `template`, render it and write the result to `destination`.
pub fn render_file(template: &Path, destination: &Path, variables: &[(&str, &str)]) -> Result<()> {
    let source = io::read_file(template, &format!("read template {}", template.display()))?;
    let rendered = render(&source, variables);
    io::write_file(
        destination,
        &rendered,
        &format!("write {}", destination.display()),
    )?;
    log::info!("Created {} from {}", destination.display(), template.display());
    Ok(())
}
