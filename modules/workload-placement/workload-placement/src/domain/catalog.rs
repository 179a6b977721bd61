//! Image catalog loading and the launch options form.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, warn};
use workload_placement_sdk::{ImageCatalog, ImageSection, UserOptions};

use super::error::DomainError;

/// Form field carrying the selected image.
pub const IMAGE_FIELD: &str = "kernel_image";

/// Load every `*.yaml` file in `dir`, in file name order.
///
/// Files that cannot be read or parsed are skipped with a warning; a
/// missing directory yields an empty catalog.
///
/// # Errors
///
/// `IoError` if `dir` cannot be turned into a search pattern.
pub fn load_catalog(dir: &Path) -> Result<ImageCatalog, DomainError> {
    let pattern = dir.join("*.yaml");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| DomainError::io_error(dir.display().to_string(), "path is not UTF-8"))?;
    let paths = glob::glob(pattern)
        .map_err(|e| DomainError::io_error(dir.display().to_string(), e.to_string()))?;

    let mut sections = Vec::new();
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Could not read image list entry");
                continue;
            }
        };
        match read_section(&path) {
            Ok(section) => {
                debug!(path = %path.display(), images = section.images.len(), "Loaded image list");
                sections.push(section);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Could not parse image list"),
        }
    }

    let catalog = ImageCatalog::new(sections);
    info!(
        dir = %dir.display(),
        sections = catalog.sections().len(),
        images = catalog.images().count(),
        "Loaded image catalog"
    );
    Ok(catalog)
}

fn read_section(path: &Path) -> Result<ImageSection, DomainError> {
    let origin = path.display().to_string();
    let raw =
        std::fs::read_to_string(path).map_err(|e| DomainError::io_error(&origin, e.to_string()))?;
    serde_saphyr::from_str(&raw).map_err(|e| DomainError::parse_error(origin, e.to_string()))
}

/// Render the catalog as HTML radio inputs named `kernel_image`.
#[must_use]
pub fn render_options_form(catalog: &ImageCatalog) -> String {
    let mut form = String::new();
    for section in catalog.sections() {
        if let Some(title) = &section.title {
            form.push_str("<h3>");
            form.push_str(&escape_html(title));
            form.push_str("</h3><br/>\n");
        }
        if let Some(updated) = &section.updated {
            form.push_str("updated at ");
            form.push_str(&escape_html(updated));
            form.push_str("<br>\n");
        }
        for image in &section.images {
            form.push_str("<input type=\"radio\" name=\"");
            form.push_str(IMAGE_FIELD);
            form.push_str("\" value=\"");
            form.push_str(&escape_html(&image.image));
            form.push_str("\">");
            form.push_str(&escape_html(&image.description));
            form.push_str("<br>\n");
        }
    }
    form
}

/// Extract launch options from submitted form data.
///
/// Takes the first non-blank `kernel_image` value.
#[must_use]
pub fn options_from_form(form: &BTreeMap<String, Vec<String>>) -> UserOptions {
    let kernel_image = form
        .get(IMAGE_FIELD)
        .and_then(|values| values.iter().find(|v| !v.trim().is_empty()))
        .map(|v| v.trim().to_owned());
    UserOptions { kernel_image }
}

fn escape_html(text: &str) -> Cow<'_, str> {
    if !text
        .chars()
        .any(|c| matches!(c, '&' | '<' | '>' | '"' | '\''))
    {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}
