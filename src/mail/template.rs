//! Template file lookup and placeholder filling.
//!
//! Templates are mustache: `{{name}}` inserts an HTML-escaped value,
//! `{{{name}}}` inserts it verbatim. Rendering is a single pass, so values
//! that look like placeholders are never expanded.

use std::io;
use std::path::{Path, PathBuf};

use mustache::MapBuilder;

use crate::mail::error::MailError;
use crate::mail::payload::Placeholders;

/// Candidate paths for `path` in `locale`, most specific first:
/// `dir/de-AT/file`, `dir/de/file`, `dir/file`.
pub fn localized_candidates(path: &Path, locale: Option<&str>) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(3);

    if let (Some(locale), Some(file)) = (locale.filter(|l| !l.is_empty()), path.file_name()) {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        candidates.push(dir.join(locale).join(file));

        let language = locale.split(['-', '_']).next().unwrap_or(locale);
        if language != locale && !language.is_empty() {
            candidates.push(dir.join(language).join(file));
        }
    }

    candidates.push(path.to_path_buf());
    candidates
}

/// Read the most specific existing variant of a template file.
pub async fn load_localized(path: &Path, locale: Option<&str>) -> Result<String, MailError> {
    let mut candidates = localized_candidates(path, locale);
    let fallback = candidates.pop().unwrap_or_else(|| path.to_path_buf());

    for candidate in candidates {
        match tokio::fs::read_to_string(&candidate).await {
            Ok(contents) => return Ok(contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(MailError::Template { path: candidate, source: e }),
        }
    }

    tokio::fs::read_to_string(&fallback)
        .await
        .map_err(|source| MailError::Template { path: fallback, source })
}

/// Render `text` with `placeholders`. Unknown placeholders render empty.
pub fn fill_placeholders(text: &str, placeholders: &Placeholders) -> Result<String, MailError> {
    let template = mustache::compile_str(text)?;
    let data = placeholders
        .iter()
        .fold(MapBuilder::new(), |builder, (key, value)| builder.insert_str(key, value))
        .build();

    let mut out = Vec::with_capacity(text.len());
    template.render_data(&mut out, &data)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_for_region_locale() {
        let path = Path::new("./templates/custom_email.txt");
        let candidates = localized_candidates(path, Some("de-AT"));

        assert_eq!(
            candidates,
            vec![
                PathBuf::from("./templates/de-AT/custom_email.txt"),
                PathBuf::from("./templates/de/custom_email.txt"),
                PathBuf::from("./templates/custom_email.txt"),
            ]
        );
    }

    #[test]
    fn test_candidates_without_locale() {
        let path = Path::new("./templates/custom_email.txt");
        assert_eq!(localized_candidates(path, None), vec![path.to_path_buf()]);
        assert_eq!(localized_candidates(path, Some("fr")).len(), 2);
    }

    #[test]
    fn test_fill_placeholders() {
        let mut placeholders = Placeholders::new();
        placeholders.insert("appName".into(), "Acme".into());
        placeholders.insert("username".into(), "jane".into());

        let filled =
            fill_placeholders("Hi {{username}}, welcome to {{appName}}.{{link}}", &placeholders).unwrap();
        assert_eq!(filled, "Hi jane, welcome to Acme.");
    }

    #[test]
    fn test_values_are_not_expanded_again() {
        let mut placeholders = Placeholders::new();
        placeholders.insert("email".into(), "{{link}}".into());
        placeholders.insert("link".into(), "https://reset/token".into());

        assert_eq!(
            fill_placeholders("Mail: {{email}}", &placeholders).unwrap(),
            "Mail: {{link}}"
        );
    }

    #[test]
    fn test_escaping() {
        let mut placeholders = Placeholders::new();
        placeholders.insert("name".into(), "<b>Tom & Jerry".into());

        assert_eq!(
            fill_placeholders("{{name}} | {{{name}}}", &placeholders).unwrap(),
            "&lt;b&gt;Tom &amp; Jerry | <b>Tom & Jerry"
        );
        assert!(matches!(
            fill_placeholders("{{#open}}", &placeholders),
            Err(MailError::Render(_))
        ));
    }

    #[tokio::test]
    async fn test_load_prefers_language_over_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("de")).unwrap();
        std::fs::write(dir.path().join("mail.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("de").join("mail.txt"), "hallo").unwrap();

        let path = dir.path().join("mail.txt");
        assert_eq!(load_localized(&path, Some("de-AT")).await.unwrap(), "hallo");
        assert_eq!(load_localized(&path, Some("fr")).await.unwrap(), "hello");
        assert_eq!(load_localized(&path, None).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_load_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");

        match load_localized(&path, Some("de")).await {
            Err(MailError::Template { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
