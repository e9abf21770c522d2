use std::{collections::BTreeSet, path::Path};

use resxsync::CultureTag;

/// Validate that a root directory exists
pub fn validate_root(path: &str) -> Result<(), String> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return Err(format!("Directory does not exist: {}", path));
    }

    if !path_obj.is_dir() {
        return Err(format!("Path is not a directory: {}", path));
    }

    Ok(())
}

/// Validate output directory exists or can be created
pub fn validate_output_path(path: &str) -> Result<(), String> {
    let path_obj = Path::new(path);

    if let Some(parent) = path_obj.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                format!("Cannot create output directory '{}': {}", parent.display(), e)
            })?;
        }
    }

    if path_obj.is_dir() && path_obj.extension().is_some() {
        return Err(format!("Output path is a directory: {}", path));
    }

    Ok(())
}

/// Parse `--culture` values. Commas separate several cultures in one value.
pub fn parse_cultures(values: &[String]) -> Result<BTreeSet<CultureTag>, String> {
    let mut cultures = BTreeSet::new();
    for value in values.iter().flat_map(|v| v.split(',')) {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let culture = CultureTag::parse_known(value).ok_or_else(|| {
            format!(
                "Invalid culture: {}. Expected a language tag like 'fr', 'de-CH' or 'zh-Hans'",
                value
            )
        })?;
        cultures.insert(culture);
    }
    Ok(cultures)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cultures() {
        let cultures =
            parse_cultures(&["fr,de".to_string(), " pt-BR ".to_string(), "fr".to_string()])
                .unwrap();
        let tags: Vec<String> = cultures.iter().map(|c| c.to_string()).collect();
        assert_eq!(tags, vec!["de", "fr", "pt-BR"]);
    }

    #[test]
    fn test_invalid_culture() {
        assert!(parse_cultures(&["english".to_string()]).is_err());
        assert!(parse_cultures(&["x1".to_string()]).is_err());
    }

    #[test]
    fn test_validate_root() {
        assert!(validate_root(".").is_ok());
        assert!(validate_root("definitely/not/here").is_err());
    }
}
